//! Resource keys and the generic syncable value wrapper.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::SyncError;

use super::scheduler::SyncScheduler;

/// The four resources kept consistent with the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    SpeciesCatalog,
    LocationCatalog,
    Settings,
    MetadataTree,
}

impl ResourceKey {
    pub const ALL: [ResourceKey; 4] = [
        ResourceKey::SpeciesCatalog,
        ResourceKey::LocationCatalog,
        ResourceKey::Settings,
        ResourceKey::MetadataTree,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKey::SpeciesCatalog => "species-catalog",
            ResourceKey::LocationCatalog => "location-catalog",
            ResourceKey::Settings => "settings",
            ResourceKey::MetadataTree => "metadata-tree",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "species-catalog" | "species" => Some(ResourceKey::SpeciesCatalog),
            "location-catalog" | "locations" => Some(ResourceKey::LocationCatalog),
            "settings" => Some(ResourceKey::Settings),
            "metadata-tree" | "metadata" => Some(ResourceKey::MetadataTree),
            _ => None,
        }
    }

    /// File name of this resource's document in the remote user folder.
    pub fn document_name(self) -> &'static str {
        match self {
            ResourceKey::SpeciesCatalog => "species.json",
            ResourceKey::LocationCatalog => "locations.json",
            ResourceKey::Settings => "settings.json",
            ResourceKey::MetadataTree => "metadata.json",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ResourceKey::SpeciesCatalog => 0,
            ResourceKey::LocationCatalog => 1,
            ResourceKey::Settings => 2,
            ResourceKey::MetadataTree => 3,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally editable value whose every mutation is pushed to the remote
/// store through the scheduler, coalesced per key.
///
/// Creating one registers its snapshot provider with the scheduler; a second
/// resource created for the same key replaces the first as the provider.
pub struct SyncableResource<T> {
    key: ResourceKey,
    value: Arc<RwLock<T>>,
    scheduler: Arc<SyncScheduler>,
}

impl<T> SyncableResource<T>
where
    T: Serialize + Send + Sync + 'static,
{
    pub fn new(key: ResourceKey, initial: T, scheduler: &Arc<SyncScheduler>) -> Self {
        let value = Arc::new(RwLock::new(initial));
        let provider_value = Arc::clone(&value);
        scheduler.register(
            key,
            Arc::new(move || {
                let guard = provider_value.read().unwrap_or_else(PoisonError::into_inner);
                serde_json::to_vec_pretty(&*guard).map_err(SyncError::from)
            }),
        );
        Self {
            key,
            value,
            scheduler: Arc::clone(scheduler),
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    /// Read the current value.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Mutate the value in place and schedule a push.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let out = {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        };
        self.scheduler.notify_mutated(self.key);
        out
    }

    /// Replace the value and schedule a push.
    pub fn set(&self, value: T) {
        self.mutate(|v| *v = value);
    }

    /// Adopt a value that already matches the remote (e.g. just pulled).
    /// Does not schedule a push.
    pub fn load(&self, value: T) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Full serialized value, exactly what a push job would send now.
    pub fn snapshot(&self) -> Result<Vec<u8>, SyncError> {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        Ok(serde_json::to_vec_pretty(&*guard)?)
    }
}

// Clones share the value and the scheduler registration.
impl<T> Clone for SyncableResource<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            value: Arc::clone(&self.value),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<T: Clone> SyncableResource<T> {
    pub fn get(&self) -> T {
        self.value.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
