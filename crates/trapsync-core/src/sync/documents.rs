//! Per-user resource documents in the remote store.

use std::sync::Arc;

use crate::error::SyncError;
use crate::remote::join_remote;
use crate::session::SessionPool;

use super::resource::ResourceKey;
use super::scheduler::PushOperation;

/// Reads and writes `<user_root>/<document>` through the calling thread's session.
pub struct RemoteDocumentStore {
    pool: Arc<SessionPool>,
    user_root: String,
}

impl RemoteDocumentStore {
    pub fn new(pool: Arc<SessionPool>, user_root: impl Into<String>) -> Self {
        Self {
            pool,
            user_root: user_root.into(),
        }
    }

    /// Remote path of `key`'s document.
    pub fn path_for(&self, key: ResourceKey) -> String {
        join_remote([self.user_root.as_str(), key.document_name()])
    }

    /// Fetch `key`'s document; `Ok(None)` if the remote has none yet.
    pub fn fetch(&self, key: ResourceKey) -> Result<Option<Vec<u8>>, SyncError> {
        let path = self.path_for(key);
        let session = self.pool.acquire()?;
        session.with(|s| s.get_document(&path))
    }
}

impl PushOperation for RemoteDocumentStore {
    fn push(&self, key: ResourceKey, snapshot: &[u8]) -> Result<(), SyncError> {
        let path = self.path_for(key);
        let session = self.pool.acquire()?;
        session.with(|s| s.put_document(&path, snapshot))?;
        tracing::debug!(%key, remote = %path, bytes = snapshot.len(), "document pushed");
        Ok(())
    }
}
