//! Explicit wiring of the sync core.
//!
//! A [`SyncContext`] owns everything the background machinery shares: the
//! session pool, both execution lanes, the scheduler and the four resources.
//! Build one per process (or per test) and pass it where needed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::TrapsyncConfig;
use crate::error::SyncError;
use crate::lanes::{ExecutionDomain, LaneError, TaskHandle};
use crate::ledger::unix_timestamp;
use crate::model::{Location, MetadataTree, Settings, Species};
use crate::progress::{progress_channel, ProgressStream};
use crate::remote::{factory_from_config, join_remote, SessionFactory};
use crate::report::ErrorSink;
use crate::session::SessionPool;
use crate::sync::{RemoteDocumentStore, ResourceKey, SyncScheduler, SyncableResource};
use crate::upload::{upload_dir_name, ChunkedUploadPipeline, UploadManifest, UploadRequest};

/// Result of an upload task.
pub type UploadResult = Result<UploadManifest, SyncError>;

pub struct SyncContext {
    config: TrapsyncConfig,
    uploader: String,
    domain: ExecutionDomain,
    pool: Arc<SessionPool>,
    scheduler: Arc<SyncScheduler>,
    documents: Arc<RemoteDocumentStore>,
    pipeline: Arc<ChunkedUploadPipeline>,
    species: SyncableResource<Vec<Species>>,
    locations: SyncableResource<Vec<Location>>,
    settings: SyncableResource<Settings>,
    metadata: SyncableResource<MetadataTree>,
}

impl SyncContext {
    /// Build the context for the remote described in `config`.
    pub fn from_config(config: TrapsyncConfig, errors: Arc<dyn ErrorSink>) -> anyhow::Result<Self> {
        let factory = factory_from_config(&config.remote, config.timeouts)?;
        let uploader = config.remote.username();
        Self::with_factory(config, factory, uploader, errors)
    }

    /// Build the context over an explicit session factory.
    pub fn with_factory(
        config: TrapsyncConfig,
        factory: Arc<dyn SessionFactory>,
        uploader: impl Into<String>,
        errors: Arc<dyn ErrorSink>,
    ) -> anyhow::Result<Self> {
        let domain = ExecutionDomain::start()?;
        let pool = Arc::new(SessionPool::new(factory, Arc::clone(&errors)));
        let documents = Arc::new(RemoteDocumentStore::new(Arc::clone(&pool), config.user_root.clone()));
        let scheduler = SyncScheduler::new(
            domain.sequential().clone(),
            documents.clone(),
            errors,
        );
        let pipeline = Arc::new(
            ChunkedUploadPipeline::new(Arc::clone(&pool))
                .with_retry(config.retry.as_ref().map(|r| r.to_policy())),
        );
        Ok(Self {
            species: SyncableResource::new(ResourceKey::SpeciesCatalog, Vec::new(), &scheduler),
            locations: SyncableResource::new(ResourceKey::LocationCatalog, Vec::new(), &scheduler),
            settings: SyncableResource::new(ResourceKey::Settings, Settings::default(), &scheduler),
            metadata: SyncableResource::new(ResourceKey::MetadataTree, MetadataTree::default(), &scheduler),
            uploader: uploader.into(),
            config,
            domain,
            pool,
            scheduler,
            documents,
            pipeline,
        })
    }

    /// Replace the upload pipeline (e.g. to build parts in a specific scratch directory).
    pub fn with_pipeline(mut self, pipeline: ChunkedUploadPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn config(&self) -> &TrapsyncConfig {
        &self.config
    }

    pub fn domain(&self) -> &ExecutionDomain {
        &self.domain
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    pub fn species(&self) -> &SyncableResource<Vec<Species>> {
        &self.species
    }

    pub fn locations(&self) -> &SyncableResource<Vec<Location>> {
        &self.locations
    }

    pub fn settings(&self) -> &SyncableResource<Settings> {
        &self.settings
    }

    pub fn metadata(&self) -> &SyncableResource<MetadataTree> {
        &self.metadata
    }

    /// Replace a resource from a JSON document and schedule its push.
    pub fn adopt_json(&self, key: ResourceKey, body: &[u8]) -> Result<(), SyncError> {
        match key {
            ResourceKey::SpeciesCatalog => self.species.set(serde_json::from_slice(body)?),
            ResourceKey::LocationCatalog => self.locations.set(serde_json::from_slice(body)?),
            ResourceKey::Settings => self.settings.set(serde_json::from_slice(body)?),
            ResourceKey::MetadataTree => self.metadata.set(serde_json::from_slice(body)?),
        }
        Ok(())
    }

    /// Block until no push job is queued or running. False on timeout.
    pub fn wait_synced(&self, timeout: Duration) -> bool {
        self.scheduler.wait_all_settled(timeout)
    }

    /// Request for uploading `source` into a new `<unix-seconds>_<user>`
    /// folder under `collection`, carrying the metadata tree's image entries.
    pub fn upload_request(&self, source: impl Into<PathBuf>, collection: &str, description: &str) -> UploadRequest {
        let destination = join_remote([collection, &upload_dir_name(&self.uploader, unix_timestamp())]);
        let mut req = UploadRequest::new(source, destination, self.config.max_files_per_part);
        req.max_part_bytes = self.config.max_part_bytes;
        req.uploader = self.uploader.clone();
        req.description = description.to_string();
        req.images = self.metadata.read(|m| m.entries());
        req
    }

    /// Start [`SyncContext::upload_request`] on the concurrent lane.
    ///
    /// Returns at once; the stream carries progress and is the way to cancel.
    pub fn upload_directory(
        &self,
        source: impl Into<PathBuf>,
        collection: &str,
        description: &str,
    ) -> Result<(TaskHandle<UploadResult>, ProgressStream), LaneError> {
        self.submit_upload(self.upload_request(source, collection, description))
    }

    /// Run an explicit upload request on the concurrent lane.
    pub fn submit_upload(
        &self,
        req: UploadRequest,
    ) -> Result<(TaskHandle<UploadResult>, ProgressStream), LaneError> {
        let (sink, stream) = progress_channel();
        let pipeline = Arc::clone(&self.pipeline);
        let handle = self
            .domain
            .concurrent()
            .submit(move || pipeline.upload(&req, &sink))?;
        Ok((handle, stream))
    }

    /// Fetch the species, location and settings documents on the concurrent
    /// lane and adopt them without scheduling pushes. Missing documents leave
    /// the local value as is. Returns the keys that were adopted.
    pub fn pull_resources(&self) -> Result<TaskHandle<Result<Vec<ResourceKey>, SyncError>>, LaneError> {
        let documents = Arc::clone(&self.documents);
        let species = self.species.clone();
        let locations = self.locations.clone();
        let settings = self.settings.clone();
        self.domain.concurrent().submit(move || -> Result<Vec<ResourceKey>, SyncError> {
            let mut adopted = Vec::new();
            if pull_into(&documents, &species)? {
                adopted.push(species.key());
            }
            if pull_into(&documents, &locations)? {
                adopted.push(locations.key());
            }
            if pull_into(&documents, &settings)? {
                adopted.push(settings.key());
            }
            tracing::info!(?adopted, "remote resources pulled");
            Ok(adopted)
        })
    }
}

fn pull_into<T>(documents: &RemoteDocumentStore, resource: &SyncableResource<T>) -> Result<bool, SyncError>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let Some(body) = documents.fetch(resource.key())? else {
        return Ok(false);
    };
    resource.load(serde_json::from_slice(&body)?);
    Ok(true)
}
