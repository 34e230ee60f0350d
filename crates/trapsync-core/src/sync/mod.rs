//! Coalescing background synchronization of the locally editable resources.
//!
//! Each resource is a [`SyncableResource<T>`] registered with one shared
//! [`SyncScheduler`]. A mutation either starts a push job on the sequential
//! lane or, when a job for that resource is already in flight, marks the
//! resource dirty so exactly one follow-up job runs after it. Every job pushes
//! a full snapshot taken when the job starts, never a diff.

mod documents;
mod resource;
mod scheduler;

pub use documents::RemoteDocumentStore;
pub use resource::{ResourceKey, SyncableResource};
pub use scheduler::{PushOperation, SnapshotFn, SyncScheduler};
