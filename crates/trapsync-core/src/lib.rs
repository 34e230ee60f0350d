//! trapsync core: keeps the species catalog, location catalog, settings and
//! image metadata consistent with a remote data store, and uploads large
//! image sets to it in bounded archive parts.

pub mod checksum;
pub mod config;
pub mod context;
pub mod error;
pub mod lanes;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod progress;
pub mod remote;
pub mod report;
pub mod retry;
pub mod session;
pub mod sync;
pub mod upload;

pub use context::SyncContext;
pub use error::SyncError;
