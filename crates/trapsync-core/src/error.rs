//! Error type shared by sessions, sync jobs and the upload pipeline.
//!
//! Every variant is recoverable at the job boundary: the job or pipeline
//! aborts, the error goes to the [`ErrorSink`](crate::report::ErrorSink), and
//! the system stays live.

use thiserror::Error;

/// Failure of a session, push or transfer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Opening or authenticating a remote session failed.
    #[error("session: {0}")]
    Session(String),

    /// A document push or file transfer failed mid-flight.
    #[error("transfer of {target} failed: {reason}")]
    Transfer { target: String, reason: String },

    /// The remote side answered with a status that is neither success nor a permission failure.
    #[error("transfer of {target} failed: HTTP {status}")]
    Http { target: String, status: u32 },

    /// The remote side rejected the operation due to access rights.
    #[error("permission denied: {0}")]
    Permission(String),

    /// A configured deadline expired before the operation finished.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A snapshot could not be encoded (or a remote document decoded).
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local I/O while enumerating files or building, hashing or deleting an archive part.
    #[error("archive: {0}")]
    Archive(#[source] std::io::Error),

    /// Archive part `index` could not be transmitted; earlier parts stay uploaded.
    #[error("archive part {index} failed: {source}")]
    PartFailed {
        index: usize,
        #[source]
        source: Box<SyncError>,
    },

    /// Every part was sent but the document `name` (image metadata or upload
    /// record) could not be written after them.
    #[error("{parts_sent} part(s) sent, but writing {name} failed: {source}")]
    RecordFailed {
        name: String,
        parts_sent: usize,
        #[source]
        source: Box<SyncError>,
    },

    /// The caller cancelled the transfer through its progress stream.
    #[error("transfer cancelled")]
    Cancelled,
}

impl SyncError {
    /// Shorthand for a [`SyncError::Transfer`] built from any displayable reason.
    pub fn transfer(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SyncError::Transfer {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Index of the archive part this error belongs to, if any.
    pub fn part_index(&self) -> Option<usize> {
        match self {
            SyncError::PartFailed { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Parts known to be on the remote when an upload stopped with this error.
    pub fn parts_sent(&self) -> Option<usize> {
        match self {
            SyncError::PartFailed { index, .. } => Some(*index),
            SyncError::RecordFailed { parts_sent, .. } => Some(*parts_sent),
            _ => None,
        }
    }

    /// The innermost error, looking through part and record wrappers.
    pub fn root(&self) -> &SyncError {
        match self {
            SyncError::PartFailed { source, .. } | SyncError::RecordFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
