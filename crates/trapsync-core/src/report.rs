//! Error display collaborator.
//!
//! The core never decides how failures are rendered: jobs and pipelines hand a
//! short context plus the error to an [`ErrorSink`] and carry on.

use std::sync::{Mutex, PoisonError};

use crate::error::SyncError;

/// Receives human-readable failure descriptions from background work.
pub trait ErrorSink: Send + Sync {
    fn report(&self, context: &str, error: &SyncError);
}

/// Default sink: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, context: &str, error: &SyncError) {
        tracing::error!("{}: {}", context, error);
    }
}

/// Sink that keeps every report as a formatted line; used by the CLI to print
/// failures after a command finishes.
#[derive(Debug, Default)]
pub struct CollectingErrorSink {
    reports: Mutex<Vec<String>>,
}

impl CollectingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the collected reports.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.reports.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorSink for CollectingErrorSink {
    fn report(&self, context: &str, error: &SyncError) {
        tracing::warn!("{}: {}", context, error);
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{}: {}", context, error));
    }
}
