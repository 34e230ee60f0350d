//! Transfer progress events and cancellation.
//!
//! The upload pipeline writes [`TransferEvent`]s into a [`ProgressSink`]; the
//! caller reads them from the paired [`ProgressStream`], which also carries
//! the [`CancelToken`] used to stop the transfer between or inside parts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Shared cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Snapshot of byte progress for the part currently in transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    pub part_index: usize,
    pub part_count: usize,
    /// Bytes of this part sent so far.
    pub bytes_transferred: u64,
    /// Size of this part's archive.
    pub bytes_total: u64,
    /// Bytes sent across all parts, including this one.
    pub overall_transferred: u64,
    /// Sum of all part archive sizes: exact for parts built so far, estimated
    /// for the rest.
    pub overall_total: u64,
    /// Seconds since the first part started.
    pub elapsed_secs: f64,
}

impl TransferProgress {
    /// Overall rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.overall_transferred as f64 / self.elapsed_secs
    }

    /// Estimated seconds until the whole upload is sent (None if rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.overall_total.saturating_sub(self.overall_transferred);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Overall fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.overall_total == 0 {
            return 1.0;
        }
        (self.overall_transferred as f64 / self.overall_total as f64).min(1.0)
    }
}

/// One event from a running upload.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Parts are planned and the first is about to be built. `overall_total`
    /// is the estimated size of all part archives.
    Planned {
        part_count: usize,
        total_files: usize,
        overall_total: u64,
    },
    /// Part `index` is about to be transmitted.
    PartStarted { index: usize, bytes_total: u64 },
    /// Byte-level progress within a part.
    Bytes(TransferProgress),
    /// Part `index` was transmitted and its local archive removed.
    PartSent { index: usize },
}

/// Producer side handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<TransferEvent>>,
    cancel: CancelToken,
}

impl ProgressSink {
    /// A sink that drops every event and is never cancelled.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Send an event; a dropped stream is not an error.
    pub fn emit(&self, event: TransferEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Consumer side kept by the caller.
#[derive(Debug)]
pub struct ProgressStream {
    rx: UnboundedReceiver<TransferEvent>,
    cancel: CancelToken,
}

impl ProgressStream {
    /// Next event; `None` once the pipeline has finished and dropped its sink.
    pub async fn next(&mut self) -> Option<TransferEvent> {
        self.rx.recv().await
    }

    /// Blocking variant for non-async callers. Must not be called from an async context.
    pub fn blocking_next(&mut self) -> Option<TransferEvent> {
        self.rx.blocking_recv()
    }

    /// Event already queued, if any.
    pub fn try_next(&mut self) -> Option<TransferEvent> {
        self.rx.try_recv().ok()
    }

    /// Ask the pipeline to stop. Parts already sent stay sent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Create a connected sink/stream pair.
pub fn progress_channel() -> (ProgressSink, ProgressStream) {
    let (tx, rx) = unbounded_channel();
    let cancel = CancelToken::new();
    (
        ProgressSink {
            tx: Some(tx),
            cancel: cancel.clone(),
        },
        ProgressStream { rx, cancel },
    )
}
