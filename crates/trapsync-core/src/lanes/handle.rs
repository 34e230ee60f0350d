//! Result handle for work submitted to a lane.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tokio::sync::oneshot;

/// Why a submitted task produced no value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaneError {
    /// The lane's worker is gone; the task never ran (or its result was lost).
    #[error("lane {0} is shut down")]
    Closed(String),
    /// The OS refused to start a worker thread.
    #[error("could not start worker: {0}")]
    Spawn(String),
    /// The task panicked; the lane itself keeps running.
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Receives the value of one submitted task. Dropping it does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    lane: String,
    rx: oneshot::Receiver<Result<T, LaneError>>,
}

impl<T> TaskHandle<T> {
    pub(super) fn new(lane: &str, rx: oneshot::Receiver<Result<T, LaneError>>) -> Self {
        Self {
            lane: lane.to_string(),
            rx,
        }
    }

    /// Block the calling thread until the task finishes. Not for async contexts.
    pub fn wait(self) -> Result<T, LaneError> {
        let lane = self.lane;
        self.rx.blocking_recv().unwrap_or(Err(LaneError::Closed(lane)))
    }

    /// Await the task from async code.
    pub async fn join(self) -> Result<T, LaneError> {
        let lane = self.lane;
        self.rx.await.unwrap_or(Err(LaneError::Closed(lane)))
    }

    /// The result if the task already finished.
    pub fn try_result(&mut self) -> Option<Result<T, LaneError>> {
        match self.rx.try_recv() {
            Ok(out) => Some(out),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(LaneError::Closed(self.lane.clone()))),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `f`, turning a panic into [`LaneError::Panicked`].
pub(crate) fn run_caught<T>(f: impl FnOnce() -> T) -> Result<T, LaneError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|p| LaneError::Panicked(panic_message(p)))
}
