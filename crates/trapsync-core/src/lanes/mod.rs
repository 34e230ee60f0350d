//! The two execution lanes.
//!
//! Consistency-maintenance jobs (resource pushes) go to the [`SequentialLane`]
//! so writes to the per-user remote documents never race each other.
//! User-initiated long operations (uploads, pulls) go to the
//! [`ConcurrentLane`] so they never queue behind sync traffic or each other.

mod concurrent;
mod handle;
mod sequential;

pub use concurrent::ConcurrentLane;
pub use handle::{LaneError, TaskHandle};
pub(crate) use handle::run_caught;
pub use sequential::SequentialLane;

#[derive(Debug, Clone)]
pub struct ExecutionDomain {
    sequential: SequentialLane,
    concurrent: ConcurrentLane,
}

impl ExecutionDomain {
    /// Start the sequential worker and prepare the concurrent lane.
    pub fn start() -> std::io::Result<Self> {
        Ok(Self {
            sequential: SequentialLane::start("trapsync-sync")?,
            concurrent: ConcurrentLane::new("trapsync-task"),
        })
    }

    pub fn sequential(&self) -> &SequentialLane {
        &self.sequential
    }

    pub fn concurrent(&self) -> &ConcurrentLane {
        &self.concurrent
    }

    /// True while either lane has work queued or running.
    pub fn any_task_running(&self) -> bool {
        self.sequential.pending() > 0 || self.concurrent.active() > 0
    }
}
