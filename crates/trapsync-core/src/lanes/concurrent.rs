//! Unbounded lane: every task gets its own worker thread.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use super::handle::{run_caught, LaneError, TaskHandle};

#[derive(Debug, Clone)]
pub struct ConcurrentLane {
    name: Arc<str>,
    active: Arc<AtomicUsize>,
    spawned: Arc<AtomicU64>,
}

/// Decrements the active count when the task's thread finishes, panic or not.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrentLane {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            active: Arc::new(AtomicUsize::new(0)),
            spawned: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start `f` immediately on a fresh worker thread.
    pub fn submit<T, F>(&self, f: F) -> Result<TaskHandle<T>, LaneError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));
        thread::Builder::new()
            .name(format!("{}-{}", self.name, n))
            .spawn(move || {
                let _guard = guard;
                let _ = done_tx.send(run_caught(f));
            })
            .map_err(|e| LaneError::Spawn(e.to_string()))?;
        Ok(TaskHandle::new(&self.name, done_rx))
    }

    /// Tasks currently running.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
