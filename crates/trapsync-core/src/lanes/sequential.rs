//! Single-worker lane: jobs run one at a time, in submission order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use super::handle::{run_caught, LaneError, TaskHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Submission side of the sequential lane. Clones feed the same worker; the
/// worker exits once every clone is dropped and the queue is empty.
#[derive(Clone)]
pub struct SequentialLane {
    name: Arc<str>,
    tx: mpsc::Sender<Job>,
    pending: Arc<AtomicUsize>,
}

impl std::fmt::Debug for SequentialLane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialLane")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish()
    }
}

impl SequentialLane {
    /// Start the background worker thread.
    pub fn start(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
                tracing::debug!("sequential lane worker exiting");
            })?;
        Ok(Self {
            name: Arc::from(name),
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Queue `f` behind every job submitted before it.
    pub fn submit<T, F>(&self, f: F) -> Result<TaskHandle<T>, LaneError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let pending = Arc::clone(&self.pending);
        pending.fetch_add(1, Ordering::SeqCst);
        let job: Job = Box::new(move || {
            let out = run_caught(f);
            pending.fetch_sub(1, Ordering::SeqCst);
            let _ = done_tx.send(out);
        });
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(LaneError::Closed(self.name.to_string()));
        }
        Ok(TaskHandle::new(&self.name, done_rx))
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Block until every job submitted before this call has finished.
    pub fn drain(&self) -> Result<(), LaneError> {
        self.submit(|| ())?.wait()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
