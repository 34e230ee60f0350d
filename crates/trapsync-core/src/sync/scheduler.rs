//! Per-key coalescing of mutation signals into push jobs.
//!
//! Per key there are two flags, guarded by that key's own lock:
//! `in_flight` (a job is queued or running) and `dirty` (a mutation arrived
//! while it was). `dirty` is only ever set while `in_flight` is true, and is
//! cleared when the follow-up job is started, not when it finishes, so a
//! mutation landing during the follow-up earns a third run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::error::SyncError;
use crate::lanes::{LaneError, SequentialLane};
use crate::report::ErrorSink;

use super::resource::ResourceKey;

/// Produces the full current value of a resource, serialized.
pub type SnapshotFn = Arc<dyn Fn() -> Result<Vec<u8>, SyncError> + Send + Sync>;

/// Remote write for one resource snapshot.
pub trait PushOperation: Send + Sync {
    fn push(&self, key: ResourceKey, snapshot: &[u8]) -> Result<(), SyncError>;
}

#[derive(Debug, Default, Clone, Copy)]
struct SyncFlags {
    in_flight: bool,
    dirty: bool,
}

#[derive(Default)]
struct Entry {
    flags: Mutex<SyncFlags>,
    settled: Condvar,
    snapshot: RwLock<Option<SnapshotFn>>,
    jobs_started: AtomicU64,
    failures: AtomicU64,
}

impl Entry {
    fn flags(&self) -> MutexGuard<'_, SyncFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SyncScheduler {
    lane: SequentialLane,
    pusher: Arc<dyn PushOperation>,
    errors: Arc<dyn ErrorSink>,
    entries: [Entry; 4],
}

impl SyncScheduler {
    pub fn new(
        lane: SequentialLane,
        pusher: Arc<dyn PushOperation>,
        errors: Arc<dyn ErrorSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            lane,
            pusher,
            errors,
            entries: std::array::from_fn(|_| Entry::default()),
        })
    }

    fn entry(&self, key: ResourceKey) -> &Entry {
        &self.entries[key.index()]
    }

    /// Install the snapshot provider used by jobs for `key`.
    pub fn register(&self, key: ResourceKey, snapshot: SnapshotFn) {
        *self
            .entry(key)
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Signal that `key`'s in-memory value changed. Never blocks on I/O.
    pub fn notify_mutated(self: &Arc<Self>, key: ResourceKey) {
        let entry = self.entry(key);
        {
            let mut flags = entry.flags();
            if flags.in_flight {
                flags.dirty = true;
                tracing::trace!(%key, "mutation coalesced into pending follow-up");
                return;
            }
            flags.in_flight = true;
        }
        self.start_job(key);
    }

    fn start_job(self: &Arc<Self>, key: ResourceKey) {
        let entry = self.entry(key);
        let n = entry.jobs_started.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(%key, job = n, "sync job queued");
        let this = Arc::clone(self);
        if let Err(e) = self.lane.submit(move || this.run_job(key)) {
            // Lane gone: nothing will ever complete this job, so settle now.
            let mut flags = entry.flags();
            flags.in_flight = false;
            flags.dirty = false;
            entry.settled.notify_all();
            drop(flags);
            self.errors.report(
                &format!("syncing {}", key),
                &SyncError::transfer(key.document_name(), e),
            );
        }
    }

    /// Job body, on the sequential lane.
    fn run_job(self: &Arc<Self>, key: ResourceKey) {
        let entry = self.entry(key);
        let provider = entry
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let started = Instant::now();
        let outcome = match provider {
            None => {
                tracing::debug!(%key, "no snapshot provider registered; nothing to push");
                Ok(())
            }
            Some(snapshot) => {
                let pusher = Arc::clone(&self.pusher);
                crate::lanes::run_caught(move || {
                    let body = snapshot()?;
                    pusher.push(key, &body)
                })
                .unwrap_or_else(|e: LaneError| Err(SyncError::transfer(key.document_name(), e)))
            }
        };
        match outcome {
            Ok(()) => tracing::info!(
                %key,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "sync job finished"
            ),
            Err(e) => {
                entry.failures.fetch_add(1, Ordering::SeqCst);
                self.errors.report(&format!("syncing {}", key), &e);
            }
        }
        self.complete(key);
    }

    /// Completion handler, identical for success and failure.
    fn complete(self: &Arc<Self>, key: ResourceKey) {
        let entry = self.entry(key);
        let mut flags = entry.flags();
        if flags.dirty {
            flags.dirty = false;
            drop(flags);
            self.start_job(key);
        } else {
            flags.in_flight = false;
            entry.settled.notify_all();
        }
    }

    pub fn is_in_flight(&self, key: ResourceKey) -> bool {
        self.entry(key).flags().in_flight
    }

    pub fn is_dirty(&self, key: ResourceKey) -> bool {
        self.entry(key).flags().dirty
    }

    /// Jobs started for `key` since creation (initial and follow-up).
    pub fn jobs_started(&self, key: ResourceKey) -> u64 {
        self.entry(key).jobs_started.load(Ordering::SeqCst)
    }

    /// Jobs for `key` whose push failed.
    pub fn failures(&self, key: ResourceKey) -> u64 {
        self.entry(key).failures.load(Ordering::SeqCst)
    }

    /// Block until no job for `key` is queued or running. Returns false on timeout.
    pub fn wait_settled(&self, key: ResourceKey, timeout: Duration) -> bool {
        let entry = self.entry(key);
        let flags = entry.flags();
        let (flags, _) = entry
            .settled
            .wait_timeout_while(flags, timeout, |f| f.in_flight)
            .unwrap_or_else(PoisonError::into_inner);
        !flags.in_flight
    }

    /// Block until every key is settled. Returns false on timeout.
    pub fn wait_all_settled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        ResourceKey::ALL.iter().all(|&key| {
            let left = deadline.saturating_duration_since(Instant::now());
            self.wait_settled(key, left)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingErrorSink;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;

    const WAIT: Duration = Duration::from_secs(5);

    /// Pusher that announces each push and blocks until released.
    struct GatedPusher {
        started: Mutex<mpsc::Sender<Vec<u8>>>,
        release: Mutex<mpsc::Receiver<Result<(), SyncError>>>,
    }

    impl PushOperation for GatedPusher {
        fn push(&self, _key: ResourceKey, snapshot: &[u8]) -> Result<(), SyncError> {
            self.started.lock().unwrap().send(snapshot.to_vec()).unwrap();
            self.release.lock().unwrap().recv().unwrap()
        }
    }

    struct Harness {
        scheduler: Arc<SyncScheduler>,
        started: mpsc::Receiver<Vec<u8>>,
        release: mpsc::Sender<Result<(), SyncError>>,
        sink: Arc<CollectingErrorSink>,
        counter: Arc<AtomicUsize>,
    }

    fn harness() -> Harness {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let pusher = Arc::new(GatedPusher {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let sink = Arc::new(CollectingErrorSink::new());
        let lane = SequentialLane::start("test-sync").unwrap();
        let scheduler = SyncScheduler::new(lane, pusher, sink.clone());
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        scheduler.register(
            ResourceKey::Settings,
            Arc::new(move || Ok(c.load(Ordering::SeqCst).to_string().into_bytes())),
        );
        Harness {
            scheduler,
            started: started_rx,
            release: release_tx,
            sink,
            counter,
        }
    }

    #[test]
    fn burst_during_job_yields_exactly_one_follow_up() {
        let h = harness();
        let key = ResourceKey::Settings;
        h.scheduler.notify_mutated(key);
        assert_eq!(h.started.recv_timeout(WAIT).unwrap(), b"0");
        assert!(h.scheduler.is_in_flight(key));

        for i in 1..=25 {
            h.counter.store(i, Ordering::SeqCst);
            h.scheduler.notify_mutated(key);
        }
        assert!(h.scheduler.is_dirty(key));
        assert_eq!(h.scheduler.jobs_started(key), 1);

        h.release.send(Ok(())).unwrap();
        // The follow-up snapshots the value as of the last mutation.
        assert_eq!(h.started.recv_timeout(WAIT).unwrap(), b"25");
        assert!(!h.scheduler.is_dirty(key), "dirty cleared when follow-up starts");
        h.release.send(Ok(())).unwrap();

        assert!(h.scheduler.wait_settled(key, WAIT));
        assert_eq!(h.scheduler.jobs_started(key), 2);
        assert!(h.started.try_recv().is_err());
        assert!(h.sink.is_empty());
    }

    #[test]
    fn mutation_during_follow_up_earns_third_run() {
        let h = harness();
        let key = ResourceKey::Settings;
        h.scheduler.notify_mutated(key);
        h.started.recv_timeout(WAIT).unwrap();
        h.scheduler.notify_mutated(key);
        h.release.send(Ok(())).unwrap();

        h.started.recv_timeout(WAIT).unwrap();
        h.counter.store(9, Ordering::SeqCst);
        h.scheduler.notify_mutated(key);
        h.release.send(Ok(())).unwrap();

        assert_eq!(h.started.recv_timeout(WAIT).unwrap(), b"9");
        h.release.send(Ok(())).unwrap();
        assert!(h.scheduler.wait_settled(key, WAIT));
        assert_eq!(h.scheduler.jobs_started(key), 3);
    }

    #[test]
    fn quiet_mutations_each_start_their_own_job() {
        let h = harness();
        let key = ResourceKey::Settings;
        for _ in 0..3 {
            h.scheduler.notify_mutated(key);
            h.started.recv_timeout(WAIT).unwrap();
            h.release.send(Ok(())).unwrap();
            assert!(h.scheduler.wait_settled(key, WAIT));
        }
        assert_eq!(h.scheduler.jobs_started(key), 3);
    }

    #[test]
    fn failure_is_reported_and_clears_in_flight_without_retry() {
        let h = harness();
        let key = ResourceKey::Settings;
        h.scheduler.notify_mutated(key);
        h.started.recv_timeout(WAIT).unwrap();
        h.release
            .send(Err(SyncError::Permission("trapsync/settings.json".into())))
            .unwrap();
        assert!(h.scheduler.wait_settled(key, WAIT));
        assert_eq!(h.scheduler.failures(key), 1);
        assert_eq!(h.sink.take(), vec![
            "syncing settings: permission denied: trapsync/settings.json".to_string()
        ]);
        // No automatic retry.
        assert!(h.started.recv_timeout(Duration::from_millis(50)).is_err());

        // The next mutation is what tries again.
        h.scheduler.notify_mutated(key);
        h.started.recv_timeout(WAIT).unwrap();
        h.release.send(Ok(())).unwrap();
        assert!(h.scheduler.wait_settled(key, WAIT));
        assert_eq!(h.scheduler.jobs_started(key), 2);
    }

    #[test]
    fn failure_with_pending_mutation_still_runs_follow_up() {
        let h = harness();
        let key = ResourceKey::Settings;
        h.scheduler.notify_mutated(key);
        h.started.recv_timeout(WAIT).unwrap();
        h.scheduler.notify_mutated(key);
        h.release.send(Err(SyncError::transfer("x", "reset"))).unwrap();
        h.started.recv_timeout(WAIT).unwrap();
        h.release.send(Ok(())).unwrap();
        assert!(h.scheduler.wait_settled(key, WAIT));
        assert_eq!(h.scheduler.jobs_started(key), 2);
        assert_eq!(h.scheduler.failures(key), 1);
    }

    struct PanickingPusher;

    impl PushOperation for PanickingPusher {
        fn push(&self, _: ResourceKey, _: &[u8]) -> Result<(), SyncError> {
            panic!("encoder bug")
        }
    }

    #[test]
    fn panicking_push_still_settles() {
        let sink = Arc::new(CollectingErrorSink::new());
        let lane = SequentialLane::start("test-sync-panic").unwrap();
        let scheduler = SyncScheduler::new(lane, Arc::new(PanickingPusher), sink.clone());
        scheduler.register(ResourceKey::SpeciesCatalog, Arc::new(|| Ok(b"[]".to_vec())));
        scheduler.notify_mutated(ResourceKey::SpeciesCatalog);
        assert!(scheduler.wait_settled(ResourceKey::SpeciesCatalog, WAIT));
        assert_eq!(scheduler.failures(ResourceKey::SpeciesCatalog), 1);
        assert_eq!(sink.len(), 1);
    }

    /// Pusher that tracks overlapping executions per key.
    #[derive(Default)]
    struct OverlapPusher {
        running: [AtomicUsize; 4],
        max_seen: [AtomicUsize; 4],
        pushes: AtomicUsize,
    }

    impl PushOperation for OverlapPusher {
        fn push(&self, key: ResourceKey, _: &[u8]) -> Result<(), SyncError> {
            let i = key.index();
            let now = self.running[i].fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen[i].fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.running[i].fetch_sub(1, Ordering::SeqCst);
            self.pushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn concurrent_mutations_never_overlap_jobs_per_key() {
        let pusher = Arc::new(OverlapPusher::default());
        let lane = SequentialLane::start("test-sync-overlap").unwrap();
        let scheduler = SyncScheduler::new(lane, pusher.clone(), Arc::new(CollectingErrorSink::new()));
        for key in ResourceKey::ALL {
            scheduler.register(key, Arc::new(|| Ok(Vec::new())));
        }
        let writers: Vec<_> = (0..8)
            .map(|t| {
                let s = Arc::clone(&scheduler);
                thread::spawn(move || {
                    for i in 0..200 {
                        s.notify_mutated(ResourceKey::ALL[(t + i) % 4]);
                        if i % 50 == 0 {
                            thread::sleep(Duration::from_millis(1));
                        }
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert!(scheduler.wait_all_settled(WAIT));
        for key in ResourceKey::ALL {
            assert_eq!(pusher.max_seen[key.index()].load(Ordering::SeqCst), 1);
            assert!(scheduler.jobs_started(key) >= 1);
            assert!(!scheduler.is_dirty(key));
        }
        let total: u64 = ResourceKey::ALL.iter().map(|&k| scheduler.jobs_started(k)).sum();
        assert_eq!(pusher.pushes.load(Ordering::SeqCst) as u64, total);
        assert!(total < 1600, "mutations were coalesced");
    }
}
