//! One remote session per worker thread.
//!
//! Sessions are expensive to open and unsafe to share, so the pool keys them
//! by the calling thread: a job or pipeline step opens a session, uses it on
//! the same thread start to finish, and closes it. Callers should prefer
//! [`SessionPool::acquire`], whose guard closes the session on every exit path.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::error::SyncError;
use crate::remote::{RemoteSession, SessionFactory};
use crate::report::ErrorSink;

/// Shared handle to the calling thread's open session.
pub type SessionHandle = Arc<Mutex<Box<dyn RemoteSession>>>;

/// Failed opens remembered at most; the oldest is dropped first. Concurrent
/// tasks run on fresh threads that never come back to clear their entry.
const MAX_RECORDED_FAILURES: usize = 64;

pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    sessions: Mutex<HashMap<ThreadId, SessionHandle>>,
    last_error: Mutex<VecDeque<(ThreadId, String)>>,
    errors: Arc<dyn ErrorSink>,
    opened_total: AtomicU64,
}

impl SessionPool {
    pub fn new(factory: Arc<dyn SessionFactory>, errors: Arc<dyn ErrorSink>) -> Self {
        Self {
            factory,
            sessions: Mutex::new(HashMap::new()),
            last_error: Mutex::new(VecDeque::new()),
            errors,
            opened_total: AtomicU64::new(0),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<ThreadId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failures(&self) -> MutexGuard<'_, VecDeque<(ThreadId, String)>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_failure(&self, thread: ThreadId) {
        self.failures().retain(|(t, _)| *t != thread);
    }

    fn record_failure(&self, thread: ThreadId, cause: &SyncError) {
        let mut failures = self.failures();
        failures.retain(|(t, _)| *t != thread);
        failures.push_back((thread, cause.to_string()));
        while failures.len() > MAX_RECORDED_FAILURES {
            failures.pop_front();
        }
    }

    /// `Ok(true)` if a new session was opened for this thread, `Ok(false)` if
    /// the thread already owns one. A refused open records its cause; a
    /// successful one clears the thread's earlier cause.
    fn try_open(&self) -> Result<bool, SyncError> {
        let me = thread::current().id();
        if self.sessions().contains_key(&me) {
            return Ok(false);
        }
        // The handshake runs without the map lock so other workers are not held up.
        let session = match self.factory.open() {
            Ok(session) => session,
            Err(e) => {
                self.record_failure(me, &e);
                return Err(e);
            }
        };
        self.sessions().insert(me, Arc::new(Mutex::new(session)));
        self.clear_failure(me);
        self.opened_total.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(thread = ?me, remote = %self.factory.describe(), "session opened");
        Ok(true)
    }

    /// Open a session for the calling thread.
    ///
    /// Returns false, leaving state unchanged, if the thread already owns a
    /// session. Returns false and records the cause if the remote refuses.
    pub fn open(&self) -> bool {
        match self.try_open() {
            Ok(opened) => opened,
            Err(e) => {
                self.errors.report("opening a remote session", &e);
                false
            }
        }
    }

    /// Close the calling thread's session, if any, and forget its last
    /// failed open. Idempotent.
    pub fn close(&self) {
        let me = thread::current().id();
        self.clear_failure(me);
        let Some(handle) = self.sessions().remove(&me) else {
            return;
        };
        let mut session = handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = session.close() {
            self.errors.report("closing a remote session", &e);
        }
        tracing::debug!(thread = ?me, "session closed");
    }

    /// The calling thread's session, without side effects.
    pub fn current(&self) -> Option<SessionHandle> {
        self.sessions().get(&thread::current().id()).cloned()
    }

    /// Cause of the calling thread's most recent failed open, through
    /// [`open`](Self::open) or [`acquire`](Self::acquire), unless a later
    /// open succeeded or the thread closed since.
    pub fn last_error(&self) -> Option<String> {
        let me = thread::current().id();
        self.failures()
            .iter()
            .find(|(t, _)| *t == me)
            .map(|(_, cause)| cause.clone())
    }

    /// Number of sessions currently open across all threads.
    pub fn open_count(&self) -> usize {
        self.sessions().len()
    }

    /// Sessions opened since the pool was created.
    pub fn opened_total(&self) -> u64 {
        self.opened_total.load(Ordering::Relaxed)
    }

    /// Scoped acquisition: opens a session for this thread (or reuses the one
    /// an enclosing guard already opened) and closes it when the outermost
    /// guard drops, including on error and panic paths.
    pub fn acquire(&self) -> Result<SessionGuard<'_>, SyncError> {
        let owned = self.try_open()?;
        let handle = self
            .current()
            .ok_or_else(|| SyncError::Session("session vanished after open".into()))?;
        Ok(SessionGuard {
            pool: self,
            handle,
            owned,
        })
    }
}

/// Exclusive use of the calling thread's session for one unit of work.
pub struct SessionGuard<'a> {
    pool: &'a SessionPool,
    handle: SessionHandle,
    owned: bool,
}

impl SessionGuard<'_> {
    /// Run `f` against the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn RemoteSession) -> R) -> R {
        let mut session = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **session)
    }

    /// True if this guard opened the session and will close it.
    pub fn owns_session(&self) -> bool {
        self.owned
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.owned {
            self.pool.close();
        }
    }
}
