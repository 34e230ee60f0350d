//! In-memory remote store that records every call.
//!
//! Documents and files land in shared maps; `put_document` can be gated so a
//! test holds a sync job in flight, `put_file` can be told to fail on a
//! given call, and `put_document` on a given path.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use trapsync_core::remote::{RemoteSession, SessionFactory, TransferCallback};
use trapsync_core::SyncError;

#[derive(Default)]
pub struct RemoteState {
    pub documents: Mutex<BTreeMap<String, Vec<u8>>>,
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Every `put_document` in call order.
    pub pushes: Mutex<Vec<(String, Vec<u8>)>>,
    /// Every successful `put_file` target in call order.
    pub file_puts: Mutex<Vec<String>>,
    pub file_calls: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

/// How `put_file` call number `n` (0-based, counting every attempt) should fail.
pub type FileFailure = Box<dyn Fn(usize) -> Option<SyncError> + Send + Sync>;

/// How `put_document` to a path should fail.
pub type DocumentFailure = Box<dyn Fn(&str) -> Option<SyncError> + Send + Sync>;

/// Gate for `put_document`: each push announces itself and waits for a release.
pub struct PushGate {
    pub started: Mutex<mpsc::Sender<String>>,
    pub release: Mutex<mpsc::Receiver<()>>,
}

pub struct RecordingFactory {
    pub state: Arc<RemoteState>,
    fail_file: Option<Arc<FileFailure>>,
    fail_document: Option<Arc<DocumentFailure>>,
    gate: Option<Arc<PushGate>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RemoteState::default()),
            fail_file: None,
            fail_document: None,
            gate: None,
        }
    }

    pub fn failing_documents(mut self, f: impl Fn(&str) -> Option<SyncError> + Send + Sync + 'static) -> Self {
        self.fail_document = Some(Arc::new(Box::new(f)));
        self
    }

    pub fn failing_files(mut self, f: impl Fn(usize) -> Option<SyncError> + Send + Sync + 'static) -> Self {
        self.fail_file = Some(Arc::new(Box::new(f)));
        self
    }

    /// Gate pushes; returns (started receiver, release sender).
    pub fn gated(mut self) -> (Self, mpsc::Receiver<String>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        self.gate = Some(Arc::new(PushGate {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        }));
        (self, started_rx, release_tx)
    }

    pub fn pushes(&self) -> Vec<(String, Vec<u8>)> {
        self.state.pushes.lock().unwrap().clone()
    }

    pub fn file_puts(&self) -> Vec<String> {
        self.state.file_puts.lock().unwrap().clone()
    }

    pub fn document(&self, path: &str) -> Option<Vec<u8>> {
        self.state.documents.lock().unwrap().get(path).cloned()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.files.lock().unwrap().get(path).cloned()
    }
}

impl SessionFactory for RecordingFactory {
    fn open(&self) -> Result<Box<dyn RemoteSession>, SyncError> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            state: Arc::clone(&self.state),
            fail_file: self.fail_file.clone(),
            fail_document: self.fail_document.clone(),
            gate: self.gate.clone(),
        }))
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

struct RecordingSession {
    state: Arc<RemoteState>,
    fail_file: Option<Arc<FileFailure>>,
    fail_document: Option<Arc<DocumentFailure>>,
    gate: Option<Arc<PushGate>>,
}

impl RemoteSession for RecordingSession {
    fn put_document(&mut self, remote_path: &str, body: &[u8]) -> Result<(), SyncError> {
        if let Some(gate) = &self.gate {
            gate.started.lock().unwrap().send(remote_path.to_string()).unwrap();
            gate.release.lock().unwrap().recv().unwrap();
        }
        if let Some(fail) = &self.fail_document {
            if let Some(e) = fail(remote_path) {
                return Err(e);
            }
        }
        self.state
            .pushes
            .lock()
            .unwrap()
            .push((remote_path.to_string(), body.to_vec()));
        self.state
            .documents
            .lock()
            .unwrap()
            .insert(remote_path.to_string(), body.to_vec());
        Ok(())
    }

    fn get_document(&mut self, remote_path: &str) -> Result<Option<Vec<u8>>, SyncError> {
        Ok(self.state.documents.lock().unwrap().get(remote_path).cloned())
    }

    fn put_file(&mut self, local: &Path, remote_path: &str, on_progress: TransferCallback<'_>) -> Result<(), SyncError> {
        let call = self.state.file_calls.fetch_add(1, Ordering::SeqCst);
        let body = fs::read(local).map_err(SyncError::Archive)?;
        let total = body.len() as u64;
        if !on_progress(0, total) {
            return Err(SyncError::Cancelled);
        }
        if let Some(fail) = &self.fail_file {
            if let Some(e) = fail(call) {
                return Err(e);
            }
        }
        if !on_progress(total / 2, total) {
            return Err(SyncError::Cancelled);
        }
        self.state.files.lock().unwrap().insert(remote_path.to_string(), body);
        self.state.file_puts.lock().unwrap().push(remote_path.to_string());
        on_progress(total, total);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SyncError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
