//! Directory-backed remote store (mounted share or local mirror).
//!
//! Writes land in a `.part` sibling first and are renamed into place, so a
//! reader never sees a half-written document or archive.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use crate::config::TimeoutConfig;
use crate::error::SyncError;

use super::{RemoteSession, SessionFactory, TransferCallback};

const COPY_BUF: usize = 256 * 1024;

/// Opens sessions rooted at a directory.
#[derive(Debug, Clone)]
pub struct DirSessionFactory {
    root: PathBuf,
    timeouts: TimeoutConfig,
}

impl DirSessionFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeouts: TimeoutConfig::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SessionFactory for DirSessionFactory {
    fn open(&self) -> Result<Box<dyn RemoteSession>, SyncError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| SyncError::Session(format!("{}: {}", self.root.display(), e)))?;
        let meta = fs::metadata(&self.root)
            .map_err(|e| SyncError::Session(format!("{}: {}", self.root.display(), e)))?;
        if meta.permissions().readonly() {
            return Err(SyncError::Session(format!(
                "{} is read-only",
                self.root.display()
            )));
        }
        Ok(Box::new(DirSession {
            root: self.root.clone(),
            timeouts: self.timeouts,
        }))
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}

struct DirSession {
    root: PathBuf,
    timeouts: TimeoutConfig,
}

/// `file.tar` -> `file.tar.part`
fn part_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}

fn map_io(target: &str, e: io::Error) -> SyncError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => SyncError::Permission(target.to_string()),
        _ => SyncError::transfer(target, e),
    }
}

impl DirSession {
    /// Map a remote path under the root, refusing anything that escapes it.
    fn resolve(&self, remote_path: &str) -> Result<PathBuf, SyncError> {
        let rel = Path::new(remote_path);
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || remote_path.is_empty() {
            return Err(SyncError::Permission(format!(
                "{} is outside the remote root",
                remote_path
            )));
        }
        Ok(self.root.join(rel))
    }

    fn prepare_parent(&self, path: &Path, target: &str) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| map_io(target, e))?;
        }
        Ok(())
    }
}

impl RemoteSession for DirSession {
    fn put_document(&mut self, remote_path: &str, body: &[u8]) -> Result<(), SyncError> {
        let dest = self.resolve(remote_path)?;
        self.prepare_parent(&dest, remote_path)?;
        let tmp = part_path(&dest);
        fs::write(&tmp, body).map_err(|e| map_io(remote_path, e))?;
        fs::rename(&tmp, &dest).map_err(|e| map_io(remote_path, e))?;
        Ok(())
    }

    fn get_document(&mut self, remote_path: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let src = self.resolve(remote_path)?;
        match fs::read(&src) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io(remote_path, e)),
        }
    }

    fn put_file(
        &mut self,
        local: &Path,
        remote_path: &str,
        on_progress: TransferCallback<'_>,
    ) -> Result<(), SyncError> {
        let dest = self.resolve(remote_path)?;
        self.prepare_parent(&dest, remote_path)?;
        let mut src = File::open(local).map_err(SyncError::Archive)?;
        let total = src.metadata().map_err(SyncError::Archive)?.len();
        let tmp = part_path(&dest);
        let mut out = File::create(&tmp).map_err(|e| map_io(remote_path, e))?;

        let started = Instant::now();
        let deadline = self.timeouts.transfer();
        let mut buf = vec![0u8; COPY_BUF];
        let mut sent = 0u64;
        let copied: Result<(), SyncError> = loop {
            if !on_progress(sent, total) {
                break Err(SyncError::Cancelled);
            }
            if let Some(limit) = deadline {
                if started.elapsed() > limit {
                    break Err(SyncError::Timeout(remote_path.to_string()));
                }
            }
            let n = match src.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(SyncError::Archive(e)),
            };
            if let Err(e) = out.write_all(&buf[..n]) {
                break Err(map_io(remote_path, e));
            }
            sent += n as u64;
        };

        if let Err(e) = copied {
            drop(out);
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        out.sync_all().map_err(|e| map_io(remote_path, e))?;
        drop(out);
        fs::rename(&tmp, &dest).map_err(|e| map_io(remote_path, e))?;
        on_progress(sent, total);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SyncError> {
        Ok(())
    }
}
