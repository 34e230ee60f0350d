//! Remote data store seam.
//!
//! A [`SessionFactory`] opens one authenticated [`RemoteSession`] from stored
//! credentials. Sessions are stateful and not safe to share between threads at
//! the same time; [`SessionPool`](crate::session::SessionPool) hands them out
//! one per worker thread.
//!
//! Two backends ship with the core: [`DirSessionFactory`] (a mounted or local
//! directory) and [`HttpSessionFactory`] (HTTP PUT/GET over curl).

mod dir;
mod http;

use std::path::Path;
use std::sync::Arc;

use crate::config::{RemoteConfig, TimeoutConfig};
use crate::error::SyncError;

pub use dir::DirSessionFactory;
pub use http::HttpSessionFactory;

/// Byte-progress callback for file transfers: `(bytes_sent, bytes_total)`.
/// Returning `false` asks the session to abort with [`SyncError::Cancelled`].
pub type TransferCallback<'a> = &'a mut dyn FnMut(u64, u64) -> bool;

/// One open, authenticated connection to the remote store.
pub trait RemoteSession: Send {
    /// Write a whole document at `remote_path`, replacing any previous value.
    fn put_document(&mut self, remote_path: &str, body: &[u8]) -> Result<(), SyncError>;

    /// Read a whole document; `Ok(None)` when it does not exist.
    fn get_document(&mut self, remote_path: &str) -> Result<Option<Vec<u8>>, SyncError>;

    /// Stream a local file to `remote_path`, reporting bytes sent as it goes.
    fn put_file(
        &mut self,
        local: &Path,
        remote_path: &str,
        on_progress: TransferCallback<'_>,
    ) -> Result<(), SyncError>;

    /// Tear the session down. Called exactly once, by the thread that opened it.
    fn close(&mut self) -> Result<(), SyncError>;
}

/// Opens sessions from stored credentials.
pub trait SessionFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn RemoteSession>, SyncError>;

    /// Short human-readable description of the target (for logs).
    fn describe(&self) -> String;
}

/// Join remote path segments with `/`, dropping empty segments and stray slashes.
pub fn join_remote<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        for seg in part.as_ref().split('/').filter(|s| !s.is_empty() && *s != ".") {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(seg);
        }
    }
    out
}

/// Build the session factory described by the `[remote]` config section.
pub fn factory_from_config(
    remote: &RemoteConfig,
    timeouts: TimeoutConfig,
) -> anyhow::Result<Arc<dyn SessionFactory>> {
    match remote {
        RemoteConfig::Dir { path } => Ok(Arc::new(
            DirSessionFactory::new(path.clone()).with_timeouts(timeouts),
        )),
        RemoteConfig::Http {
            base_url,
            username,
            password_env,
        } => {
            let password = std::env::var(password_env).map_err(|_| {
                anyhow::anyhow!("password for {} not set in ${}", username, password_env)
            })?;
            let factory = HttpSessionFactory::new(base_url, username, &password)?
                .with_timeouts(timeouts);
            Ok(Arc::new(factory))
        }
    }
}
