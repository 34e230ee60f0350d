//! HTTP remote store over curl: `PUT` to write, `GET` to read, basic auth.
//!
//! One curl `Easy` handle per session keeps the connection alive across
//! requests; `Easy` must not be driven from two threads at once, which is
//! exactly the exclusivity the session pool provides.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use curl::easy::{Easy, ReadError};
use url::Url;

use crate::config::TimeoutConfig;
use crate::error::SyncError;
use crate::retry::{classify_curl_error, ErrorKind};

use super::{RemoteSession, SessionFactory, TransferCallback};

/// Opens authenticated sessions against an HTTP base URL.
#[derive(Clone)]
pub struct HttpSessionFactory {
    base: Url,
    username: String,
    password: String,
    timeouts: TimeoutConfig,
}

impl std::fmt::Debug for HttpSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSessionFactory")
            .field("base", &self.base.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl HttpSessionFactory {
    pub fn new(base_url: &str, username: &str, password: &str) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("unsupported remote scheme: {}", base.scheme());
        }
        // `Url::join` drops the last segment unless the base ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            username: username.to_string(),
            password: password.to_string(),
            timeouts: TimeoutConfig::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Absolute URL for a remote path.
    pub fn url_for(&self, remote_path: &str) -> Result<Url, SyncError> {
        self.base
            .join(remote_path.trim_start_matches('/'))
            .map_err(|e| SyncError::transfer(remote_path, e))
    }
}

impl SessionFactory for HttpSessionFactory {
    fn open(&self) -> Result<Box<dyn RemoteSession>, SyncError> {
        let mut session = HttpSession {
            easy: Easy::new(),
            factory: self.clone(),
        };
        // Authenticate with a HEAD on the base URL.
        session
            .configure(&self.base)
            .map_err(|e| SyncError::Session(e.to_string()))?;
        session
            .easy
            .nobody(true)
            .map_err(|e| SyncError::Session(e.to_string()))?;
        if let Err(e) = session.easy.perform() {
            return Err(match classify_curl_error(&e) {
                ErrorKind::Timeout => SyncError::Timeout(format!("connect {}", self.base)),
                _ => SyncError::Session(format!("{}: {}", self.base, e)),
            });
        }
        let code = session
            .easy
            .response_code()
            .map_err(|e| SyncError::Session(e.to_string()))?;
        match code {
            401 | 403 => Err(SyncError::Session(format!(
                "authentication rejected for {} (HTTP {})",
                self.username, code
            ))),
            200..=399 => {
                tracing::debug!(base = %self.base, "http session opened");
                Ok(Box::new(session))
            }
            other => Err(SyncError::Session(format!(
                "{} answered HTTP {}",
                self.base, other
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("{} as {}", self.base, self.username)
    }
}

struct HttpSession {
    easy: Easy,
    factory: HttpSessionFactory,
}

fn curl_to_sync(target: &str, e: curl::Error) -> SyncError {
    if e.is_aborted_by_callback() {
        return SyncError::Cancelled;
    }
    match classify_curl_error(&e) {
        ErrorKind::Timeout => SyncError::Timeout(target.to_string()),
        _ => SyncError::transfer(target, e),
    }
}

fn status_to_sync(target: &str, code: u32) -> Result<(), SyncError> {
    match code {
        200..=299 => Ok(()),
        401 | 403 => Err(SyncError::Permission(format!("{} (HTTP {})", target, code))),
        other => Err(SyncError::Http {
            target: target.to_string(),
            status: other,
        }),
    }
}

impl HttpSession {
    /// Reset per-request state and apply auth, deadlines and the target URL.
    fn configure(&mut self, url: &Url) -> Result<(), curl::Error> {
        self.easy.reset();
        self.easy.url(url.as_str())?;
        self.easy.username(&self.factory.username)?;
        self.easy.password(&self.factory.password)?;
        self.easy.follow_location(true)?;
        if let Some(d) = self.factory.timeouts.connect() {
            self.easy.connect_timeout(d)?;
        }
        if let Some(d) = self.factory.timeouts.transfer() {
            self.easy.timeout(d)?;
        } else {
            // No hard deadline: only abort a transfer that stalls completely.
            self.easy.low_speed_limit(1)?;
            self.easy.low_speed_time(Duration::from_secs(300))?;
        }
        Ok(())
    }
}

impl RemoteSession for HttpSession {
    fn put_document(&mut self, remote_path: &str, body: &[u8]) -> Result<(), SyncError> {
        let url = self.factory.url_for(remote_path)?;
        let err = |e| curl_to_sync(remote_path, e);
        self.configure(&url).map_err(err)?;
        self.easy.upload(true).map_err(err)?;
        self.easy.in_filesize(body.len() as u64).map_err(err)?;
        let mut remaining = body;
        {
            let mut transfer = self.easy.transfer();
            transfer
                .read_function(|into| {
                    let n = remaining.len().min(into.len());
                    into[..n].copy_from_slice(&remaining[..n]);
                    remaining = &remaining[n..];
                    Ok(n)
                })
                .map_err(err)?;
            transfer.perform().map_err(err)?;
        }
        let code = self.easy.response_code().map_err(err)?;
        status_to_sync(remote_path, code)
    }

    fn get_document(&mut self, remote_path: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let url = self.factory.url_for(remote_path)?;
        let err = |e| curl_to_sync(remote_path, e);
        self.configure(&url).map_err(err)?;
        self.easy.get(true).map_err(err)?;
        let mut body = Vec::new();
        {
            let mut transfer = self.easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(err)?;
            transfer.perform().map_err(err)?;
        }
        let code = self.easy.response_code().map_err(err)?;
        if code == 404 {
            return Ok(None);
        }
        status_to_sync(remote_path, code)?;
        Ok(Some(body))
    }

    fn put_file(
        &mut self,
        local: &Path,
        remote_path: &str,
        on_progress: TransferCallback<'_>,
    ) -> Result<(), SyncError> {
        let url = self.factory.url_for(remote_path)?;
        let mut file = File::open(local).map_err(SyncError::Archive)?;
        let total = file.metadata().map_err(SyncError::Archive)?.len();
        let err = |e| curl_to_sync(remote_path, e);
        self.configure(&url).map_err(err)?;
        self.easy.upload(true).map_err(err)?;
        self.easy.in_filesize(total).map_err(err)?;
        self.easy.progress(true).map_err(err)?;
        {
            let mut transfer = self.easy.transfer();
            transfer
                .read_function(|into| file.read(into).map_err(|_| ReadError::Abort))
                .map_err(err)?;
            transfer
                .progress_function(|_dltotal, _dlnow, _ultotal, ulnow| {
                    on_progress(ulnow as u64, total)
                })
                .map_err(err)?;
            transfer.perform().map_err(err)?;
        }
        let code = self.easy.response_code().map_err(err)?;
        status_to_sync(remote_path, code)?;
        on_progress(total, total);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SyncError> {
        self.easy.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash_and_joins() {
        let f = HttpSessionFactory::new("https://data.example.org/dav", "u", "p").unwrap();
        assert_eq!(
            f.url_for("trapsync/species.json").unwrap().as_str(),
            "https://data.example.org/dav/trapsync/species.json"
        );
        assert_eq!(
            f.url_for("/Collections/a b/upload.json").unwrap().as_str(),
            "https://data.example.org/dav/Collections/a%20b/upload.json"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(HttpSessionFactory::new("ftp://example.org/", "u", "p").is_err());
        assert!(HttpSessionFactory::new("not a url", "u", "p").is_err());
    }

    #[test]
    fn status_mapping() {
        assert!(status_to_sync("x", 201).is_ok());
        assert!(matches!(status_to_sync("x", 403), Err(SyncError::Permission(_))));
        assert!(matches!(
            status_to_sync("x", 507),
            Err(SyncError::Http { status: 507, .. })
        ));
    }

    #[test]
    fn debug_hides_password() {
        let f = HttpSessionFactory::new("https://h/", "fieldtech", "hunter2").unwrap();
        let shown = format!("{:?}", f);
        assert!(shown.contains("fieldtech"));
        assert!(!shown.contains("hunter2"));
    }
}
