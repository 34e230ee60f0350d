use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
///
/// Absent by default: a failed part transfer aborts the upload on the first error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per archive part (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 20,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Deadlines applied by the remote backends. Unset means no deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Deadline for opening and authenticating one session.
    #[serde(default)]
    pub connect_secs: Option<u64>,
    /// Deadline for one document or archive transfer.
    #[serde(default)]
    pub transfer_secs: Option<u64>,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Option<Duration> {
        self.connect_secs.map(Duration::from_secs)
    }

    pub fn transfer(&self) -> Option<Duration> {
        self.transfer_secs.map(Duration::from_secs)
    }
}

/// Remote store backend: a directory (mounted share, local mirror) or an HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteConfig {
    Dir {
        path: PathBuf,
    },
    Http {
        base_url: String,
        username: String,
        /// Environment variable holding the password; never stored in the config file.
        #[serde(default = "default_password_env")]
        password_env: String,
    },
}

fn default_password_env() -> String {
    "TRAPSYNC_PASSWORD".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let path = xdg::BaseDirectories::with_prefix("trapsync")
            .map(|d| d.get_data_home().join("remote"))
            .unwrap_or_else(|_| PathBuf::from("trapsync-remote"));
        RemoteConfig::Dir { path }
    }
}

impl RemoteConfig {
    /// User name recorded in upload manifests and upload folder names.
    pub fn username(&self) -> String {
        match self {
            RemoteConfig::Http { username, .. } => username.clone(),
            RemoteConfig::Dir { .. } => std::env::var("USER").unwrap_or_else(|_| "local".to_string()),
        }
    }
}

/// Global configuration loaded from `~/.config/trapsync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapsyncConfig {
    /// Maximum number of source files folded into one archive part.
    pub max_files_per_part: usize,
    /// Optional byte bound per archive part; a part closes early once its files reach it.
    #[serde(default)]
    pub max_part_bytes: Option<u64>,
    /// Remote folder holding the per-user species, location, settings and metadata documents.
    pub user_root: String,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Optional retry policy for archive part transfers; if missing, parts are not retried.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for TrapsyncConfig {
    fn default() -> Self {
        Self {
            max_files_per_part: 900,
            max_part_bytes: None,
            user_root: "trapsync".to_string(),
            remote: RemoteConfig::default(),
            timeouts: TimeoutConfig::default(),
            retry: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("trapsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TrapsyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TrapsyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TrapsyncConfig = toml::from_str(&data)?;
    Ok(cfg)
}
