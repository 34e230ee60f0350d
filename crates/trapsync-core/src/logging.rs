//! Logging init: file under the XDG state dir, or stderr when that fails.
//!
//! Records carry the thread name, so lines from the sequential sync lane
//! (`trapsync-sync`) and the upload threads (`trapsync-task-N`) can be told apart.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,trapsync=debug,trapsync_core=debug";

const LOG_FILE_NAME: &str = "trapsync.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Path of the log file: `~/.local/state/trapsync/trapsync.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("trapsync")?;
    Ok(xdg_dirs.get_state_home().join(LOG_FILE_NAME))
}

/// Log to the default file. Returns Err if the state dir is unwritable so
/// the caller can fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    init_logging_at(&log_file_path()?)
}

/// Log to `path` (appending), creating its parent directory.
pub fn init_logging_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_thread_names(true)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!("trapsync logging to {}", path.display());
    Ok(())
}

/// Log to stderr only. Never fails; a second call is a no-op.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init();
}
