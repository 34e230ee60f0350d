//! `trapsync push` – adopt a local JSON document and push it.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use trapsync_core::config::TrapsyncConfig;
use trapsync_core::report::CollectingErrorSink;
use trapsync_core::sync::ResourceKey;
use trapsync_core::SyncContext;

use super::print_reports;

pub async fn run_push(cfg: TrapsyncConfig, key: ResourceKey, file: &Path, timeout_secs: u64) -> Result<()> {
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let sink = Arc::new(CollectingErrorSink::new());
    let ctx = Arc::new(SyncContext::from_config(cfg, sink.clone())?);
    ctx.adopt_json(key, &body)
        .with_context(|| format!("{} is not a valid {} document", file.display(), key))?;

    let waiter = Arc::clone(&ctx);
    let settled =
        tokio::task::spawn_blocking(move || waiter.wait_synced(Duration::from_secs(timeout_secs))).await?;
    if !settled {
        bail!("{} push still running after {}s", key, timeout_secs);
    }
    if ctx.scheduler().failures(key) > 0 {
        print_reports(&sink);
        bail!("{} push failed", key);
    }
    println!("pushed {} ({} bytes)", key, body.len());
    Ok(())
}
