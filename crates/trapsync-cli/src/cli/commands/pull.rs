//! `trapsync pull` – fetch the per-user documents from the remote.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use trapsync_core::config::TrapsyncConfig;
use trapsync_core::report::CollectingErrorSink;
use trapsync_core::sync::ResourceKey;
use trapsync_core::SyncContext;

fn default_out_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("trapsync")?;
    Ok(xdg_dirs.get_state_home().join("documents"))
}

pub async fn run_pull(cfg: TrapsyncConfig, out: Option<PathBuf>) -> Result<()> {
    let out = match out {
        Some(dir) => dir,
        None => default_out_dir()?,
    };
    let ctx = SyncContext::from_config(cfg, Arc::new(CollectingErrorSink::new()))?;
    let adopted = ctx
        .pull_resources()?
        .join()
        .await?
        .context("pulling remote documents")?;

    if adopted.is_empty() {
        println!("Remote has no documents yet.");
        return Ok(());
    }
    tokio::fs::create_dir_all(&out)
        .await
        .with_context(|| format!("creating {}", out.display()))?;
    for key in adopted {
        let body = match key {
            ResourceKey::SpeciesCatalog => ctx.species().snapshot()?,
            ResourceKey::LocationCatalog => ctx.locations().snapshot()?,
            ResourceKey::Settings => ctx.settings().snapshot()?,
            ResourceKey::MetadataTree => ctx.metadata().snapshot()?,
        };
        let path = out.join(key.document_name());
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{:<18} -> {}", key, path.display());
    }
    Ok(())
}
