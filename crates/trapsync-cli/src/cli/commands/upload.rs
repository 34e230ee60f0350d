//! `trapsync upload` – send a directory in archive parts and record it in the ledger.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use trapsync_core::config::TrapsyncConfig;
use trapsync_core::ledger::{UploadLedger, UploadState};
use trapsync_core::model::MetadataTree;
use trapsync_core::progress::TransferEvent;
use trapsync_core::report::CollectingErrorSink;
use trapsync_core::{SyncContext, SyncError};

use super::print_reports;

const PROGRESS_INTERVAL_MS: u128 = 500;

#[derive(Debug, Clone)]
pub struct UploadArgs {
    pub dir: PathBuf,
    pub collection: String,
    pub max_files: Option<usize>,
    pub description: String,
    pub metadata: Option<PathBuf>,
}

pub async fn run_upload(mut cfg: TrapsyncConfig, ledger: &UploadLedger, args: UploadArgs) -> Result<()> {
    let recovered = ledger.recover_interrupted().await?;
    if recovered > 0 {
        tracing::info!("marked {} interrupted upload(s) as failed", recovered);
    }
    if let Some(n) = args.max_files {
        cfg.max_files_per_part = n;
    }
    if cfg.max_files_per_part == 0 {
        anyhow::bail!("--max-files must be at least 1");
    }
    let source = args
        .dir
        .canonicalize()
        .with_context(|| format!("upload source {}", args.dir.display()))?;

    let sink = Arc::new(CollectingErrorSink::new());
    let ctx = SyncContext::from_config(cfg, sink.clone())?;
    if let Some(path) = &args.metadata {
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let tree: MetadataTree = serde_json::from_slice(&body)
            .with_context(|| format!("{} is not a metadata tree", path.display()))?;
        ctx.metadata().load(tree);
    }

    let req = ctx.upload_request(&source, &args.collection, &args.description);
    let id = ledger
        .record_start(&source.display().to_string(), &req.destination)
        .await?;
    println!("uploading {} -> {}", source.display(), req.destination);

    let (handle, mut stream) = ctx.submit_upload(req)?;
    let mut last_print = Instant::now();
    let mut parts_seen = 0usize;
    while let Some(ev) = stream.next().await {
        match ev {
            TransferEvent::Planned {
                part_count,
                total_files,
                overall_total,
            } => {
                ledger.set_plan(id, total_files, part_count).await?;
                println!(
                    "  {} file(s) in {} part(s), {:.1} MiB",
                    total_files,
                    part_count,
                    overall_total as f64 / 1_048_576.0
                );
            }
            TransferEvent::PartStarted { index, bytes_total } => {
                tracing::debug!(index, bytes_total, "part started");
            }
            TransferEvent::Bytes(p) => {
                if last_print.elapsed().as_millis() >= PROGRESS_INTERVAL_MS {
                    let eta = p
                        .eta_secs()
                        .map(|s| format!("{:.0}s", s))
                        .unwrap_or_else(|| "?".to_string());
                    println!(
                        "  part {}/{}  {:.1}%  {:.2} MiB/s  ETA {}",
                        p.part_index + 1,
                        p.part_count,
                        p.fraction() * 100.0,
                        p.bytes_per_sec() / 1_048_576.0,
                        eta
                    );
                    last_print = Instant::now();
                }
            }
            TransferEvent::PartSent { index } => {
                ledger.mark_part_sent(id, index).await?;
                parts_seen = parts_seen.max(index + 1);
                println!("  part {} sent", index);
            }
        }
    }

    let outcome = handle.join().await;
    match outcome {
        Ok(Ok(manifest)) => {
            ledger.finish_completed(id, &manifest).await?;
            println!(
                "done: {} file(s), {} tagged, {} part(s) in {}",
                manifest.total_file_count,
                manifest.tagged_file_count,
                manifest.parts.len(),
                manifest.destination
            );
            Ok(())
        }
        Ok(Err(err)) => {
            let state = match err.root() {
                SyncError::Cancelled => UploadState::Cancelled,
                _ => UploadState::Failed,
            };
            ledger.finish_unsuccessful(id, state, &err.to_string()).await?;
            print_reports(&sink);
            let sent = parts_on_remote(parts_seen, &err);
            Err(anyhow!(err).context(format!(
                "upload {} stopped; {} part(s) remain on the remote",
                id, sent
            )))
        }
        Err(lane) => {
            ledger
                .finish_unsuccessful(id, UploadState::Failed, &lane.to_string())
                .await?;
            Err(anyhow!(lane).context(format!("upload {} did not finish", id)))
        }
    }
}

/// Parts left on the remote by a stopped upload: the `PartSent` events seen,
/// or what the error itself reports if the stream was cut short.
pub(crate) fn parts_on_remote(parts_seen: usize, err: &SyncError) -> usize {
    parts_seen.max(err.parts_sent().unwrap_or(0))
}
