//! CLI for trapsync.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trapsync_core::config;
use trapsync_core::ledger::UploadLedger;
use trapsync_core::sync::ResourceKey;

use commands::{run_pull, run_push, run_status, run_upload, UploadArgs};

/// Top-level CLI for trapsync.
#[derive(Debug, Parser)]
#[command(name = "trapsync")]
#[command(about = "trapsync: camera-trap metadata sync and chunked image uploads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

fn parse_resource(s: &str) -> Result<ResourceKey, String> {
    ResourceKey::parse(s).ok_or_else(|| format!("unknown resource '{}' (species, locations, settings, metadata)", s))
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload a directory of images in archive parts.
    Upload {
        /// Local directory to upload.
        dir: PathBuf,

        /// Remote collection folder the upload lands under.
        #[arg(long)]
        collection: String,

        /// Files per archive part (default from config, 900).
        #[arg(long, value_name = "N")]
        max_files: Option<usize>,

        /// Free-text description stored in the upload record.
        #[arg(long, default_value = "")]
        description: String,

        /// Metadata tree (JSON) whose entries for the uploaded files are sent as meta.json.
        #[arg(long, value_name = "FILE")]
        metadata: Option<PathBuf>,
    },

    /// Show recorded uploads, newest first.
    Status,

    /// Fetch the species, location and settings documents from the remote.
    Pull {
        /// Directory to write the fetched documents to (default: state directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Replace a resource with a local JSON document and push it.
    Push {
        /// species, locations, settings or metadata.
        #[arg(value_parser = parse_resource)]
        resource: ResourceKey,

        /// JSON document to adopt.
        file: PathBuf,

        /// Seconds to wait for the push to finish.
        #[arg(long, default_value = "120", value_name = "SECS")]
        timeout: u64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Upload {
                dir,
                collection,
                max_files,
                description,
                metadata,
            } => {
                let ledger = UploadLedger::open_default().await?;
                let args = UploadArgs {
                    dir,
                    collection,
                    max_files,
                    description,
                    metadata,
                };
                run_upload(cfg, &ledger, args).await?;
            }
            CliCommand::Status => {
                let ledger = UploadLedger::open_default().await?;
                run_status(&ledger).await?;
            }
            CliCommand::Pull { out } => run_pull(cfg, out).await?,
            CliCommand::Push {
                resource,
                file,
                timeout,
            } => run_push(cfg, resource, &file, timeout).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
