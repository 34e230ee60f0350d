//! CLI command handlers, one per file.

mod pull;
mod push;
mod status;
mod upload;

pub use pull::run_pull;
pub use push::run_push;
pub use status::run_status;
pub use upload::{run_upload, UploadArgs};
#[cfg(test)]
pub(crate) use upload::parts_on_remote;

use std::sync::Arc;
use trapsync_core::report::CollectingErrorSink;

/// Print everything the background work reported, return how many there were.
pub(crate) fn print_reports(sink: &Arc<CollectingErrorSink>) -> usize {
    let reports = sink.take();
    for r in &reports {
        eprintln!("  {}", r);
    }
    reports.len()
}
