//! `trapsync status` – show recorded uploads.

use anyhow::Result;
use trapsync_core::ledger::UploadLedger;

pub async fn run_status(ledger: &UploadLedger) -> Result<()> {
    let uploads = ledger.list_uploads().await?;
    if uploads.is_empty() {
        println!("No uploads recorded.");
        return Ok(());
    }
    println!("{:<6} {:<10} {:<9} {:<7} {}", "ID", "STATE", "PARTS", "FILES", "DESTINATION");
    for u in uploads {
        let parts = format!("{}/{}", u.parts_sent, u.part_count);
        println!(
            "{:<6} {:<10} {:<9} {:<7} {}",
            u.id, u.state, parts, u.total_files, u.destination
        );
        if u.is_partial() {
            println!("       partial: parts 0..{} are on the remote", u.parts_sent);
        }
        if let Some(err) = u.last_error {
            println!("       error: {}", err);
        }
    }
    Ok(())
}
