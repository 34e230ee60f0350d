//! Ledger tests against an in-memory database.

use super::{UploadLedger, UploadState};
use crate::upload::{ArchivePart, UploadManifest};

fn manifest(parts: usize) -> UploadManifest {
    UploadManifest {
        destination: "Collections/ridge/1700000000_fieldtech".into(),
        parts: (0..parts)
            .map(|index| ArchivePart {
                index,
                file_count: 2,
                manifest_lines: vec![format!("{}/a.jpg", index), format!("{}/b.jpg", index)],
                remote_name: crate::upload::part_file_name(index),
                archive: Default::default(),
                sha256: "0".repeat(64),
                size: 4096,
            })
            .collect(),
        total_file_count: parts * 2,
        tagged_file_count: 1,
        uploader: "fieldtech".into(),
        description: "spring survey".into(),
        created_at: 1_700_000_000,
    }
}

#[tokio::test]
async fn completed_upload_keeps_manifest() {
    let db = UploadLedger::open_memory().await.unwrap();
    let id = db.record_start("/data/cam1", "Collections/ridge/x").await.unwrap();
    db.set_plan(id, 6, 3).await.unwrap();
    for i in 0..3 {
        db.mark_part_sent(id, i).await.unwrap();
    }
    let m = manifest(3);
    db.finish_completed(id, &m).await.unwrap();

    let row = db.get_upload(id).await.unwrap().unwrap();
    assert_eq!(row.state, UploadState::Completed);
    assert_eq!((row.parts_sent, row.part_count, row.total_files), (3, 3, 6));
    assert!(!row.is_partial());
    assert_eq!(db.get_manifest(id).await.unwrap(), Some(m));
}

#[tokio::test]
async fn failed_upload_records_sent_prefix() {
    let db = UploadLedger::open_memory().await.unwrap();
    let id = db.record_start("/data/cam1", "Collections/ridge/x").await.unwrap();
    db.set_plan(id, 2050, 3).await.unwrap();
    db.mark_part_sent(id, 0).await.unwrap();
    db.mark_part_sent(id, 1).await.unwrap();
    // A late duplicate never lowers the count.
    db.mark_part_sent(id, 0).await.unwrap();
    db.finish_unsuccessful(id, UploadState::Failed, "archive part 2 failed: timed out")
        .await
        .unwrap();

    let row = db.get_upload(id).await.unwrap().unwrap();
    assert_eq!(row.state, UploadState::Failed);
    assert_eq!(row.parts_sent, 2);
    assert!(row.is_partial());
    assert_eq!(row.last_error.as_deref(), Some("archive part 2 failed: timed out"));
    assert_eq!(db.get_manifest(id).await.unwrap(), None);
}

#[tokio::test]
async fn list_is_newest_first_and_recovery_fails_running() {
    let db = UploadLedger::open_memory().await.unwrap();
    let a = db.record_start("/a", "A").await.unwrap();
    let b = db.record_start("/b", "B").await.unwrap();
    db.finish_unsuccessful(a, UploadState::Cancelled, "transfer cancelled")
        .await
        .unwrap();

    let rows = db.list_uploads().await.unwrap();
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b, a]);
    assert_eq!(rows[1].state, UploadState::Cancelled);

    assert_eq!(db.recover_interrupted().await.unwrap(), 1);
    let b_row = db.get_upload(b).await.unwrap().unwrap();
    assert_eq!(b_row.state, UploadState::Failed);
    assert_eq!(b_row.last_error.as_deref(), Some("interrupted"));
    assert!(db.get_upload(999).await.unwrap().is_none());
}

#[tokio::test]
async fn ledger_persists_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state dir/uploads.db");
    let id = {
        let db = UploadLedger::open_at(&path).await.unwrap();
        db.record_start("/a", "A").await.unwrap()
    };
    let db = UploadLedger::open_at(&path).await.unwrap();
    assert_eq!(db.get_upload(id).await.unwrap().unwrap().destination, "A");
}

#[test]
fn state_strings_roundtrip() {
    for s in [
        UploadState::Running,
        UploadState::Completed,
        UploadState::Failed,
        UploadState::Cancelled,
    ] {
        assert_eq!(UploadState::from_str(s.as_str()), s);
    }
    assert_eq!(UploadState::from_str("garbage"), UploadState::Failed);
}
