//! Tests for upload argument parsing.

use super::parse;
use crate::cli::commands::parts_on_remote;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;
use trapsync_core::SyncError;

#[test]
fn cli_parse_upload_defaults() {
    match parse(&["trapsync", "upload", "/data/cam07", "--collection", "spring-2024"]) {
        CliCommand::Upload {
            dir,
            collection,
            max_files,
            description,
            metadata,
        } => {
            assert_eq!(dir, PathBuf::from("/data/cam07"));
            assert_eq!(collection, "spring-2024");
            assert!(max_files.is_none());
            assert_eq!(description, "");
            assert!(metadata.is_none());
        }
        _ => panic!("expected Upload"),
    }
}

#[test]
fn cli_parse_upload_all_options() {
    match parse(&[
        "trapsync",
        "upload",
        "cam07",
        "--collection",
        "c",
        "--max-files",
        "250",
        "--description",
        "north ridge",
        "--metadata",
        "tree.json",
    ]) {
        CliCommand::Upload {
            max_files,
            description,
            metadata,
            ..
        } => {
            assert_eq!(max_files, Some(250));
            assert_eq!(description, "north ridge");
            assert_eq!(metadata, Some(PathBuf::from("tree.json")));
        }
        _ => panic!("expected Upload with options"),
    }
}

#[test]
fn cli_upload_requires_collection() {
    assert!(Cli::try_parse_from(["trapsync", "upload", "cam07"]).is_err());
}

#[test]
fn cli_upload_rejects_non_numeric_max_files() {
    assert!(Cli::try_parse_from(["trapsync", "upload", "d", "--collection", "c", "--max-files", "lots"]).is_err());
}

#[test]
fn stopped_upload_counts_parts_left_on_remote() {
    // Record write failed after all three parts went out.
    let record = SyncError::RecordFailed {
        name: "upload.json".into(),
        parts_sent: 3,
        source: Box::new(SyncError::Permission("d/upload.json".into())),
    };
    assert_eq!(parts_on_remote(3, &record), 3);
    assert_eq!(parts_on_remote(0, &record), 3);

    let part = SyncError::PartFailed {
        index: 2,
        source: Box::new(SyncError::Timeout("part-00002.tar".into())),
    };
    assert_eq!(parts_on_remote(2, &part), 2);
    assert_eq!(parts_on_remote(0, &SyncError::Cancelled), 0);
    assert_eq!(parts_on_remote(1, &SyncError::Cancelled), 1);
}
