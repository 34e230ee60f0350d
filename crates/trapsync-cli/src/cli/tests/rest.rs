//! Tests for status, pull and push.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;
use trapsync_core::sync::ResourceKey;

#[test]
fn cli_parse_status() {
    match parse(&["trapsync", "status"]) {
        CliCommand::Status => {}
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_pull() {
    match parse(&["trapsync", "pull"]) {
        CliCommand::Pull { out } => assert!(out.is_none()),
        _ => panic!("expected Pull"),
    }
    match parse(&["trapsync", "pull", "--out", "/tmp/docs"]) {
        CliCommand::Pull { out } => assert_eq!(out, Some(PathBuf::from("/tmp/docs"))),
        _ => panic!("expected Pull with --out"),
    }
}

#[test]
fn cli_parse_push() {
    match parse(&["trapsync", "push", "locations", "locs.json"]) {
        CliCommand::Push {
            resource,
            file,
            timeout,
        } => {
            assert_eq!(resource, ResourceKey::LocationCatalog);
            assert_eq!(file, PathBuf::from("locs.json"));
            assert_eq!(timeout, 120);
        }
        _ => panic!("expected Push"),
    }
}

#[test]
fn cli_parse_push_timeout() {
    match parse(&["trapsync", "push", "settings", "s.json", "--timeout", "5"]) {
        CliCommand::Push { resource, timeout, .. } => {
            assert_eq!(resource, ResourceKey::Settings);
            assert_eq!(timeout, 5);
        }
        _ => panic!("expected Push with --timeout"),
    }
}

#[test]
fn cli_push_rejects_unknown_resource() {
    let err = Cli::try_parse_from(["trapsync", "push", "weather", "w.json"]).unwrap_err();
    assert!(err.to_string().contains("unknown resource 'weather'"));
}
