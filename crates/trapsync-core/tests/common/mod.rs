//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod dav_server;
pub mod memory_remote;
