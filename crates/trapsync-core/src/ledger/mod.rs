//! Persistent upload ledger (SQLite via sqlx).
//!
//! One row per upload: where it went, how many parts it had, how many were
//! confirmed sent, and how it ended. Nothing is ever rolled back; the ledger
//! is how a partial upload stays visible afterwards.

pub mod db;
pub mod types;
mod uploads;

#[cfg(test)]
mod tests;

pub use db::UploadLedger;
pub(crate) use db::unix_timestamp;
pub use types::*;
