//! Retry and backoff policy for archive part transfers.
//!
//! Retrying is opt-in: without a `[retry]` config section the upload
//! pipeline stops at the first failed part, and sync jobs never retry.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
