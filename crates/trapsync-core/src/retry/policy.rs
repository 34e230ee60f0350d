use std::time::Duration;

/// Retry class of a failure.
///
/// Remote backends map HTTP statuses, curl errors and I/O failures into
/// these kinds through [`classify`](super::classify).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or transfer timed out.
    Timeout,
    /// Remote asked us to back off (429, 503).
    Throttled,
    /// Dropped connection, DNS failure, refused handshake.
    Connection,
    /// Any other 5xx.
    Http5xx(u16),
    /// Permission, serialization, local archive or cancellation failures.
    Other,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Exponential backoff for archive part transfers, built from the `[retry]`
/// config section. Documents are never retried; the scheduler's next
/// mutation resends them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per part, the first send included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`: `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay)
    }

    /// `attempt` is 1-based and counts the attempt that just failed.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || !kind.is_transient() {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_after(attempt))
    }
}
