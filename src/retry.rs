//! Capped exponential backoff and transient-failure classification.

use std::time::Duration;

/// Failure markers that identify a retryable provider error.
///
/// Matching is done against the lowercased error text so both structured status
/// codes and free-form provider messages are caught.
const TRANSIENT_MARKERS: [&str; 6] = ["rate limit", "429", "500", "502", "503", "timeout"];

/// Returns true when the error text indicates a failure worth retrying.
pub fn is_transient(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Retry schedule for one batch-level operation.
///
/// Each call to [`Backoff::next_delay`] hands out the wait before the next
/// attempt: `min(cap, base * 2^n)` for the n-th retry. After `max_retries`
/// delays the schedule is exhausted and the operation must fail on its final
/// attempt. Keeping this as an explicit state machine (rather than recursion at
/// the call site) bounds stack depth and makes the schedule testable on its own.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    max_retries: usize,
    attempt: usize,
}

impl Backoff {
    /// Default schedule: 30s base doubling up to a 300s ceiling.
    pub fn new(max_retries: usize) -> Self {
        Self::with_schedule(Duration::from_secs(30), Duration::from_secs(300), max_retries)
    }

    /// Builds a schedule with explicit base and cap durations.
    pub fn with_schedule(base: Duration, cap: Duration, max_retries: usize) -> Self {
        Self {
            base,
            cap,
            max_retries,
            attempt: 0,
        }
    }

    /// Number of retries consumed so far.
    pub fn retries_used(&self) -> usize {
        self.attempt
    }

    /// Total retries permitted.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Returns the wait before the next retry, or `None` once exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_retries {
            return None;
        }
        let exponent = u32::try_from(self.attempt).unwrap_or(u32::MAX);
        let delay = self
            .base
            .checked_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
            .map(|d| d.min(self.cap))
            .unwrap_or(self.cap);
        self.attempt += 1;
        Some(delay)
    }
}
