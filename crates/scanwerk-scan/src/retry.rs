// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Caller-side retry policy with exponential backoff + jitter.
//
// The scan clients never retry on their own. A caller that wants another
// attempt after a failed scan asks `should_retry`, which only approves
// transient failures.

use std::time::Duration;

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::ErrorClass;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry; the error is permanent or needs the user.
    GiveUp(ErrorClass),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Classify a `ScanwerkError` for retry decisions.
pub fn classify_error(err: &ScanwerkError) -> ErrorClass {
    match err {
        ScanwerkError::ConnectionFailed(detail) => classify_connection_detail(detail),
        ScanwerkError::Timeout(_) => ErrorClass::Transient,
        ScanwerkError::IncompleteTransfer { .. } => ErrorClass::Transient,

        ScanwerkError::MalformedResponse(_) => ErrorClass::Permanent,
        ScanwerkError::InvalidRequest(_) => ErrorClass::Permanent,
        ScanwerkError::Config(_) => ErrorClass::Permanent,
        ScanwerkError::Allocation(_) => ErrorClass::Permanent,
        ScanwerkError::Serialization(_) => ErrorClass::Permanent,

        ScanwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::Interrupted => ErrorClass::Transient,
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Transient,
        },
    }
}

fn classify_connection_detail(detail: &str) -> ErrorClass {
    let lower = detail.to_ascii_lowercase();
    // A name that never resolves will not start resolving on its own.
    if lower.contains("cannot resolve")
        || lower.contains("no addresses")
        || lower.contains("invalid address")
    {
        return ErrorClass::UserAction;
    }
    ErrorClass::Transient
}

/// Decide whether to retry based on the error class and attempt count.
/// `attempt` counts retries already made, starting at 0.
pub fn should_retry(err: &ScanwerkError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match classify_error(err) {
        ErrorClass::Permanent => {
            info!("permanent error, not retrying");
            RetryDecision::GiveUp(ErrorClass::Permanent)
        }
        ErrorClass::UserAction => {
            info!("user action required, not retrying");
            RetryDecision::GiveUp(ErrorClass::UserAction)
        }
        ErrorClass::Transient => {
            if attempt >= config.max_retries {
                warn!(attempt, max = config.max_retries, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt, config);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// Run `op` until it succeeds or `should_retry` says stop, sleeping between
/// attempts. `op` receives the attempt number, starting at 0.
pub fn with_retries<T>(config: &RetryConfig, mut op: impl FnMut(u32) -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => match should_retry(&err, attempt, config) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(attempt, error = %err, "attempt failed, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(err),
            },
        }
    }
}

/// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base).
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
    Duration::from_millis(total_ms.min(config.max_delay.as_millis() as u64))
}

/// Deterministic spread derived from the attempt number.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}
