// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
///
/// Every variant is terminal for the operation that produced it. Nothing in
/// the library retries on its own; see `scanwerk_scan::retry` for the policy
/// callers can apply to a whole scan.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Transport --
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    // -- Protocol --
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("incomplete transfer: received {received} of {} bytes", expected_len(.expected))]
    IncompleteTransfer { expected: Option<u64>, received: u64 },

    // -- Local --
    #[error("image buffer could not grow to {0} bytes")]
    Allocation(usize),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn expected_len(expected: &Option<u64>) -> String {
    match expected {
        Some(n) => n.to_string(),
        None => "an unknown number of".into(),
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
