// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the command line.
//
// Every technical error is mapped to plain English with a clear suggestion.

use crate::error::ScanwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Trying again may work.
    Transient,
    /// User must do something (fix an address, load paper, edit config).
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Whether retrying the whole operation is worthwhile.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `ScanwerkError` into a `HumanError`.
pub fn humanize_error(err: &ScanwerkError) -> HumanError {
    match err {
        ScanwerkError::ConnectionFailed(detail) => humanize_connection_error(detail),

        ScanwerkError::Timeout(_) => HumanError {
            message: "The scanner didn't respond in time.".into(),
            suggestion: "The scanner might be busy or asleep. Wake it up and try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::MalformedResponse(detail) => {
            if detail.contains("JobId") || detail.contains("JobToken") {
                HumanError {
                    message: "The scanner refused to start a scan job.".into(),
                    suggestion: "Check there is a page on the glass or in the feeder, and that no other scan is running.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "The scanner sent an answer we couldn't understand.".into(),
                    suggestion: format!("Try the other protocol, or probe the device to see what it supports. (Detail: {detail})"),
                    retriable: false,
                    severity: Severity::Permanent,
                }
            }
        }

        ScanwerkError::IncompleteTransfer { received, .. } => HumanError {
            message: "The scan stopped before the image was complete.".into(),
            suggestion: format!("Only {received} bytes arrived. Try scanning again."),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::Allocation(_) => HumanError {
            message: "The scanned image is too large to keep in memory.".into(),
            suggestion: "Try a smaller scan area.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ScanwerkError::InvalidRequest(detail) => HumanError {
            message: "The scan settings aren't valid.".into(),
            suggestion: format!("Check the scan settings and try again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::Config(detail) => HumanError {
            message: "The configuration file has a problem.".into(),
            suggestion: format!("Fix the configuration file and try again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "Check the path and try again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "We don't have permission to use that file.".into(),
                    suggestion: "Check the file permissions, or choose a different location.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        ScanwerkError::Serialization(_) => HumanError {
            message: "A JSON document couldn't be read.".into(),
            suggestion: "Check the file is valid JSON.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

/// Parse connection failure details into human-readable messages.
fn humanize_connection_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("refused") {
        HumanError {
            message: "The device refused our connection.".into(),
            suggestion: "Check the port number. Scanners usually listen on 80, 5357 or 8080.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else if lower.contains("resolve") || lower.contains("invalid address") {
        HumanError {
            message: "The device address doesn't look right.".into(),
            suggestion: "Check the address and try again. It should look like 192.168.1.100.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else {
        HumanError {
            message: "We couldn't reach the device.".into(),
            suggestion: format!(
                "Check that it is turned on, on the same network, and not busy with another job. (Detail: {detail})"
            ),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}
