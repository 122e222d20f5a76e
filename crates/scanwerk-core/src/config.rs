// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};

/// Settings shared by every operation of a scan client.
///
/// Missing keys in a JSON config file fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Growth unit of the image buffer, also the eSCL read chunk size.
    pub chunk_size: usize,
    pub wsd: WsdConfig,
    pub escl: EsclConfig,
    pub probe: ProbeConfig,
    pub passthrough: PassthroughConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            wsd: WsdConfig::default(),
            escl: EsclConfig::default(),
            probe: ProbeConfig::default(),
            passthrough: PassthroughConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load a config from a JSON file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every operation fail.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ScanwerkError::Config("chunk_size must be positive".into()));
        }
        if self.wsd.phase_timeout_secs == 0
            || self.probe.attempt_timeout_secs == 0
            || self.passthrough.timeout_secs == 0
        {
            return Err(ScanwerkError::Config("timeouts must be positive".into()));
        }
        if self.escl.resolution == 0 {
            return Err(ScanwerkError::Config("escl.resolution must be positive".into()));
        }
        Ok(())
    }
}

/// WSD job negotiation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsdConfig {
    /// Inactivity timeout per phase; reset on every received byte.
    pub phase_timeout_secs: u64,
    /// `JobName` in the scan ticket.
    pub job_name: String,
    /// `JobOriginatingUserName` in the scan ticket.
    pub originating_user: String,
}

impl Default for WsdConfig {
    fn default() -> Self {
        Self {
            phase_timeout_secs: 5,
            job_name: "Scan Job".into(),
            originating_user: "Scanwerk".into(),
        }
    }
}

impl WsdConfig {
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }
}

/// eSCL job settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsclConfig {
    pub timeout_secs: u64,
    /// X and Y resolution in DPI.
    pub resolution: u32,
    /// Treat a body shorter than its declared length as an error instead of
    /// a best-effort result.
    pub strict_content_length: bool,
}

impl Default for EsclConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            resolution: 300,
            strict_content_length: false,
        }
    }
}

impl EsclConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Capability probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub attempt_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: 4,
        }
    }
}

impl ProbeConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Raw print pass-through settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassthroughConfig {
    pub timeout_secs: u64,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl PassthroughConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_protocol_timeouts() {
        let config = ClientConfig::default();
        assert_eq!(config.wsd.phase_timeout(), Duration::from_secs(5));
        assert_eq!(config.probe.attempt_timeout(), Duration::from_secs(4));
        assert_eq!(config.passthrough.timeout(), Duration::from_secs(10));
        assert_eq!(config.chunk_size, 1024);
        assert!(!config.escl.strict_content_length);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_size": 4096, "escl": {{"strict_content_length": true}}}}"#)
            .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.chunk_size, 4096);
        assert!(config.escl.strict_content_length);
        assert_eq!(config.escl.resolution, 300);
        assert_eq!(config.wsd, WsdConfig::default());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_size": 0}}"#).unwrap();
        assert!(matches!(
            ClientConfig::load(file.path()),
            Err(ScanwerkError::Config(_))
        ));
    }

    #[test]
    fn invalid_json_is_a_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ClientConfig::load(file.path()),
            Err(ScanwerkError::Serialization(_))
        ));
    }
}
