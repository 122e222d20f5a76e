// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scanner client.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

use crate::error::{Result, ScanwerkError};

/// Per-message correlation identifier (UUID version 4).
///
/// Rendered as 36 lowercase hex characters with hyphens at offsets 8, 13, 18
/// and 23. A fresh value is generated for every outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The `urn:uuid:` form used in WS-Addressing headers.
    pub fn urn(&self) -> String {
        format!("urn:uuid:{}", self.0.hyphenated())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Which scan protocol a request should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanProtocol {
    /// Web Services on Devices: SOAP job negotiation + multipart image.
    Wsd,
    /// eSCL (AirScan): REST job creation + plain binary image.
    Escl,
}

impl ScanProtocol {
    /// Human-readable name for logs and CLI output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Wsd => "WSD",
            Self::Escl => "eSCL",
        }
    }
}

impl std::str::FromStr for ScanProtocol {
    type Err = ScanwerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wsd" => Ok(Self::Wsd),
            "escl" | "airscan" => Ok(Self::Escl),
            other => Err(ScanwerkError::InvalidRequest(format!(
                "unknown protocol '{other}', expected 'wsd' or 'escl'"
            ))),
        }
    }
}

/// Physical input source on the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanSource {
    /// Flatbed glass.
    Platen,
    /// Automatic document feeder.
    Feeder,
}

impl ScanSource {
    /// WSD `InputSource` keyword.
    pub fn wsd_keyword(&self) -> &'static str {
        match self {
            Self::Platen => "Platen",
            Self::Feeder => "ADF",
        }
    }

    /// eSCL `InputSource` keyword.
    pub fn escl_keyword(&self) -> &'static str {
        match self {
            Self::Platen => "Platen",
            Self::Feeder => "Feeder",
        }
    }
}

/// Output image format requested from the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanFormat {
    Jpeg,
    Pdf,
}

impl ScanFormat {
    /// WSD `Format` keyword.
    pub fn wsd_keyword(&self) -> &'static str {
        match self {
            Self::Jpeg => "jfif",
            Self::Pdf => "pdf-a",
        }
    }

    /// MIME type, used as the eSCL `DocumentFormat`.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Pdf => "application/pdf",
        }
    }

    /// Conventional file extension for the saved image.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Pdf => "pdf",
        }
    }
}

/// Parameters for a single scan attempt.
///
/// Dimensions are in device-native units (WSD resolution values, eSCL
/// hundredths of an inch). Constructed through [`ScanRequest::new`], which
/// rejects zero dimensions; deserialization goes through the same check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScanRequest")]
pub struct ScanRequest {
    height: u32,
    width: u32,
    source: ScanSource,
    format: ScanFormat,
    protocol: ScanProtocol,
}

impl ScanRequest {
    pub fn new(
        height: u32,
        width: u32,
        source: ScanSource,
        format: ScanFormat,
        protocol: ScanProtocol,
    ) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(ScanwerkError::InvalidRequest(format!(
                "scan dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            height,
            width,
            source,
            format,
            protocol,
        })
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn source(&self) -> ScanSource {
        self.source
    }

    pub fn format(&self) -> ScanFormat {
        self.format
    }

    pub fn protocol(&self) -> ScanProtocol {
        self.protocol
    }
}

#[derive(Deserialize)]
struct RawScanRequest {
    height: u32,
    width: u32,
    source: ScanSource,
    format: ScanFormat,
    protocol: ScanProtocol,
}

impl TryFrom<RawScanRequest> for ScanRequest {
    type Error = ScanwerkError;

    fn try_from(raw: RawScanRequest) -> Result<Self> {
        Self::new(raw.height, raw.width, raw.source, raw.format, raw.protocol)
    }
}

/// Server-issued authorisation for a WSD image retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJobHandle {
    /// Job UUID from the originating request; reused as the `From` address.
    pub job_uuid: CorrelationId,
    /// Opaque `JobId` issued by the scanner.
    pub job_id: String,
    /// Opaque `JobToken` issued by the scanner.
    pub job_token: String,
}

/// A resolved scanner address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, as used in `Host` headers and WS-Addressing `To`.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.authority())
    }
}

/// Protocol detected by a capability probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectedProtocol {
    #[serde(rename = "WSD")]
    Wsd,
    #[serde(rename = "eSCL")]
    Escl,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

/// Summary of what a device told us about itself.
///
/// Every string field is empty when the device did not report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub model_name: String,
    pub model_url: String,
    pub printer_service: String,
    pub scanner_service: String,
    pub protocol: DetectedProtocol,
}

/// Classification of errors for caller-side retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Worth retrying the whole scan after a pause.
    Transient,
    /// User must fix something first (address, settings, config).
    UserAction,
    /// Retrying will not help.
    Permanent,
}

/// One service record from an already-resolved mDNS browse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub host: String,
    pub ip: IpAddr,
    pub port: u16,
    /// Service type without the domain, e.g. `_uscan._tcp` or `escl`.
    pub service_type: String,
}
