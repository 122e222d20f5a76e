// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// eSCL (AirScan) client: POST ScanSettings, then GET the job location.

use tracing::{debug, info, instrument, warn};

use scanwerk_core::config::ClientConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{DeviceAddress, ScanRequest};

use crate::buffer::ImageBuffer;
use crate::http::{self, Request, resolve_location};
use crate::transport::Transport;

pub const SCAN_JOBS_PATH: &str = "/eSCL/ScanJobs";
pub const ESCL_CONTENT_TYPE: &str = "text/xml";

const NS_SCAN: &str = "http://schemas.hp.com/imaging/escl/2011/05/03";
const NS_PWG: &str = "http://www.pwg.org/schemas/2010/12/sm";

/// `scan:ScanSettings` document for `request`. Region dimensions are in
/// hundredths of an inch.
pub fn scan_settings(request: &ScanRequest, resolution: u32) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <scan:ScanSettings xmlns:scan=\"{NS_SCAN}\" xmlns:pwg=\"{NS_PWG}\">\
         <pwg:Version>2.6</pwg:Version>\
         <pwg:ScanRegions><pwg:ScanRegion>\
         <pwg:XOffset>0</pwg:XOffset>\
         <pwg:YOffset>0</pwg:YOffset>\
         <pwg:Width>{width}</pwg:Width>\
         <pwg:Height>{height}</pwg:Height>\
         <pwg:ContentRegionUnits>escl:HundredthsOfInches</pwg:ContentRegionUnits>\
         </pwg:ScanRegion></pwg:ScanRegions>\
         <scan:InputSource>{source}</scan:InputSource>\
         <scan:ColorMode>RGB24</scan:ColorMode>\
         <scan:XResolution>{resolution}</scan:XResolution>\
         <scan:YResolution>{resolution}</scan:YResolution>\
         <scan:DocumentFormat>{format}</scan:DocumentFormat>\
         </scan:ScanSettings>",
        width = request.width(),
        height = request.height(),
        source = request.source().escl_keyword(),
        format = request.format().mime_type(),
    )
}

pub struct EsclScanClient<'a> {
    transport: &'a dyn Transport,
    device: &'a DeviceAddress,
    config: &'a ClientConfig,
}

impl<'a> EsclScanClient<'a> {
    pub fn new(transport: &'a dyn Transport, device: &'a DeviceAddress, config: &'a ClientConfig) -> Self {
        Self {
            transport,
            device,
            config,
        }
    }

    /// Submit the scan settings; returns the job `Location`.
    #[instrument(skip_all, fields(device = %self.device))]
    pub fn create_job(&self, request: &ScanRequest) -> Result<String> {
        let settings = scan_settings(request, self.config.escl.resolution);
        let req = Request::post(SCAN_JOBS_PATH, ESCL_CONTENT_TYPE, settings.as_bytes());
        let mut stream = http::send(self.transport, self.device, &req, self.config.escl.timeout())?;
        let head = stream.read_head()?;

        if !matches!(head.status, 200 | 201) {
            return Err(ScanwerkError::MalformedResponse(format!(
                "eSCL scan job rejected with HTTP {}",
                head.status
            )));
        }
        let location = head
            .header("Location")
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                ScanwerkError::MalformedResponse("eSCL scan job response has no Location".into())
            })?;

        info!(%location, "eSCL scan job created");
        Ok(location.to_string())
    }

    /// Download the document at `location` into a fresh buffer.
    #[instrument(skip_all, fields(device = %self.device, %location))]
    pub fn fetch_image(&self, location: &str) -> Result<ImageBuffer> {
        let (target, path) = resolve_location(location, self.device)?;
        let req = Request::get(&path);
        let mut stream = http::send(self.transport, &target, &req, self.config.escl.timeout())?;
        let head = stream.read_head()?;
        if head.status != 200 {
            return Err(ScanwerkError::MalformedResponse(format!(
                "eSCL image request failed with HTTP {}",
                head.status
            )));
        }

        let expected = if head.is_chunked() { None } else { head.content_length() };
        let mut image = ImageBuffer::new(self.config.chunk_size)?;
        let mut chunk = vec![0u8; self.config.chunk_size];
        let mut body = stream.body(&head);
        loop {
            match body.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => image.append(&chunk[..n])?,
                Err(ScanwerkError::Timeout(_)) if !image.is_empty() => {
                    debug!(bytes = image.len(), "device went quiet");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let received = image.len() as u64;
        if received == 0 {
            return Err(ScanwerkError::IncompleteTransfer { expected, received });
        }
        if let Some(expected) = expected.filter(|e| received < *e) {
            if self.config.escl.strict_content_length {
                return Err(ScanwerkError::IncompleteTransfer {
                    expected: Some(expected),
                    received,
                });
            }
            warn!(received, expected, "keeping partial eSCL image");
        }

        info!(bytes = received, "eSCL image received");
        Ok(image)
    }
}

/// Create a job and download its document.
pub fn scan(
    transport: &dyn Transport,
    device: &DeviceAddress,
    config: &ClientConfig,
    request: &ScanRequest,
) -> Result<ImageBuffer> {
    let client = EsclScanClient::new(transport, device, config);
    let location = client.create_job(request)?;
    client.fetch_image(&location)
}
