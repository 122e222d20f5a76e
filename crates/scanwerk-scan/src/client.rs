// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// High-level scan client. Owns the configuration, the transport and the one
// live image buffer, and dispatches each scan to the selected protocol.

use tracing::{debug, info, instrument};

use scanwerk_core::config::ClientConfig;
use scanwerk_core::error::Result;
use scanwerk_core::types::{DeviceAddress, ProbeResult, ScanProtocol, ScanRequest};

use crate::buffer::ImageBuffer;
use crate::passthrough::{self, PassthroughReply};
use crate::probe::DeviceProbe;
use crate::transport::{TcpTransport, Transport};
use crate::{escl, wsd};

/// Scanner client.
///
/// Holds at most one received image. Starting a scan drops the previous
/// image first; a failed scan leaves the client with no image. `scan` takes
/// `&mut self`, so one client runs one operation at a time; wrap it in a
/// `Mutex` to share it between threads.
pub struct ScanClient<T: Transport = TcpTransport> {
    config: ClientConfig,
    transport: T,
    image: Option<ImageBuffer>,
}

impl ScanClient<TcpTransport> {
    /// Client over plain TCP.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, TcpTransport)
    }
}

impl<T: Transport> ScanClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            image: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Acquire one image from `device` using the request's protocol.
    #[instrument(skip_all, fields(%device, protocol = request.protocol().display_name()))]
    pub fn scan(&mut self, device: &DeviceAddress, request: &ScanRequest) -> Result<&ImageBuffer> {
        self.release_image();

        let image = match request.protocol() {
            ScanProtocol::Wsd => wsd::scan(&self.transport, device, &self.config, request)?,
            ScanProtocol::Escl => escl::scan(&self.transport, device, &self.config, request)?,
        };

        info!(bytes = image.len(), sha256 = %image.sha256_hex(), "scan complete");
        Ok(self.image.insert(image))
    }

    /// The image from the last successful scan, if still held.
    pub fn image(&self) -> Option<&ImageBuffer> {
        self.image.as_ref()
    }

    /// Byte count of the held image; 0 when there is none.
    pub fn image_size(&self) -> usize {
        self.image.as_ref().map_or(0, ImageBuffer::len)
    }

    /// Hand the held image to the caller.
    pub fn take_image(&mut self) -> Option<ImageBuffer> {
        self.image.take()
    }

    /// Drop the held image, if any.
    pub fn release_image(&mut self) {
        if let Some(mut image) = self.image.take() {
            debug!(bytes = image.len(), "releasing previous image");
            image.release();
        }
    }

    pub fn probe(&self, device: &DeviceAddress) -> ProbeResult {
        DeviceProbe::new(&self.transport, self.config.probe.attempt_timeout()).probe(device)
    }

    /// Raw pass-through to a print port.
    pub fn print(&self, device: &DeviceAddress, payload: &[u8]) -> Result<PassthroughReply> {
        passthrough::send_raw(&self.transport, device, payload, self.config.passthrough.timeout())
    }
}
