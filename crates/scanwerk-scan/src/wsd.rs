// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// WSD scan job client: CreateScanJob then RetrieveImage.
//
// A session walks an explicit state machine and records each transition.
// Each phase runs on its own connection; a failure in either phase moves
// the session to `Failed` and drops whatever image bytes had arrived.

use tracing::{debug, info, instrument, warn};

use scanwerk_core::config::ClientConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{CorrelationId, DeviceAddress, ScanJobHandle, ScanRequest};

use crate::buffer::ImageBuffer;
use crate::http::{self, MAX_DOCUMENT_BYTES, Request};
use crate::multipart;
use crate::soap::{self, SCANNER_SERVICE_PATH, SOAP_CONTENT_TYPE, ScanTicket};
use crate::tags::{extract_tag, unescape};
use crate::transport::Transport;

const JOB_ID_TAG: &str = "wscn:JobId";
const JOB_TOKEN_TAG: &str = "wscn:JobToken";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsdState {
    Idle,
    AwaitingJobCreation,
    JobCreated,
    AwaitingImage,
    ImageReceived,
    Failed,
}

impl WsdState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ImageReceived | Self::Failed)
    }

    fn can_advance_to(self, next: Self) -> bool {
        use WsdState::*;
        match (self, next) {
            (Idle, AwaitingJobCreation)
            | (AwaitingJobCreation, JobCreated)
            | (JobCreated, AwaitingImage)
            | (AwaitingImage, ImageReceived) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// One WSD scan job against one device.
pub struct WsdSession<'a> {
    transport: &'a dyn Transport,
    device: &'a DeviceAddress,
    config: &'a ClientConfig,
    job_uuid: CorrelationId,
    state: WsdState,
    history: Vec<WsdState>,
}

impl<'a> WsdSession<'a> {
    pub fn new(transport: &'a dyn Transport, device: &'a DeviceAddress, config: &'a ClientConfig) -> Self {
        Self {
            transport,
            device,
            config,
            job_uuid: CorrelationId::new(),
            state: WsdState::Idle,
            history: vec![WsdState::Idle],
        }
    }

    pub fn state(&self) -> WsdState {
        self.state
    }

    /// Every state the session has been in, oldest first.
    pub fn history(&self) -> &[WsdState] {
        &self.history
    }

    /// Identifier used as `wsa:From` in both phases.
    pub fn job_uuid(&self) -> &CorrelationId {
        &self.job_uuid
    }

    fn advance(&mut self, next: WsdState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(ScanwerkError::InvalidRequest(format!(
                "WSD session cannot move from {:?} to {next:?}",
                self.state
            )));
        }
        debug!(from = ?self.state, to = ?next, "WSD state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self, err: ScanwerkError) -> ScanwerkError {
        warn!(state = ?self.state, error = %err, "WSD scan failed");
        if self.advance(WsdState::Failed).is_err() {
            debug!("session already terminal");
        }
        err
    }

    /// Phase one: ask the scanner to create a job and collect its handle.
    #[instrument(skip_all, fields(device = %self.device, job = %self.job_uuid))]
    pub fn create_job(&mut self, request: &ScanRequest) -> Result<ScanJobHandle> {
        self.advance(WsdState::AwaitingJobCreation)?;
        match self.request_job(request) {
            Ok(handle) => {
                self.advance(WsdState::JobCreated)?;
                info!(job_id = %handle.job_id, "scan job created");
                Ok(handle)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn request_job(&self, request: &ScanRequest) -> Result<ScanJobHandle> {
        let wsd = &self.config.wsd;
        let ticket = ScanTicket::from_request(request, &wsd.job_name, &wsd.originating_user);
        let envelope = soap::create_scan_job(&CorrelationId::new(), &self.job_uuid, &ticket)
            .addressed_to(&self.device.authority());

        let req = Request::post(SCANNER_SERVICE_PATH, SOAP_CONTENT_TYPE, envelope.as_bytes());
        let mut stream = http::send(self.transport, self.device, &req, wsd.phase_timeout())?;
        let head = stream.read_head()?;
        let body = stream.read_body_to_end(&head, MAX_DOCUMENT_BYTES)?;
        let body = String::from_utf8_lossy(&body);
        debug!(status = head.status, bytes = body.len(), "CreateScanJob response");

        let job_id = non_empty_tag(&body, JOB_ID_TAG);
        let job_token = non_empty_tag(&body, JOB_TOKEN_TAG);
        match (job_id, job_token) {
            (Some(job_id), Some(job_token)) => Ok(ScanJobHandle {
                job_uuid: self.job_uuid,
                job_id: unescape(job_id).into_owned(),
                job_token: unescape(job_token).into_owned(),
            }),
            (id, token) => Err(ScanwerkError::MalformedResponse(format!(
                "CreateScanJob response (HTTP {}) lacks {}",
                head.status,
                missing_tags(id.is_none(), token.is_none())
            ))),
        }
    }

    /// Phase two: fetch the image for a created job.
    #[instrument(skip_all, fields(device = %self.device, job_id = %handle.job_id))]
    pub fn retrieve_image(&mut self, handle: &ScanJobHandle) -> Result<ImageBuffer> {
        if handle.job_uuid != self.job_uuid {
            return Err(ScanwerkError::InvalidRequest(
                "job handle belongs to a different session".into(),
            ));
        }
        self.advance(WsdState::AwaitingImage)?;
        match self.request_image(handle) {
            Ok(image) => {
                self.advance(WsdState::ImageReceived)?;
                info!(bytes = image.len(), "image received");
                Ok(image)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn request_image(&self, handle: &ScanJobHandle) -> Result<ImageBuffer> {
        let timeout = self.config.wsd.phase_timeout();
        let envelope = soap::retrieve_image(&CorrelationId::new(), handle).addressed_to(&self.device.authority());

        let req = Request::post(SCANNER_SERVICE_PATH, SOAP_CONTENT_TYPE, envelope.as_bytes());
        let mut stream = http::send(self.transport, self.device, &req, timeout)?;
        let mut image = ImageBuffer::new(self.config.chunk_size)?;
        multipart::read_image(&mut stream, timeout, &mut image)?;
        Ok(image)
    }
}

/// Run both phases against `device`.
pub fn scan(
    transport: &dyn Transport,
    device: &DeviceAddress,
    config: &ClientConfig,
    request: &ScanRequest,
) -> Result<ImageBuffer> {
    let mut session = WsdSession::new(transport, device, config);
    let handle = session.create_job(request)?;
    session.retrieve_image(&handle)
}

fn non_empty_tag<'b>(body: &'b str, tag: &str) -> Option<&'b str> {
    extract_tag(body, tag).filter(|v| !v.trim().is_empty())
}

fn missing_tags(id: bool, token: bool) -> &'static str {
    match (id, token) {
        (true, true) => "JobId and JobToken",
        (true, false) => "JobId",
        _ => "JobToken",
    }
}
