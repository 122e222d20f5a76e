// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SOAP envelopes for the WSD scan service and the WS-Transfer metadata Get.

use std::fmt;

use scanwerk_core::types::{CorrelationId, ScanFormat, ScanJobHandle, ScanRequest, ScanSource};

pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml";

/// Stand-in for the device authority inside `<wsa:To>` until the envelope
/// is addressed.
pub const DESTINATION_PLACEHOLDER: &str = "DESTINATION_PLACEHOLDER";

pub const DOCUMENT_NAME: &str = "Scanned image file for the WSD Scan Driver";

const NS_SOAP: &str = "http://www.w3.org/2003/05/soap-envelope";
const NS_WSA: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
const NS_SCA: &str = "http://schemas.microsoft.com/windows/2006/08/wdp/scan";
const NS_WXF: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer";
const NS_WSD: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery";

const ACTION_CREATE_SCAN_JOB: &str = "http://schemas.microsoft.com/windows/2006/08/wdp/scan/CreateScanJob";
const ACTION_RETRIEVE_IMAGE: &str = "http://schemas.microsoft.com/windows/2006/08/wdp/scan/RetrieveImage";
const ACTION_TRANSFER_GET: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Get";
const ANONYMOUS_REPLY: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

pub const SCANNER_SERVICE_PATH: &str = "/WebServices/ScannerService";

/// A complete SOAP document ready to POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope(String);

impl Envelope {
    /// Replace the destination placeholder with `authority` (`host:port`).
    /// Only the first occurrence of the exact token is touched.
    pub fn addressed_to(self, authority: &str) -> Self {
        Self(self.0.replacen(DESTINATION_PLACEHOLDER, authority, 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of a WSD scan ticket.
#[derive(Debug, Clone)]
pub struct ScanTicket<'a> {
    pub job_name: &'a str,
    pub originating_user: &'a str,
    pub width: u32,
    pub height: u32,
    pub source: ScanSource,
    pub format: ScanFormat,
}

impl<'a> ScanTicket<'a> {
    pub fn from_request(request: &ScanRequest, job_name: &'a str, originating_user: &'a str) -> Self {
        Self {
            job_name,
            originating_user,
            width: request.width(),
            height: request.height(),
            source: request.source(),
            format: request.format(),
        }
    }
}

fn scan_header(action: &str, message_id: &CorrelationId, from: &CorrelationId) -> String {
    format!(
        "<soap:Header>\
         <wsa:To>http://{DESTINATION_PLACEHOLDER}{SCANNER_SERVICE_PATH}</wsa:To>\
         <wsa:Action>{action}</wsa:Action>\
         <wsa:MessageID>{message_id}</wsa:MessageID>\
         <wsa:ReplyTo><wsa:Address>{ANONYMOUS_REPLY}</wsa:Address></wsa:ReplyTo>\
         <wsa:From><wsa:Address>{from}</wsa:Address></wsa:From>\
         </soap:Header>",
        message_id = message_id.urn(),
        from = from.urn(),
    )
}

fn scan_envelope(header: String, body: String) -> Envelope {
    Envelope(format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"{NS_SOAP}\" xmlns:wsa=\"{NS_WSA}\" xmlns:sca=\"{NS_SCA}\">\
         {header}<soap:Body>{body}</soap:Body></soap:Envelope>"
    ))
}

/// CreateScanJobRequest for `ticket`. `job_uuid` becomes the `wsa:From`
/// address and must be reused for the matching RetrieveImage.
pub fn create_scan_job(message_id: &CorrelationId, job_uuid: &CorrelationId, ticket: &ScanTicket<'_>) -> Envelope {
    let body = format!(
        "<sca:CreateScanJobRequest><sca:ScanTicket>\
         <sca:JobDescription>\
         <sca:JobName>{job_name}</sca:JobName>\
         <sca:JobOriginatingUserName>{user}</sca:JobOriginatingUserName>\
         </sca:JobDescription>\
         <sca:DocumentParameters>\
         <sca:Format sca:MustHonor=\"true\">{format}</sca:Format>\
         <sca:InputSource sca:MustHonor=\"true\">{source}</sca:InputSource>\
         <sca:MediaSides><sca:MediaFront>\
         <sca:ColorProcessing>RGB24</sca:ColorProcessing>\
         <sca:Resolution><sca:Width>{width}</sca:Width><sca:Height>{height}</sca:Height></sca:Resolution>\
         </sca:MediaFront></sca:MediaSides>\
         </sca:DocumentParameters>\
         </sca:ScanTicket></sca:CreateScanJobRequest>",
        job_name = escape_text(ticket.job_name),
        user = escape_text(ticket.originating_user),
        format = ticket.format.wsd_keyword(),
        source = ticket.source.wsd_keyword(),
        width = ticket.width,
        height = ticket.height,
    );
    scan_envelope(scan_header(ACTION_CREATE_SCAN_JOB, message_id, job_uuid), body)
}

/// RetrieveImageRequest for a created job.
pub fn retrieve_image(message_id: &CorrelationId, handle: &ScanJobHandle) -> Envelope {
    let body = format!(
        "<sca:RetrieveImageRequest>\
         <sca:JobId>{job_id}</sca:JobId>\
         <sca:JobToken>{job_token}</sca:JobToken>\
         <sca:DocumentDescription><sca:DocumentName>{DOCUMENT_NAME}</sca:DocumentName></sca:DocumentDescription>\
         </sca:RetrieveImageRequest>",
        job_id = escape_text(&handle.job_id),
        job_token = escape_text(&handle.job_token),
    );
    scan_envelope(scan_header(ACTION_RETRIEVE_IMAGE, message_id, &handle.job_uuid), body)
}

/// WS-Transfer Get asking a device endpoint for its metadata. `destination`
/// is the full endpoint URL.
pub fn get_metadata(message_id: &CorrelationId, destination: &str) -> Envelope {
    Envelope(format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"{NS_SOAP}\" xmlns:wsa=\"{NS_WSA}\" xmlns:wxf=\"{NS_WXF}\" xmlns:wsd=\"{NS_WSD}\">\
         <soap:Header>\
         <wsa:To>{to}</wsa:To>\
         <wsa:Action>{ACTION_TRANSFER_GET}</wsa:Action>\
         <wsa:MessageID>{message_id}</wsa:MessageID>\
         </soap:Header>\
         <soap:Body />\
         </soap:Envelope>",
        to = escape_text(destination),
        message_id = message_id.urn(),
    ))
}

/// Escape XML character data.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
