// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device capability probe: which scan protocol does this device speak?
//
// WSD is tried first with a WS-Transfer Get against the device endpoint,
// then eSCL with a status GET. Transport errors are logged and fall through
// to the next attempt; the probe itself never fails.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{CorrelationId, DetectedProtocol, DeviceAddress, ProbeResult};

use crate::http::{self, MAX_DOCUMENT_BYTES, Request};
use crate::soap::{self, SOAP_CONTENT_TYPE};
use crate::tags::{elements, extract_element};
use crate::transport::Transport;

pub const DEVICE_PATH: &str = "/WebServices/Device";
pub const SCANNER_STATUS_PATH: &str = "/eSCL/ScannerStatus";

pub struct DeviceProbe<'a> {
    transport: &'a dyn Transport,
    attempt_timeout: Duration,
}

impl<'a> DeviceProbe<'a> {
    pub fn new(transport: &'a dyn Transport, attempt_timeout: Duration) -> Self {
        Self {
            transport,
            attempt_timeout,
        }
    }

    #[instrument(skip_all, fields(%device))]
    pub fn probe(&self, device: &DeviceAddress) -> ProbeResult {
        let destination = format!("http://{}{DEVICE_PATH}", device.authority());
        let envelope = soap::get_metadata(&CorrelationId::new(), &destination);
        let metadata = Request::post(DEVICE_PATH, SOAP_CONTENT_TYPE, envelope.as_bytes());

        if let Some(body) = self.attempt(device, &metadata).filter(|b| looks_like_wsd(b)) {
            let result = summarize(&body, DetectedProtocol::Wsd);
            info!(model = %result.model_name, "device speaks WSD");
            return result;
        }

        if let Some(body) = self
            .attempt(device, &Request::get(SCANNER_STATUS_PATH))
            .filter(|b| looks_like_escl(b))
        {
            let result = summarize(&body, DetectedProtocol::Escl);
            info!(model = %result.model_name, "device speaks eSCL");
            return result;
        }

        info!("no known scan protocol detected");
        ProbeResult::default()
    }

    fn attempt(&self, device: &DeviceAddress, request: &Request<'_>) -> Option<String> {
        match self.fetch(device, request) {
            Ok(body) => Some(body),
            Err(e) => {
                debug!(path = request.path, error = %e, "probe attempt failed");
                None
            }
        }
    }

    /// One attempt, bounded in total by the attempt timeout.
    fn fetch(&self, device: &DeviceAddress, request: &Request<'_>) -> Result<String> {
        let deadline = Instant::now() + self.attempt_timeout;
        let mut stream = http::send(self.transport, device, request, self.attempt_timeout)?;
        stream.set_deadline(Some(deadline));
        let head = stream.read_head()?;
        if !head.is_success() {
            return Err(ScanwerkError::MalformedResponse(format!("HTTP {}", head.status)));
        }
        let body = stream.read_body_to_end(&head, MAX_DOCUMENT_BYTES)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

pub fn looks_like_wsd(body: &str) -> bool {
    body.contains("ModelName") || body.contains("wsdp:ThisModel")
}

pub fn looks_like_escl(body: &str) -> bool {
    body.contains("ScannerStatus") || body.contains("eSCL")
}

/// Pull model and service addresses out of a metadata or status document.
/// When several Hosted blocks name the same service, the last one wins.
pub fn summarize(body: &str, protocol: DetectedProtocol) -> ProbeResult {
    let field = |name: &str| extract_element(body, name).unwrap_or_default().to_string();
    let mut result = ProbeResult {
        model_name: field("ModelName"),
        model_url: field("ModelUrl"),
        protocol,
        ..ProbeResult::default()
    };

    for block in elements(body, "Hosted") {
        let address = || extract_element(block, "Address").unwrap_or_default().to_string();
        if block.contains("PrinterService") {
            result.printer_service = address();
        }
        if block.contains("ScannerService") {
            result.scanner_service = address();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::{Script, ScriptedTransport};

    const METADATA: &str = r#"<soap:Envelope><soap:Body><mex:Metadata>
        <wsdp:ThisModel>
          <wsdp:Manufacturer>HP</wsdp:Manufacturer>
          <wsdp:ModelName>OfficeJet Pro 9010</wsdp:ModelName>
          <wsdp:ModelUrl>http://www.hp.com/</wsdp:ModelUrl>
        </wsdp:ThisModel>
        <wsdp:Relationship>
          <wsdp:Hosted>
            <wsa:EndpointReference><wsa:Address>http://10.0.0.5:3910/</wsa:Address></wsa:EndpointReference>
            <wsdp:Types>wprt:PrinterServiceType</wsdp:Types>
          </wsdp:Hosted>
          <wsdp:Hosted>
            <wsa:EndpointReference><wsa:Address>http://10.0.0.5:3911/</wsa:Address></wsa:EndpointReference>
            <wsdp:Types>wscn:ScannerServiceType</wsdp:Types>
          </wsdp:Hosted>
        </wsdp:Relationship>
        </mex:Metadata></soap:Body></soap:Envelope>"#;

    const STATUS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <scan:ScannerStatus xmlns:scan="http://schemas.hp.com/imaging/escl/2011/05/03">
          <pwg:Version>2.6</pwg:Version><pwg:State>Idle</pwg:State>
        </scan:ScannerStatus>"#;

    fn ok(body: &str) -> Script {
        Script::Reply(format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}", body.len()).into_bytes())
    }

    fn device() -> DeviceAddress {
        DeviceAddress::new("10.0.0.5", 80)
    }

    fn probe(transport: &ScriptedTransport) -> ProbeResult {
        DeviceProbe::new(transport, Duration::from_secs(4)).probe(&device())
    }

    #[test]
    fn wsd_device_metadata() {
        let transport = ScriptedTransport::new(vec![ok(METADATA)]);
        let result = probe(&transport);
        assert_eq!(result.protocol, DetectedProtocol::Wsd);
        assert_eq!(result.model_name, "OfficeJet Pro 9010");
        assert_eq!(result.model_url, "http://www.hp.com/");
        assert_eq!(result.printer_service, "http://10.0.0.5:3910/");
        assert_eq!(result.scanner_service, "http://10.0.0.5:3911/");
        assert_eq!(transport.connects().len(), 1);

        let request = transport.request_text(0);
        assert!(request.starts_with("POST /WebServices/Device HTTP/1.1\r\n"));
        assert!(request.contains("<wsa:To>http://10.0.0.5:80/WebServices/Device</wsa:To>"));
    }

    #[test]
    fn escl_only_device() {
        let transport = ScriptedTransport::new(vec![Script::Refuse, ok(STATUS)]);
        let result = probe(&transport);
        assert_eq!(result.protocol, DetectedProtocol::Escl);
        assert_eq!(result.model_name, "");
        assert_eq!(result.printer_service, "");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocol"], "eSCL");
        assert!(transport.request_text(0).starts_with("GET /eSCL/ScannerStatus HTTP/1.1\r\n"));
    }

    #[test]
    fn wsd_error_status_falls_through() {
        let transport = ScriptedTransport::new(vec![
            Script::Reply(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 9\r\n\r\nModelName".to_vec()),
            ok(STATUS),
        ]);
        assert_eq!(probe(&transport).protocol, DetectedProtocol::Escl);
    }

    #[test]
    fn silent_device_is_unknown() {
        let transport = ScriptedTransport::new(vec![Script::Stall(Vec::new()), ok("<html>printer</html>")]);
        assert_eq!(probe(&transport), ProbeResult::default());
        assert_eq!(transport.connects().len(), 2);
    }

    #[test]
    fn endless_metadata_stream_falls_through() {
        let transport = ScriptedTransport::new(vec![
            Script::Trickle(b"HTTP/1.1 200 OK\r\n\r\n<wsdp:ModelName>".to_vec()),
            ok(STATUS),
        ]);
        let started = Instant::now();
        let result = DeviceProbe::new(&transport, Duration::from_millis(50)).probe(&device());
        assert_eq!(result.protocol, DetectedProtocol::Escl);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn unreachable_device_is_unknown() {
        let transport = ScriptedTransport::new(Vec::new());
        let json = serde_json::to_string(&probe(&transport)).unwrap();
        assert_eq!(
            json,
            r#"{"modelName":"","modelUrl":"","printerService":"","scannerService":"","protocol":"unknown"}"#
        );
    }

    #[test]
    fn unprefixed_hosted_blocks() {
        let body = "<ModelName>Bar</ModelName><Hosted><Address>scan-ep</Address>\
                    <Types>ScannerServiceType</Types></Hosted>";
        let result = summarize(body, DetectedProtocol::Wsd);
        assert_eq!(result.model_name, "Bar");
        assert_eq!(result.scanner_service, "scan-ep");
        assert_eq!(result.printer_service, "");
    }

    #[test]
    fn later_hosted_block_replaces_earlier() {
        let body = "<ModelName>Dup</ModelName>\
                    <Hosted><Address>first</Address><Types>ScannerServiceType</Types></Hosted>\
                    <Hosted><Address>second</Address><Types>ScannerServiceType</Types></Hosted>";
        assert_eq!(summarize(body, DetectedProtocol::Wsd).scanner_service, "second");
    }

    #[test]
    fn markers() {
        assert!(looks_like_wsd("<wsdp:ThisModel/>"));
        assert!(!looks_like_wsd(STATUS));
        assert!(looks_like_escl(STATUS));
        assert!(!looks_like_escl("<html/>"));
    }
}
