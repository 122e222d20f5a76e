// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw print pass-through (JetDirect style, port 9100).
//
// Open a socket, write the payload followed by LF + form feed, then collect
// whatever the device says back until it closes or the deadline passes.
// No job state and no protocol negotiation.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use scanwerk_core::error::Result;
use scanwerk_core::types::DeviceAddress;

use crate::transport::{Transport, is_timeout, map_io_error};

/// Default raw print port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

/// Appended to every payload so the device flushes the page.
pub const TERMINATOR: &[u8] = b"\n\x0c";

const WRITE_CHUNK: usize = 8192;

/// What the device sent back after the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassthroughReply {
    Output(String),
    NoOutput,
}

impl fmt::Display for PassthroughReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(text) => write!(f, "Here is the output:\n{text}"),
            Self::NoOutput => f.write_str("Successful, but sorry no output received."),
        }
    }
}

/// Send `payload` and wait up to `timeout` for the device's reply.
#[instrument(skip_all, fields(%device, bytes = payload.len()))]
pub fn send_raw(
    transport: &dyn Transport,
    device: &DeviceAddress,
    payload: &[u8],
    timeout: Duration,
) -> Result<PassthroughReply> {
    let peer = device.to_string();
    let mut conn = transport.connect(device, timeout)?;

    let mut message = Vec::with_capacity(payload.len() + TERMINATOR.len());
    message.extend_from_slice(payload);
    message.extend_from_slice(TERMINATOR);

    let mut sent = 0;
    for chunk in message.chunks(WRITE_CHUNK) {
        conn.write_all(chunk).map_err(|e| map_io_error(e, &peer))?;
        sent += chunk.len();
        debug!(sent, total = message.len(), "pass-through progress");
    }
    conn.flush().map_err(|e| map_io_error(e, &peer))?;

    let deadline = Instant::now() + timeout;
    let mut output = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        conn.set_read_timeout(Some(remaining))?;
        match conn.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => output.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_timeout(&e) => break,
            Err(e) => return Err(map_io_error(e, &peer)),
        }
    }

    info!(sent, received = output.len(), "pass-through complete");
    Ok(if output.is_empty() {
        PassthroughReply::NoOutput
    } else {
        PassthroughReply::Output(String::from_utf8_lossy(&output).into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::{Script, ScriptedTransport};
    use scanwerk_core::error::ScanwerkError;

    fn device() -> DeviceAddress {
        DeviceAddress::new("10.0.0.7", RAW_PORT)
    }

    fn send(transport: &ScriptedTransport, payload: &[u8]) -> Result<PassthroughReply> {
        send_raw(transport, &device(), payload, Duration::from_secs(10))
    }

    #[test]
    fn payload_is_terminated() {
        let transport = ScriptedTransport::new(vec![Script::Reply(Vec::new())]);
        send(&transport, b"@PJL INFO STATUS").unwrap();
        assert_eq!(transport.requests()[0], b"@PJL INFO STATUS\n\x0c");
    }

    #[test]
    fn device_output_is_returned() {
        let transport = ScriptedTransport::new(vec![Script::Reply(b"CODE=10001\r\nONLINE=TRUE".to_vec())]);
        let reply = send(&transport, b"@PJL INFO STATUS").unwrap();
        assert_eq!(reply, PassthroughReply::Output("CODE=10001\r\nONLINE=TRUE".into()));
        assert_eq!(reply.to_string(), "Here is the output:\nCODE=10001\r\nONLINE=TRUE");
    }

    #[test]
    fn silent_device() {
        let transport = ScriptedTransport::new(vec![Script::Stall(Vec::new())]);
        let reply = send(&transport, b"hello").unwrap();
        assert_eq!(reply, PassthroughReply::NoOutput);
        assert_eq!(reply.to_string(), "Successful, but sorry no output received.");
    }

    #[test]
    fn output_before_stall_is_kept() {
        let transport = ScriptedTransport::new(vec![Script::Stall(b"READY".to_vec())]);
        assert_eq!(send(&transport, b"x").unwrap(), PassthroughReply::Output("READY".into()));
    }

    #[test]
    fn large_payload_is_written_whole() {
        let payload = vec![b'A'; 3 * WRITE_CHUNK + 17];
        let transport = ScriptedTransport::new(vec![Script::Reply(Vec::new())]);
        send(&transport, &payload).unwrap();
        assert_eq!(transport.requests()[0].len(), payload.len() + TERMINATOR.len());
    }

    #[test]
    fn refused_connection() {
        let transport = ScriptedTransport::new(vec![Script::Refuse]);
        assert!(matches!(send(&transport, b"x"), Err(ScanwerkError::ConnectionFailed(_))));
    }
}
