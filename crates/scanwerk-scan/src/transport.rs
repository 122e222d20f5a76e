// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blocking transport seam.
//
// Every protocol client talks to the device through a `Transport`, which
// hands out one fresh `Connection` per request. The production
// implementation is plain `std::net::TcpStream` with a per-read timeout, so
// an inactivity timer is reset by every byte that arrives.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::DeviceAddress;

/// A bidirectional byte stream to a device.
pub trait Connection: Read + Write + Send {
    /// Maximum time a single read may block. `None` blocks forever.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// Opens connections to devices.
pub trait Transport {
    /// Connect to `device`, waiting at most `timeout`. The same timeout is
    /// installed as the connection's read and write timeout.
    fn connect(&self, device: &DeviceAddress, timeout: Duration) -> Result<Box<dyn Connection>>;
}

/// TCP transport backed by `std::net`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn connect(&self, device: &DeviceAddress, timeout: Duration) -> Result<Box<dyn Connection>> {
        let addrs = (device.host.as_str(), device.port)
            .to_socket_addrs()
            .map_err(|e| ScanwerkError::ConnectionFailed(format!("cannot resolve {device}: {e}")))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    debug!(%addr, "connected");
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    debug!(%addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) if is_timeout(&e) => ScanwerkError::Timeout(format!(
                "connecting to {device} took longer than {}s",
                timeout.as_secs()
            )),
            Some(e) => ScanwerkError::ConnectionFailed(format!("{device}: {e}")),
            None => ScanwerkError::ConnectionFailed(format!("{device}: no addresses resolved")),
        })
    }
}

/// Whether an I/O error is a read/connect timeout. Unix reports expired
/// socket timeouts as `WouldBlock`, Windows as `TimedOut`.
pub(crate) fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// Map an I/O error on an established connection into the error taxonomy.
pub(crate) fn map_io_error(err: std::io::Error, peer: &str) -> ScanwerkError {
    if is_timeout(&err) {
        ScanwerkError::Timeout(format!("no data from {peer} within the time budget"))
    } else {
        ScanwerkError::ConnectionFailed(format!("{peer}: {err}"))
    }
}
