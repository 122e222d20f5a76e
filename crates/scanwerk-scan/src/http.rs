// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal HTTP/1.1 framing over a blocking `Connection`.
//
// Only what the scan protocols need: one request per connection
// (`Connection: close`), status line + headers, and body framing by
// Content-Length, chunked transfer coding, or connection close.

use std::io::{BufRead, BufReader, Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::DeviceAddress;

use crate::transport::{Connection, Transport, map_io_error};

/// Longest status, header or part-header line accepted.
pub const MAX_LINE_BYTES: usize = 8 * 1024;

/// Largest SOAP or XML document read into memory.
pub const MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// An outbound request.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub method: &'static str,
    pub path: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

impl<'a> Request<'a> {
    pub fn get(path: &'a str) -> Self {
        Self {
            method: "GET",
            path,
            content_type: None,
            body: &[],
        }
    }

    pub fn post(path: &'a str, content_type: &'a str, body: &'a [u8]) -> Self {
        Self {
            method: "POST",
            path,
            content_type: Some(content_type),
            body,
        }
    }

    /// Serialise the request line, headers and body.
    pub fn to_bytes(&self, authority: &str) -> Vec<u8> {
        let mut head = format!("{} {} HTTP/1.1\r\nHost: {}\r\n", self.method, self.path, authority);
        if let Some(content_type) = self.content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        if self.method != "GET" || !self.body.is_empty() {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(self.body);
        bytes
    }
}

/// Open a fresh connection to `device`, send `request`, and return the
/// response stream. `timeout` bounds the connect and every later read.
pub fn send(
    transport: &dyn Transport,
    device: &DeviceAddress,
    request: &Request<'_>,
    timeout: Duration,
) -> Result<HttpStream> {
    let mut conn = transport.connect(device, timeout)?;
    let peer = device.to_string();

    debug!(method = request.method, path = request.path, %peer, "sending HTTP request");
    conn.write_all(&request.to_bytes(&device.authority()))
        .and_then(|_| conn.flush())
        .map_err(|e| map_io_error(e, &peer))?;

    Ok(HttpStream::new(conn, peer))
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length").and_then(|v| v.trim().parse().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    }
}

/// Buffered reader over one response.
///
/// An optional deadline bounds line reads and `read_body_to_end` in total,
/// on top of the connection's per-read inactivity timeout. It is checked
/// on every buffer refill.
pub struct HttpStream<R: Read = Box<dyn Connection>> {
    inner: BufReader<R>,
    peer: String,
    deadline: Option<Instant>,
}

impl<R: Read> HttpStream<R> {
    pub fn new(reader: R, peer: impl Into<String>) -> Self {
        Self {
            inner: BufReader::new(reader),
            peer: peer.into(),
            deadline: None,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ScanwerkError::Timeout(format!(
                "{} did not finish responding within the time budget",
                self.peer
            ))),
            _ => Ok(()),
        }
    }

    /// Next byte, or `None` once the peer has closed.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok([]) => return Ok(None),
                Ok(buf) => {
                    let byte = buf[0];
                    self.inner.consume(1);
                    return Ok(Some(byte));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io_error(e, &self.peer)),
            }
        }
    }

    /// Next line with its `\n` / `\r\n` terminator stripped, or `None` at
    /// end of stream. Non-UTF-8 bytes are replaced. Lines longer than
    /// [`MAX_LINE_BYTES`] are `MalformedResponse`.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut raw = Vec::new();
        loop {
            self.check_deadline()?;
            let available = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io_error(e, &self.peer)),
            };
            if available.is_empty() {
                if raw.is_empty() {
                    return Ok(None);
                }
                break;
            }

            let (take, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };
            raw.extend_from_slice(&available[..take]);
            self.inner.consume(take);

            if raw.len() > MAX_LINE_BYTES {
                return Err(ScanwerkError::MalformedResponse(format!(
                    "line from {} exceeds {MAX_LINE_BYTES} bytes",
                    self.peer
                )));
            }
            if complete {
                break;
            }
        }
        while matches!(raw.last(), Some(b'\n' | b'\r')) {
            raw.pop();
        }
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }

    /// Read whatever is available into `buf`; `Ok(0)` at end of stream.
    pub fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io_error(e, &self.peer)),
            }
        }
    }

    /// Parse the status line and headers.
    pub fn read_head(&mut self) -> Result<ResponseHead> {
        let status_line = self.read_line()?.ok_or_else(|| {
            ScanwerkError::MalformedResponse(format!("{} closed before sending a status line", self.peer))
        })?;
        let status = parse_status_line(&status_line).ok_or_else(|| {
            ScanwerkError::MalformedResponse(format!("bad status line from {}: {status_line:?}", self.peer))
        })?;

        let mut headers = Vec::new();
        while let Some(line) = self.read_line()? {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        trace!(status, headers = headers.len(), peer = %self.peer, "response head");
        Ok(ResponseHead { status, headers })
    }

    /// Body reader framed according to `head`.
    pub fn body<'s>(&'s mut self, head: &ResponseHead) -> BodyReader<'s, R> {
        let framing = if head.is_chunked() {
            Framing::Chunked {
                remaining: 0,
                done: false,
            }
        } else if let Some(length) = head.content_length() {
            Framing::Length { remaining: length }
        } else {
            Framing::UntilClose
        };
        BodyReader {
            stream: self,
            framing,
        }
    }

    /// Read the whole body, at most `limit` bytes. A stall after some bytes
    /// arrived ends the body instead of failing it; a stall before any byte
    /// is a `Timeout`, and so is passing the stream's deadline.
    pub fn read_body_to_end(&mut self, head: &ResponseHead, limit: usize) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut buf = [0u8; 1024];
        let mut reader = self.body(head);
        loop {
            reader.stream.check_deadline()?;
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if body.len() + n > limit {
                        return Err(ScanwerkError::MalformedResponse(format!(
                            "response body from {} exceeds {limit} bytes",
                            reader.stream.peer
                        )));
                    }
                    body.extend_from_slice(&buf[..n]);
                }
                Err(ScanwerkError::Timeout(_)) if !body.is_empty() => {
                    debug!(bytes = body.len(), "peer went quiet, using what arrived");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(body)
    }
}

enum Framing {
    Length { remaining: u64 },
    Chunked { remaining: u64, done: bool },
    UntilClose,
}

/// Decoded view of a response body. `read` returns `Ok(0)` at the end of
/// the body, or early if the peer closes first.
pub struct BodyReader<'s, R: Read> {
    stream: &'s mut HttpStream<R>,
    framing: Framing,
}

impl<R: Read> BodyReader<'_, R> {
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match &mut self.framing {
            Framing::UntilClose => self.stream.read_some(buf),
            Framing::Length { remaining } => {
                if *remaining == 0 {
                    return Ok(0);
                }
                let max = buf.len().min(usize::try_from(*remaining).unwrap_or(usize::MAX));
                let n = self.stream.read_some(&mut buf[..max])?;
                *remaining -= n as u64;
                Ok(n)
            }
            Framing::Chunked { remaining, done } => {
                if *done {
                    return Ok(0);
                }
                if *remaining == 0 {
                    let Some(size_line) = self.stream.read_line()? else {
                        return Ok(0);
                    };
                    let size = parse_chunk_size(&size_line).ok_or_else(|| {
                        ScanwerkError::MalformedResponse(format!("bad chunk size line: {size_line:?}"))
                    })?;
                    if size == 0 {
                        *done = true;
                        // Trailer section ends with an empty line.
                        while let Some(line) = self.stream.read_line()? {
                            if line.is_empty() {
                                break;
                            }
                        }
                        return Ok(0);
                    }
                    *remaining = size;
                }
                let max = buf.len().min(usize::try_from(*remaining).unwrap_or(usize::MAX));
                let n = self.stream.read_some(&mut buf[..max])?;
                *remaining -= n as u64;
                if n > 0 && *remaining == 0 {
                    // CRLF after the chunk data.
                    self.stream.read_line()?;
                }
                Ok(n)
            }
        }
    }
}

fn parse_status_line(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

fn parse_chunk_size(line: &str) -> Option<u64> {
    let digits = line.split(';').next()?.trim();
    u64::from_str_radix(digits, 16).ok()
}

/// Split an eSCL `Location` value into the device to contact and the
/// request path. Relative locations refer to `device`.
pub fn resolve_location(location: &str, device: &DeviceAddress) -> Result<(DeviceAddress, String)> {
    let location = location.trim();
    if location.is_empty() {
        return Err(ScanwerkError::MalformedResponse("empty Location header".into()));
    }

    let Some(rest) = strip_prefix_ignore_case(location, "http://") else {
        if strip_prefix_ignore_case(location, "https://").is_some() {
            return Err(ScanwerkError::InvalidRequest(format!(
                "TLS locations are not supported: {location}"
            )));
        }
        let path = if location.starts_with('/') {
            location.to_string()
        } else {
            format!("/{location}")
        };
        return Ok((device.clone(), path));
    };

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], rest[i..].to_string()),
        None => (rest, "/".to_string()),
    };
    let (host, port) = split_authority(authority)
        .ok_or_else(|| ScanwerkError::InvalidRequest(format!("invalid address in Location: {location}")))?;
    Ok((DeviceAddress::new(host, port), path))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn split_authority(authority: &str) -> Option<(&str, u16)> {
    if let Some(v6) = authority.strip_prefix('[') {
        let (host, after) = v6.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None if after.is_empty() => 80,
            None => return None,
        };
        return Some((host, port));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Some((host, port.parse().ok()?)),
        Some(_) => None,
        None if !authority.is_empty() => Some((authority, 80)),
        None => None,
    }
}
