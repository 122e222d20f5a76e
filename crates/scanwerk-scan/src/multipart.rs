// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Streaming multipart/related parser for WSD RetrieveImage responses.
//
// The response carries a SOAP part followed by the image part. We never hold
// the whole response: headers and part headers are read line by line, then
// the image payload is copied byte by byte into an `ImageBuffer` while a
// small look-behind window watches for the delimiter. JPEG data contains CR
// and LF bytes freely, so delimiter detection must not assume line
// alignment.

use std::collections::VecDeque;
use std::io::Read;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use scanwerk_core::error::{Result, ScanwerkError};

use crate::buffer::ImageBuffer;
use crate::http::HttpStream;

/// Bytes kept in front of the delimiter so that the line break preceding
/// it can be dropped.
const LOOKBEHIND: usize = 2;

/// Read one multipart response and stream its image part into `image`.
///
/// `header_budget` bounds the whole HTTP header phase; reads after that are
/// bounded by the connection's own inactivity timeout.
#[instrument(skip_all, fields(peer = %stream.peer()))]
pub fn read_image<R: Read>(
    stream: &mut HttpStream<R>,
    header_budget: Duration,
    image: &mut ImageBuffer,
) -> Result<()> {
    let boundary = read_boundary(stream, header_budget)?;
    debug!(%boundary, "multipart boundary");
    seek_image_payload(stream, &boundary)?;
    stream_payload(stream, &boundary, image)
}

/// Header phase: scan response headers for the multipart boundary. The
/// whole phase, trickling peers included, must finish within `budget`.
pub fn read_boundary<R: Read>(stream: &mut HttpStream<R>, budget: Duration) -> Result<String> {
    stream.set_deadline(Some(Instant::now() + budget));
    let boundary = scan_headers(stream);
    stream.set_deadline(None);
    boundary?.ok_or_else(|| {
        ScanwerkError::MalformedResponse("response headers declare no multipart boundary".into())
    })
}

fn scan_headers<R: Read>(stream: &mut HttpStream<R>) -> Result<Option<String>> {
    let mut boundary = None;
    while let Some(line) = stream.read_line()? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if boundary.is_none() {
            boundary = parse_boundary(line);
        }
    }
    Ok(boundary)
}

/// Boundary token from a `Content-Type` header line, without trailing
/// parameters or quotes.
pub fn parse_boundary(line: &str) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    if !lower.starts_with("content-type:") {
        return None;
    }
    let at = lower.find("boundary=")? + "boundary=".len();
    let token: String = line[at..]
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| *c != '"')
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Body phase: walk part headers until the blank line that opens the image
/// payload.
fn seek_image_payload<R: Read>(stream: &mut HttpStream<R>, boundary: &str) -> Result<()> {
    let delimiter = format!("--{boundary}");
    let close_delimiter = format!("{delimiter}--");
    let mut in_image_part = false;

    while let Some(line) = stream.read_line()? {
        let line = line.trim();
        if line == delimiter {
            in_image_part = false;
        } else if line == close_delimiter {
            return Err(ScanwerkError::MalformedResponse(
                "multipart message ended without an image part".into(),
            ));
        } else if is_image_content_type(line) {
            in_image_part = true;
        } else if in_image_part && line.is_empty() {
            return Ok(());
        }
    }

    Err(ScanwerkError::MalformedResponse(
        "response ended before the image part started".into(),
    ))
}

fn is_image_content_type(line: &str) -> bool {
    let Some((name, value)) = line.split_once(':') else {
        return false;
    };
    name.trim().eq_ignore_ascii_case("content-type")
        && value.trim_start().to_ascii_lowercase().starts_with("image/")
}

/// Raw byte mode: copy payload bytes until the delimiter appears.
fn stream_payload<R: Read>(
    stream: &mut HttpStream<R>,
    boundary: &str,
    image: &mut ImageBuffer,
) -> Result<()> {
    let mut window = BoundaryWindow::new(format!("--{boundary}").into_bytes());

    while let Some(byte) = stream.read_byte()? {
        match window.push(byte) {
            WindowStep::Pending => {}
            WindowStep::Emit(out) => image.push(out)?,
            WindowStep::Delimiter => {
                image.append(&window.payload_tail())?;
                if image.is_empty() {
                    return Err(ScanwerkError::IncompleteTransfer {
                        expected: None,
                        received: 0,
                    });
                }
                debug!(bytes = image.len(), "image part complete");
                return Ok(());
            }
        }
    }

    warn!(bytes = image.len(), "stream closed inside the image part");
    Err(ScanwerkError::IncompleteTransfer {
        expected: None,
        received: image.len() as u64,
    })
}

/// Outcome of pushing one byte through a [`BoundaryWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStep {
    /// Byte held; nothing to emit yet.
    Pending,
    /// The oldest held byte is confirmed payload.
    Emit(u8),
    /// The window now ends with the delimiter.
    Delimiter,
}

/// Fixed-capacity sliding window that recognises `--<boundary>` in a byte
/// stream.
///
/// Holds at most `delimiter.len() + 2` bytes. The closing delimiter
/// `--<boundary>--` begins with the same bytes, so one comparison detects
/// both.
#[derive(Debug)]
pub struct BoundaryWindow {
    delimiter: Vec<u8>,
    bytes: VecDeque<u8>,
}

impl BoundaryWindow {
    pub fn new(delimiter: Vec<u8>) -> Self {
        let capacity = delimiter.len() + LOOKBEHIND;
        Self {
            delimiter,
            bytes: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, byte: u8) -> WindowStep {
        self.bytes.push_back(byte);
        if self.ends_with_delimiter() {
            return WindowStep::Delimiter;
        }
        if self.bytes.len() > self.delimiter.len() + LOOKBEHIND - 1 {
            if let Some(out) = self.bytes.pop_front() {
                return WindowStep::Emit(out);
            }
        }
        WindowStep::Pending
    }

    fn ends_with_delimiter(&self) -> bool {
        let len = self.bytes.len();
        len >= self.delimiter.len()
            && self
                .bytes
                .iter()
                .skip(len - self.delimiter.len())
                .eq(self.delimiter.iter())
    }

    /// After [`WindowStep::Delimiter`]: payload bytes still held in front
    /// of the delimiter, minus the CRLF that belongs to it. A bare LF is
    /// payload.
    pub fn payload_tail(&self) -> Vec<u8> {
        let held = self.bytes.len().saturating_sub(self.delimiter.len());
        let mut tail: Vec<u8> = self.bytes.iter().take(held).copied().collect();
        if tail.ends_with(b"\r\n") {
            tail.truncate(tail.len() - 2);
        }
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const JPEG: &[u8] = &[
        0xFF, 0xD8, 0xFF, 0xE0, 0x0D, 0x0A, 0x2D, 0x2D, 0x78, 0x79, 0x0A, 0x0D, 0x0A, 0x00, 0x2D,
        0x7A, 0xFF, 0xD9,
    ];

    fn response(boundary_header: &str, parts: &[u8]) -> Vec<u8> {
        let mut bytes = format!(
            "HTTP/1.1 200 OK\r\nServer: test\r\n{boundary_header}\r\nConnection: close\r\n\r\n"
        )
        .into_bytes();
        bytes.extend_from_slice(parts);
        bytes
    }

    fn wsd_parts(boundary: &str, image: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{boundary}\r\n\
             Content-Type: application/xop+xml; charset=utf-8\r\n\
             Content-ID: <soap>\r\n\
             \r\n\
             <soap:Envelope><soap:Body><wscn:RetrieveImageResponse/></soap:Body></soap:Envelope>\r\n\
             --{boundary}\r\n\
             Content-Type: image/jpeg\r\n\
             Content-ID: <image>\r\n\
             \r\n"
        )
        .into_bytes();
        body.extend_from_slice(image);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    fn parse(bytes: Vec<u8>) -> Result<ImageBuffer> {
        let mut stream = HttpStream::new(Cursor::new(bytes), "test");
        let mut image = ImageBuffer::new(8)?;
        read_image(&mut stream, Duration::from_secs(5), &mut image)?;
        Ok(image)
    }

    #[test]
    fn boundary_parameter_variants() {
        assert_eq!(
            parse_boundary("Content-Type: multipart/related; boundary=xyz123").as_deref(),
            Some("xyz123")
        );
        assert_eq!(
            parse_boundary(r#"content-type: multipart/related; boundary="uuid:abc"; type="application/xop+xml""#)
                .as_deref(),
            Some("uuid:abc")
        );
        assert_eq!(parse_boundary("Content-Type: multipart/related; boundary="), None);
        assert_eq!(parse_boundary("X-Note: boundary=nope"), None);
    }

    #[test]
    fn extracts_exact_image_bytes() {
        let bytes = response(
            "Content-Type: multipart/related; boundary=xyz123; type=\"application/xop+xml\"",
            &wsd_parts("xyz123", JPEG),
        );
        let image = parse(bytes).unwrap();
        assert_eq!(image.as_slice(), JPEG);
    }

    #[test]
    fn delimiter_prefix_inside_payload_is_data() {
        let mut payload = vec![0xFF, 0xD8];
        payload.extend_from_slice(b"\r\n--xyz12\r\n-\n--xyz");
        payload.extend_from_slice(&[0xFF, 0xD9]);

        let bytes = response(
            "Content-Type: multipart/related; boundary=\"xyz123\"",
            &wsd_parts("xyz123", &payload),
        );
        assert_eq!(parse(bytes).unwrap().as_slice(), &payload[..]);
    }

    #[test]
    fn single_byte_image() {
        let bytes = response(
            "Content-Type: multipart/related; boundary=b",
            &wsd_parts("b", &[0x42]),
        );
        assert_eq!(parse(bytes).unwrap().as_slice(), &[0x42]);
    }

    #[test]
    fn delimiter_without_preceding_line_break() {
        let mut parts = b"--b\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        parts.extend_from_slice(&[1, 2, 3]);
        parts.extend_from_slice(b"--b--");
        let bytes = response("Content-Type: multipart/related; boundary=b", &parts);
        assert_eq!(parse(bytes).unwrap().as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn trailing_lf_byte_is_kept_without_crlf() {
        let mut parts = b"--b\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        parts.extend_from_slice(&[1, 2, 0x0A]);
        parts.extend_from_slice(b"--b--");
        let bytes = response("Content-Type: multipart/related; boundary=b", &parts);
        assert_eq!(parse(bytes).unwrap().as_slice(), &[1, 2, 0x0A]);
    }

    #[test]
    fn header_phase_is_bounded_in_total() {
        struct Trickle(Cursor<Vec<u8>>);
        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = self.0.read(buf)?;
                if n > 0 || buf.is_empty() {
                    return Ok(n);
                }
                std::thread::sleep(Duration::from_millis(1));
                buf[0] = b'a';
                Ok(1)
            }
        }

        let head = b"HTTP/1.1 200 OK\r\nContent-Type: multipart/related; boundary=b\r\nX-Slow: ".to_vec();
        let mut stream = HttpStream::new(Trickle(Cursor::new(head)), "test");
        let started = Instant::now();
        let err = read_boundary(&mut stream, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ScanwerkError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn overlong_header_line_is_malformed() {
        let head = Cursor::new(b"HTTP/1.1 200 OK\r\nX-Junk: ".to_vec()).chain(std::io::repeat(b'j'));
        let mut stream = HttpStream::new(head, "test");
        assert!(matches!(
            read_boundary(&mut stream, Duration::from_secs(5)),
            Err(ScanwerkError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_boundary_is_malformed() {
        let bytes = response("Content-Type: application/soap+xml", b"<soap/>");
        assert!(matches!(parse(bytes), Err(ScanwerkError::MalformedResponse(_))));
    }

    #[test]
    fn no_image_part_is_malformed() {
        let parts = b"--b\r\nContent-Type: application/xop+xml\r\n\r\n<fault/>\r\n--b--\r\n";
        let bytes = response("Content-Type: multipart/related; boundary=b", parts);
        assert!(matches!(parse(bytes), Err(ScanwerkError::MalformedResponse(_))));
    }

    #[test]
    fn empty_image_part_fails() {
        let bytes = response(
            "Content-Type: multipart/related; boundary=b",
            &wsd_parts("b", &[]),
        );
        assert!(matches!(
            parse(bytes),
            Err(ScanwerkError::IncompleteTransfer { received: 0, .. })
        ));
    }

    #[test]
    fn truncated_image_part_fails() {
        let mut parts = b"--b\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        parts.extend_from_slice(&[0xFF; 100]);
        let bytes = response("Content-Type: multipart/related; boundary=b", &parts);
        assert!(matches!(
            parse(bytes),
            Err(ScanwerkError::IncompleteTransfer { .. })
        ));
    }

    #[test]
    fn window_emits_oldest_byte_once_full() {
        let mut window = BoundaryWindow::new(b"--b".to_vec());
        let steps: Vec<_> = b"abcdef".iter().map(|b| window.push(*b)).collect();
        assert_eq!(
            steps,
            vec![
                WindowStep::Pending,
                WindowStep::Pending,
                WindowStep::Pending,
                WindowStep::Pending,
                WindowStep::Emit(b'a'),
                WindowStep::Emit(b'b'),
            ]
        );
    }
}
