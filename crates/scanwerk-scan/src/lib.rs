// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk Scan: WSD and eSCL scan clients, streaming multipart image
// extraction, device probing and raw print pass-through. Everything talks to
// devices through the blocking `Transport` seam in `transport`.

pub mod buffer;
pub mod client;
pub mod discovery;
pub mod escl;
pub mod http;
pub mod multipart;
pub mod passthrough;
pub mod probe;
pub mod retry;
pub mod soap;
pub mod tags;
pub mod transport;
pub mod wsd;

pub use buffer::ImageBuffer;
pub use client::ScanClient;
pub use discovery::{ListingMode, listing_json};
pub use passthrough::PassthroughReply;
pub use probe::DeviceProbe;
pub use transport::{TcpTransport, Transport};
