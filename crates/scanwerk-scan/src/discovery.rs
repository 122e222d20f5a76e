// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering of mDNS browse results as printer or scanner listings.
//
// Browsing itself happens elsewhere; this module receives resolved service
// records, keeps the ones that match the requested listing, and renders the
// JSON document the CLI prints.

use serde::Serialize;
use serde_json::json;

use scanwerk_core::types::DiscoveredService;

/// Service names (without leading underscore or domain) that identify a
/// printer.
const PRINTER_SERVICES: &[&str] = &["ipp"];

/// Service names that identify a scanner, including the `_uscan` family
/// that eSCL devices advertise.
const SCANNER_SERVICES: &[&str] = &["uscanner", "scanner", "airscan", "escl", "uscan", "uscans"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingMode {
    Printers,
    Scanners,
}

impl ListingMode {
    pub fn key(self) -> &'static str {
        match self {
            Self::Printers => "printers",
            Self::Scanners => "scanners",
        }
    }

    fn services(self) -> &'static [&'static str] {
        match self {
            Self::Printers => PRINTER_SERVICES,
            Self::Scanners => SCANNER_SERVICES,
        }
    }

    pub fn matches(self, service_type: &str) -> bool {
        let name = service_name(service_type);
        self.services().iter().any(|s| s.eq_ignore_ascii_case(name))
    }
}

/// One entry of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub host: String,
    pub ip: String,
    pub port: u16,
}

/// Services matching `mode`, in browse order. A device advertising several
/// matching service types appears once per type.
pub fn listing(services: &[DiscoveredService], mode: ListingMode) -> Vec<ListingEntry> {
    services
        .iter()
        .filter(|s| mode.matches(&s.service_type))
        .map(|s| ListingEntry {
            host: s.host.clone(),
            ip: s.ip.to_string(),
            port: s.port,
        })
        .collect()
}

/// `{"printers":[...]}` or `{"scanners":[...]}`. The array is present even
/// when nothing matched.
pub fn listing_json(services: &[DiscoveredService], mode: ListingMode) -> serde_json::Value {
    json!({ mode.key(): listing(services, mode) })
}

/// `_uscan._tcp.local.` → `uscan`; bare names pass through.
fn service_name(service_type: &str) -> &str {
    service_type
        .trim_start_matches('_')
        .split('.')
        .next()
        .unwrap_or(service_type)
}
