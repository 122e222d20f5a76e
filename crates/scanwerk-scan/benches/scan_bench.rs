// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for multipart image streaming, tag extraction and
// image digesting in the scanwerk-scan crate.

use std::io::Cursor;
use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use scanwerk_scan::buffer::ImageBuffer;
use scanwerk_scan::http::HttpStream;
use scanwerk_scan::multipart;
use scanwerk_scan::tags::{extract_element, extract_tag};

/// A WSD RetrieveImage response carrying `image_len` bytes of JPEG-like data.
fn retrieve_image_response(image_len: usize) -> Vec<u8> {
    let mut bytes = b"HTTP/1.1 200 OK\r\n\
        Content-Type: multipart/related; type=\"application/xop+xml\"; boundary=\"uuid:bench\"\r\n\
        \r\n\
        --uuid:bench\r\n\
        Content-Type: application/xop+xml\r\n\
        \r\n\
        <soap:Envelope><soap:Body><wscn:RetrieveImageResponse/></soap:Body></soap:Envelope>\r\n\
        --uuid:bench\r\n\
        Content-Type: image/jpeg\r\n\
        \r\n"
        .to_vec();
    bytes.extend((0..image_len).map(|i| (i * 7 % 256) as u8));
    bytes.extend_from_slice(b"\r\n--uuid:bench--\r\n");
    bytes
}

fn bench_multipart(c: &mut Criterion) {
    for (label, len) in [("64 KiB", 64 * 1024), ("1 MiB", 1024 * 1024)] {
        let response = retrieve_image_response(len);
        c.bench_function(&format!("multipart read_image ({label})"), |b| {
            b.iter(|| {
                let mut stream = HttpStream::new(Cursor::new(black_box(&response[..])), "bench");
                let mut image = ImageBuffer::new(1024).expect("allocation");
                multipart::read_image(&mut stream, Duration::from_secs(5), &mut image).expect("parse");
                assert_eq!(image.len(), len);
            });
        });
    }
}

fn bench_tags(c: &mut Criterion) {
    let mut metadata = String::from("<soap:Envelope><soap:Body>");
    for i in 0..200 {
        metadata.push_str(&format!("<wsdp:Hosted><wsa:Address>http://10.0.0.{i}/</wsa:Address></wsdp:Hosted>"));
    }
    metadata.push_str("<wsdp:ModelName>OfficeJet</wsdp:ModelName><wscn:JobId>42</wscn:JobId></soap:Body></soap:Envelope>");

    c.bench_function("extract_tag (exact, late in document)", |b| {
        b.iter(|| extract_tag(black_box(&metadata), "wscn:JobId"));
    });
    c.bench_function("extract_element (prefix tolerant)", |b| {
        b.iter(|| extract_element(black_box(&metadata), "ModelName"));
    });
}

fn bench_digest(c: &mut Criterion) {
    let mut image = ImageBuffer::new(1024).expect("allocation");
    image.append(&vec![0xAB; 1024 * 1024]).expect("append");
    c.bench_function("sha256_hex (1 MiB image)", |b| {
        b.iter(|| black_box(&image).sha256_hex());
    });
}

criterion_group!(benches, bench_multipart, bench_tags, bench_digest);
criterion_main!(benches);
