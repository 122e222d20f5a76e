// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Growable owned buffer for received image bytes.

use sha2::{Digest, Sha256};
use tracing::trace;

use scanwerk_core::error::{Result, ScanwerkError};

/// Owned, contiguous image bytes that grow in fixed chunk units.
///
/// Capacity starts at one chunk and grows by whole chunks, never doubling,
/// so a memory-constrained caller can predict the peak footprint. Growth is
/// fallible: if the allocator refuses, the append fails with
/// [`ScanwerkError::Allocation`] and the bytes already held are untouched.
#[derive(Debug)]
pub struct ImageBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    chunk: usize,
}

impl ImageBuffer {
    /// Allocate an empty buffer with one chunk of capacity.
    pub fn new(chunk: usize) -> Result<Self> {
        let chunk = chunk.max(1);
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(chunk)
            .map_err(|_| ScanwerkError::Allocation(chunk))?;
        Ok(Self {
            bytes,
            capacity: chunk,
            chunk,
        })
    }

    /// Append `data`, growing first if it does not fit.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        let needed = self
            .bytes
            .len()
            .checked_add(data.len())
            .ok_or(ScanwerkError::Allocation(usize::MAX))?;
        if needed > self.capacity {
            self.grow_to(needed)?;
        }
        self.bytes.extend_from_slice(data);
        Ok(())
    }

    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.append(&[byte])
    }

    fn grow_to(&mut self, needed: usize) -> Result<()> {
        let steps = (needed - self.capacity).div_ceil(self.chunk);
        let target = steps
            .checked_mul(self.chunk)
            .and_then(|extra| self.capacity.checked_add(extra))
            .ok_or(ScanwerkError::Allocation(usize::MAX))?;
        self.bytes
            .try_reserve_exact(target - self.bytes.len())
            .map_err(|_| ScanwerkError::Allocation(target))?;
        trace!(from = self.capacity, to = target, "image buffer grown");
        self.capacity = target;
        Ok(())
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes reserved so far; always a whole number of chunks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Hand the bytes to the caller.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    /// Drop the region and reset to zero length and zero capacity.
    pub fn release(&mut self) {
        self.bytes = Vec::new();
        self.capacity = 0;
    }

    /// Hex-encoded SHA-256 of the valid bytes.
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

impl AsRef<[u8]> for ImageBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_chunk() {
        let buf = ImageBuffer::new(1024).unwrap();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), 1024);
    }

    #[test]
    fn grows_by_whole_chunks() {
        let mut buf = ImageBuffer::new(16).unwrap();
        buf.append(&[1; 16]).unwrap();
        assert_eq!(buf.capacity(), 16);
        buf.push(2).unwrap();
        assert_eq!(buf.capacity(), 32);
        buf.append(&[3; 40]).unwrap();
        assert_eq!(buf.len(), 57);
        assert_eq!(buf.capacity(), 64);
    }

    #[test]
    fn concatenation_is_preserved_for_any_chunking() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 31 % 251) as u8).collect();
        for piece in [1usize, 3, 7, 64, 1023, 1024, 1025, 4999] {
            let mut buf = ImageBuffer::new(1024).unwrap();
            for chunk in data.chunks(piece) {
                buf.append(chunk).unwrap();
                assert!(buf.len() <= buf.capacity());
            }
            assert_eq!(buf.as_slice(), &data[..], "piece size {piece}");
        }
    }

    #[test]
    fn empty_append_is_a_no_op() {
        let mut buf = ImageBuffer::new(8).unwrap();
        buf.append(&[]).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn release_then_reuse_starts_empty() {
        let mut buf = ImageBuffer::new(8).unwrap();
        buf.append(b"secret bytes").unwrap();
        buf.release();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), 0);

        buf.append(b"new").unwrap();
        assert_eq!(buf.as_slice(), b"new");
        assert_eq!(buf.capacity(), 8);

        let fresh = ImageBuffer::new(8).unwrap();
        assert!(fresh.is_empty());
    }

    #[test]
    fn into_vec_hands_over_bytes() {
        let mut buf = ImageBuffer::new(4).unwrap();
        buf.append(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        assert_eq!(buf.into_vec(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn digest_of_known_input() {
        let mut buf = ImageBuffer::new(4).unwrap();
        buf.append(b"abc").unwrap();
        assert_eq!(
            buf.sha256_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
