//! Payload loaded for a transfer

use crate::checksum;
use std::path::Path;

/// Bytes to push together with their CRC-32
///
/// The checksum is computed once when the payload is created and declared in
/// BEGIN; the bytes are never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
    crc32: u32,
}

impl Payload {
    pub fn new(bytes: Vec<u8>) -> Self {
        let crc32 = checksum::compute(&bytes);
        Self { bytes, crc32 }
    }

    /// Read a whole file into memory
    pub fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}
