//! CRC-32 (ISO-3309, reflected polynomial 0xEDB88320) over transfer payloads
//!
//! The receiver verifies the file with its own CRC-32 implementation, so this
//! has to stay bit-exact with the standard algorithm (zlib `crc32`).

/// Compute the CRC-32 of a complete payload
pub fn compute(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Incremental CRC-32, fed one chunk at a time
///
/// Produces the same value as [`compute`] over the concatenated chunks.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Current checksum of everything fed so far
    pub fn value(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}
