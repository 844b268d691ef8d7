//! CRC32 checksums for snapshot bodies
//!
//! Checksums are rendered as `crc32:xxxxxxxx` (lowercase hex, zero padded).

use crc32fast::Hasher;

const PREFIX: &str = "crc32:";

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Formats a checksum for storage.
pub fn format_checksum(checksum: u32) -> String {
    format!("{}{:08x}", PREFIX, checksum)
}

/// Verifies `data` against a formatted checksum. Malformed checksums never verify.
pub fn verify_checksum(data: &[u8], expected: &str) -> bool {
    expected
        .strip_prefix(PREFIX)
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .is_some_and(|value| compute_checksum(data) == value)
}
