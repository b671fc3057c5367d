//! 64-bit content digests and content-derived keys.

use sha2::{Digest as _, Sha256};
use std::fmt::Write as _;
use xxhash_rust::xxh64::xxh64;

/// Compute the 64-bit checksum of a payload (XXH64, seed 0).
///
/// Empty input yields `0`, a sentinel distinguishing "no content" from the
/// digest of a hashed empty buffer. Both ends of the wire rely on this.
#[inline]
#[must_use]
pub fn sum64(data: &[u8]) -> u64 {
    if data.is_empty() {
        0
    } else {
        xxh64(data, 0)
    }
}

/// Derive the content-addressed key for a payload: lowercase hex SHA-256.
///
/// The store resolves a `Set` request with an empty key to this value, so
/// callers can also compute it up front and `Get` by content.
#[must_use]
pub fn content_key(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut key = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _res = write!(key, "{byte:02x}");
    }
    key
}
