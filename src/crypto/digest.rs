//! SHA-256 hex digests of stable labels.
//!
//! Used wherever a deterministic, reproducible value has to be derived
//! from a constant string: implicit salts and label-derived keys.

use sha2::{Digest, Sha256};

/// Length of a SHA-256 hex digest in characters.
pub const HEX_DIGEST_LEN: usize = 64;

/// SHA-256 of `label` as 64 lowercase hex characters.
pub fn hexdigest(label: &[u8]) -> String {
    format!("{:x}", Sha256::digest(label))
}

/// The first `len` characters of `hexdigest(label)`.
///
/// `len` is clamped to the full digest length.
pub fn short_hexdigest(label: &[u8], len: usize) -> String {
    let mut digest = hexdigest(label);
    digest.truncate(len.min(HEX_DIGEST_LEN));
    digest
}
