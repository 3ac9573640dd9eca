//! Key and IV derivation.
//!
//! Three derivations are supported:
//! - PBKDF2-HMAC-SHA1 (the historical per-attribute derivation, 2000
//!   iterations by default), byte compatible with stored envelopes.
//! - Argon2id, an opt-in memory-hard alternative for new fields.
//! - OpenSSL `EVP_BytesToKey` with MD5 and 2048 rounds, which stretches a
//!   single secret into key + IV for the shared mode.

use argon2::{Algorithm, Argon2, Params, Version};
use md5::{Digest, Md5};
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::errors::{CodecError, Result};

/// Largest key a single derivation may produce (OpenSSL's `EVP_MAX_KEY_LENGTH`).
pub const MAX_DERIVED_LEN: usize = 64;

/// Largest IV `bytes_to_key` may produce (OpenSSL's `EVP_MAX_IV_LENGTH`).
pub const MAX_IV_LEN: usize = 16;

/// PBKDF2 iteration count used by every historical per-attribute envelope.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 2000;

/// Hash rounds applied per block by the legacy `EVP_BytesToKey` stretcher.
const LEGACY_ROUNDS: usize = 2048;

/// Minimum safe Argon2 memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// The function used to turn a resolved key and a salt into a cipher key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivation {
    Pbkdf2HmacSha1 { iterations: u32 },
    Argon2id(Argon2Params),
}

impl Default for KeyDerivation {
    fn default() -> Self {
        KeyDerivation::Pbkdf2HmacSha1 {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KeyDerivation {
    /// Check the parameters without deriving anything.
    pub fn validate(&self) -> Result<()> {
        match self {
            KeyDerivation::Pbkdf2HmacSha1 { iterations } => {
                if *iterations < 1 {
                    return Err(CodecError::KeyDerivationFailed(
                        "PBKDF2 iterations must be at least 1".into(),
                    ));
                }
            }
            KeyDerivation::Argon2id(params) => {
                if params.memory_kib < MIN_MEMORY_KIB {
                    return Err(CodecError::KeyDerivationFailed(format!(
                        "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                        params.memory_kib
                    )));
                }
                if params.iterations < 1 {
                    return Err(CodecError::KeyDerivationFailed(
                        "Argon2 iterations must be at least 1".into(),
                    ));
                }
                if params.parallelism < 1 {
                    return Err(CodecError::KeyDerivationFailed(
                        "Argon2 parallelism must be at least 1".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Derive `output_len` bytes from `secret` and `salt`.
    ///
    /// The same inputs always produce the same bytes.
    pub fn derive(
        &self,
        secret: &[u8],
        salt: &[u8],
        output_len: usize,
    ) -> Result<Zeroizing<Vec<u8>>> {
        check_output_len(output_len)?;
        self.validate()?;

        let mut out = Zeroizing::new(vec![0u8; output_len]);
        match self {
            KeyDerivation::Pbkdf2HmacSha1 { iterations } => {
                pbkdf2::pbkdf2_hmac::<Sha1>(secret, salt, *iterations, &mut out);
            }
            KeyDerivation::Argon2id(params) => {
                let params = Params::new(
                    params.memory_kib,
                    params.iterations,
                    params.parallelism,
                    Some(output_len),
                )
                .map_err(|e| {
                    CodecError::KeyDerivationFailed(format!("invalid Argon2 params: {e}"))
                })?;

                Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                    .hash_password_into(secret, salt, &mut out)
                    .map_err(|e| {
                        CodecError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}"))
                    })?;
            }
        }
        Ok(out)
    }
}

fn check_output_len(output_len: usize) -> Result<()> {
    if output_len == 0 || output_len > MAX_DERIVED_LEN {
        return Err(CodecError::InvalidKeyLength(format!(
            "requested {output_len} bytes, must be between 1 and {MAX_DERIVED_LEN}"
        )));
    }
    Ok(())
}

/// Stretch `secret` into a key and an IV the way OpenSSL's
/// `EVP_BytesToKey(MD5, no salt, 2048 rounds)` does.
///
/// Each block is `MD5^2048(previous_block || secret)`; blocks are
/// concatenated until `key_len + iv_len` bytes exist, then split.
pub fn bytes_to_key(
    secret: &[u8],
    key_len: usize,
    iv_len: usize,
) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>)> {
    check_output_len(key_len)?;
    if iv_len > MAX_IV_LEN {
        return Err(CodecError::InvalidKeyLength(format!(
            "requested a {iv_len}-byte IV, at most {MAX_IV_LEN} is supported"
        )));
    }

    let total = key_len + iv_len;
    let mut material = Zeroizing::new(Vec::with_capacity(total + 16));
    let mut previous = Zeroizing::new(Vec::new());

    while material.len() < total {
        let mut hasher = Md5::new();
        hasher.update(previous.as_slice());
        hasher.update(secret);
        let mut block = hasher.finalize();
        for _ in 1..LEGACY_ROUNDS {
            block = Md5::digest(block.as_slice());
        }
        material.extend_from_slice(&block);
        previous.clear();
        previous.extend_from_slice(&block);
    }

    let key = Zeroizing::new(material[..key_len].to_vec());
    let iv = Zeroizing::new(material[key_len..total].to_vec());
    Ok((key, iv))
}
