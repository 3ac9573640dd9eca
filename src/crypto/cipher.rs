//! AES-256 encryption in CBC and GCM modes.
//!
//! CBC uses PKCS#7 padding and carries no tag. GCM produces a 16-byte
//! authentication tag which is persisted appended to the ciphertext:
//!
//! ```text
//!   CBC: [ ciphertext ]
//!   GCM: [ ciphertext | 16-byte tag ]
//! ```
//!
//! Callers supply the IV; nothing here generates randomness, so the same
//! key, IV and plaintext always give the same output.

use std::fmt;
use std::str::FromStr;

use aes::Aes256;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{CodecError, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes.
const BLOCK_LEN: usize = 16;

/// Size of the AES-256 key in bytes.
const KEY_LEN: usize = 32;

/// Size of the GCM authentication tag in bytes.
const TAG_LEN: usize = 16;

/// Symmetric algorithms an attribute can be encrypted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

impl Algorithm {
    pub fn key_len(self) -> usize {
        KEY_LEN
    }

    pub fn iv_len(self) -> usize {
        match self {
            Algorithm::Aes256Cbc => BLOCK_LEN,
            Algorithm::Aes256Gcm => 12,
        }
    }

    pub fn tag_len(self) -> usize {
        match self {
            Algorithm::Aes256Cbc => 0,
            Algorithm::Aes256Gcm => TAG_LEN,
        }
    }

    /// Whether the algorithm authenticates its ciphertext.
    pub fn is_aead(self) -> bool {
        self.tag_len() > 0
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Aes256Cbc => "aes-256-cbc",
            Algorithm::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aes-256-cbc" => Ok(Algorithm::Aes256Cbc),
            "aes-256-gcm" => Ok(Algorithm::Aes256Gcm),
            other => Err(CodecError::UnsupportedMode(format!(
                "unknown algorithm '{other}'"
            ))),
        }
    }
}

/// Output of [`encrypt`]: raw ciphertext plus the tag for AEAD modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub tag: Option<Vec<u8>>,
}

impl Sealed {
    /// Persisted layout: `ciphertext || tag`.
    pub fn into_combined(self) -> Vec<u8> {
        let mut out = self.ciphertext;
        if let Some(tag) = self.tag {
            out.extend_from_slice(&tag);
        }
        out
    }
}

/// Split a persisted `ciphertext || tag` buffer back into its parts.
pub fn split_combined(algorithm: Algorithm, combined: &[u8]) -> Result<(&[u8], Option<&[u8]>)> {
    if !algorithm.is_aead() {
        return Ok((combined, None));
    }
    if combined.len() < algorithm.tag_len() {
        return Err(CodecError::DecryptionFailed);
    }
    let (ciphertext, tag) = combined.split_at(combined.len() - algorithm.tag_len());
    Ok((ciphertext, Some(tag)))
}

fn check_lengths(algorithm: Algorithm, key: &[u8], iv: &[u8]) -> Result<()> {
    if key.len() != algorithm.key_len() {
        return Err(CodecError::InvalidKeyLength(format!(
            "{algorithm} needs a {}-byte key, got {}",
            algorithm.key_len(),
            key.len()
        )));
    }
    if iv.len() != algorithm.iv_len() {
        return Err(CodecError::InvalidKeyLength(format!(
            "{algorithm} needs a {}-byte IV, got {}",
            algorithm.iv_len(),
            iv.len()
        )));
    }
    Ok(())
}

/// Encrypt `plaintext` under `key` and `iv`.
pub fn encrypt(algorithm: Algorithm, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Sealed> {
    check_lengths(algorithm, key, iv)?;

    match algorithm {
        Algorithm::Aes256Cbc => {
            // Build the cipher and pad the plaintext to whole blocks.
            let ciphertext = Aes256CbcEnc::new_from_slices(key, iv)
                .map_err(|e| CodecError::InvalidKeyLength(format!("{e}")))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
            Ok(Sealed {
                ciphertext,
                tag: None,
            })
        }
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key)
                .map_err(|e| CodecError::InvalidKeyLength(format!("{e}")))?;

            // Encrypt and authenticate the plaintext.
            let mut ciphertext = cipher
                .encrypt(Nonce::from_slice(iv), plaintext)
                .map_err(|e| CodecError::EncryptionFailed(format!("encryption error: {e}")))?;
            // aes-gcm appends the tag; keep it separate.
            let tag = ciphertext.split_off(ciphertext.len() - TAG_LEN);
            Ok(Sealed {
                ciphertext,
                tag: Some(tag),
            })
        }
    }
}

/// Decrypt `ciphertext` under `key` and `iv`, verifying `tag` for AEAD modes.
///
/// Every failure, including a key or IV of the wrong size, is reported as
/// [`CodecError::DecryptionFailed`] so callers cannot tell which check tripped.
pub fn decrypt(
    algorithm: Algorithm,
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>> {
    check_lengths(algorithm, key, iv).map_err(|_| CodecError::DecryptionFailed)?;

    match algorithm {
        Algorithm::Aes256Cbc => {
            if tag.is_some() || ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
                return Err(CodecError::DecryptionFailed);
            }
            // Decrypt and strip the padding.
            let plaintext = Aes256CbcDec::new_from_slices(key, iv)
                .map_err(|_| CodecError::DecryptionFailed)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| CodecError::DecryptionFailed)?;
            Ok(Zeroizing::new(plaintext))
        }
        Algorithm::Aes256Gcm => {
            let tag = tag.ok_or(CodecError::DecryptionFailed)?;
            if tag.len() != TAG_LEN {
                return Err(CodecError::DecryptionFailed);
            }
            // Reassemble the layout aes-gcm expects: ciphertext || tag.
            let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
            combined.extend_from_slice(ciphertext);
            combined.extend_from_slice(tag);

            // Decrypt and verify the auth tag.
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CodecError::DecryptionFailed)?;
            let plaintext = cipher
                .decrypt(Nonce::from_slice(iv), combined.as_slice())
                .map_err(|_| CodecError::DecryptionFailed)?;
            Ok(Zeroizing::new(plaintext))
        }
    }
}
