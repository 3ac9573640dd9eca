//! Key material and the sources it is resolved from.
//!
//! A field's key is resolved at encode/decode time through a
//! [`KeySource`]. The crate ships three sources:
//! - [`SecretKey`]: a fixed secret.
//! - [`KeyFn`]: any closure returning a secret, for keys computed by the host.
//! - [`DerivedKey`]: the label scheme, where the key is the shared-mode
//!   AES-256-CBC encryption of `hexdigest(label)` under a master secret.

use std::fmt;

use zeroize::Zeroizing;

use super::cipher::{self, Algorithm};
use super::digest::hexdigest;
use super::kdf::bytes_to_key;
use crate::errors::{CodecError, Result};

/// Secret bytes that are zeroed when dropped.
///
/// `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes.into()),
        }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED; {}])", self.bytes.len())
    }
}

impl From<&str> for SecretKey {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<&[u8]> for SecretKey {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for SecretKey {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

/// Anything that can produce the key for a field on demand.
pub trait KeySource: Send + Sync {
    fn resolve(&self) -> Result<SecretKey>;
}

impl KeySource for SecretKey {
    fn resolve(&self) -> Result<SecretKey> {
        if self.is_empty() {
            return Err(CodecError::KeyResolution("key must not be empty".into()));
        }
        Ok(self.clone())
    }
}

impl<K: KeySource + ?Sized> KeySource for &K {
    fn resolve(&self) -> Result<SecretKey> {
        (**self).resolve()
    }
}

/// A key computed by a closure each time it is needed.
pub struct KeyFn<F>(pub F);

impl<F> KeySource for KeyFn<F>
where
    F: Fn() -> Result<SecretKey> + Send + Sync,
{
    fn resolve(&self) -> Result<SecretKey> {
        let key = (self.0)()?;
        if key.is_empty() {
            return Err(CodecError::KeyResolution(
                "key supplier returned an empty key".into(),
            ));
        }
        Ok(key)
    }
}

impl<F> fmt::Debug for KeyFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyFn(..)")
    }
}

/// A key derived from a stable label and a master secret.
///
/// The label is hashed with SHA-256, and the 64-char hex digest is
/// encrypted in shared mode (`EVP_BytesToKey` key + IV, AES-256-CBC)
/// under the master secret. The resulting 80 ciphertext bytes are the key.
#[derive(Debug, Clone)]
pub struct DerivedKey {
    label: String,
    master: SecretKey,
}

impl DerivedKey {
    pub fn from_label(label: impl Into<String>, master: impl Into<SecretKey>) -> Self {
        Self {
            label: label.into(),
            master: master.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl KeySource for DerivedKey {
    fn resolve(&self) -> Result<SecretKey> {
        if self.master.is_empty() {
            return Err(CodecError::KeyResolution(
                "master key must not be empty".into(),
            ));
        }
        let algorithm = Algorithm::Aes256Cbc;
        let (key, iv) = bytes_to_key(
            self.master.as_bytes(),
            algorithm.key_len(),
            algorithm.iv_len(),
        )?;
        let digest = hexdigest(self.label.as_bytes());
        let sealed = cipher::encrypt(algorithm, &key, &iv, digest.as_bytes())?;
        Ok(SecretKey::new(sealed.ciphertext))
    }
}
