//! Cryptographic primitives for attrcrypt.
//!
//! This module provides:
//! - SHA-256 hex digests of labels (`digest`)
//! - PBKDF2, Argon2id and legacy `EVP_BytesToKey` derivation (`kdf`)
//! - AES-256-CBC and AES-256-GCM encryption and decryption (`cipher`)
//! - Key material and key sources (`keys`)

pub mod cipher;
pub mod digest;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, Algorithm, KeyDerivation, ...};
pub use cipher::{decrypt, encrypt, split_combined, Algorithm, Sealed};
pub use digest::{hexdigest, short_hexdigest};
pub use kdf::{bytes_to_key, Argon2Params, KeyDerivation};
pub use keys::{DerivedKey, KeyFn, KeySource, SecretKey};
