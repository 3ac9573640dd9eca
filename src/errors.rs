use thiserror::Error;

/// All errors that can occur while encoding or decoding an attribute.
///
/// Messages never carry key material, salts, IVs or plaintext.
#[derive(Debug, Error)]
pub enum CodecError {
    // --- Key material errors ---
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Key resolution failed: {0}")]
    KeyResolution(String),

    // --- Cipher errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong key or corrupted data")]
    DecryptionFailed,

    // --- Structured value errors ---
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    // --- Envelope errors ---
    #[error("Envelope is missing its '{0}' field for this mode")]
    MissingAuxiliaryField(&'static str),

    #[error("Envelope carries a '{0}' field this mode does not use")]
    UnexpectedAuxiliaryField(&'static str),

    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for codec results.
pub type Result<T> = std::result::Result<T, CodecError>;
