//! Attribute-level encryption with backward-compatible envelopes.
//!
//! ```no_run
//! use attrcrypt::{AttributeCodec, AttributeOptions, SecretKey, Value};
//!
//! let codec = AttributeCodec::new(AttributeOptions::default())?;
//! let key = SecretKey::from("a-long-random-secret");
//! let fields = codec.encode_fields(&Value::from("Fido the Dog"), &key)?;
//! assert_eq!(codec.decode_fields(&fields, &key)?, Value::from("Fido the Dog"));
//! # Ok::<(), attrcrypt::CodecError>(())
//! ```

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod errors;
pub mod marshal;

pub use crypto::{Algorithm, DerivedKey, KeyDerivation, KeyFn, KeySource, SecretKey};
pub use envelope::{
    AttributeCodec, AttributeOptions, EncodeParams, EncodedEnvelope, EnvelopeFields, Mode, Salt,
};
pub use errors::{CodecError, Result};
pub use marshal::{Value, ValueFormat};
