//! Structured value (de)serialization applied around encryption.
//!
//! Two revisions exist:
//! - `Tagged`: the canonical JSON format written by default (`tagged`).
//! - `RubyMarshal`: Marshal 4.8, which older records use (`ruby`).
//!
//! The revision is never stored next to a record. On decode it is
//! recognised from the first bytes of the decrypted payload.

pub mod ruby;
pub mod tagged;
pub mod value;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{CodecError, Result};

pub use value::Value;

/// Serialization revision of a marshalled payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    #[default]
    Tagged,
    RubyMarshal,
}

impl ValueFormat {
    /// Recognise the revision a payload was written with.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&ruby::HEADER) {
            Some(ValueFormat::RubyMarshal)
        } else if bytes.first() == Some(&b'{') {
            Some(ValueFormat::Tagged)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueFormat::Tagged => "tagged",
            ValueFormat::RubyMarshal => "ruby_marshal",
        }
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serialize `value` in the given revision.
pub fn serialize(value: &Value, format: ValueFormat) -> Result<Vec<u8>> {
    match format {
        ValueFormat::Tagged => tagged::to_bytes(value),
        ValueFormat::RubyMarshal => ruby::dump(value),
    }
}

/// Deserialize a payload of either revision.
pub fn deserialize(bytes: &[u8]) -> Result<Value> {
    let format = ValueFormat::detect(bytes).ok_or_else(|| {
        CodecError::DeserializationFailed("payload is not a recognised serialized value".into())
    })?;
    deserialize_as(bytes, format)
}

/// Deserialize a payload known to be in `format`.
pub fn deserialize_as(bytes: &[u8], format: ValueFormat) -> Result<Value> {
    match format {
        ValueFormat::Tagged => tagged::from_bytes(bytes),
        ValueFormat::RubyMarshal => ruby::load(bytes),
    }
}
