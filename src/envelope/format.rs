//! The persisted shape of an encrypted attribute.
//!
//! An attribute is stored as up to three sibling text columns:
//!
//! ```text
//!   encrypted_<attr>       base64 ciphertext (|| tag for GCM)   always
//!   encrypted_<attr>_iv    base64 IV                            per-attribute mode
//!   encrypted_<attr>_salt  salt text (16 hex chars)             per-attribute mode
//! ```
//!
//! In memory the same data is an [`EncodedEnvelope`], whose variant is
//! the mode. Moving between the two validates that exactly the fields the
//! mode needs are present.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::digest::short_hexdigest;
use crate::errors::{CodecError, Result};

/// Characters in a generated or label-derived salt.
pub const SALT_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which auxiliary parameters are stored per attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Key and IV are both stretched from the resolved key; only the
    /// ciphertext is stored.
    #[serde(alias = "single_iv_and_salt")]
    SharedIvAndSalt,
    /// A fresh IV and salt are stored next to every ciphertext.
    #[default]
    PerAttributeIvAndSalt,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::SharedIvAndSalt => "shared_iv_and_salt",
            Mode::PerAttributeIvAndSalt => "per_attribute_iv_and_salt",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Salt
// ---------------------------------------------------------------------------

/// Salt text. Its UTF-8 bytes are what the key derivation consumes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Salt(String);

impl Salt {
    /// Use caller-supplied salt text as-is.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(CodecError::MissingAuxiliaryField("salt"));
        }
        Ok(Self(text))
    }

    /// The first 16 hex chars of SHA-256(`label`).
    ///
    /// Deterministic: two fields configured with the same label get the
    /// same salt, so labels must be unique per field.
    pub fn from_label(label: &str) -> Self {
        Self(short_hexdigest(label.as_bytes(), SALT_LEN))
    }

    /// 16 hex chars derived from fresh random bytes.
    pub fn random() -> Self {
        let mut seed = [0u8; 16];
        rand::rng().fill_bytes(&mut seed);
        Self(short_hexdigest(&seed, SALT_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt([{} chars])", self.0.len())
    }
}

// ---------------------------------------------------------------------------
// EncodedEnvelope
// ---------------------------------------------------------------------------

/// An encrypted attribute with everything needed to decrypt it, except the key.
///
/// Serializes with base64 byte fields and a `mode` tag, for hosts that
/// prefer one JSON column over three text columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EncodedEnvelope {
    #[serde(rename = "shared_iv_and_salt")]
    Shared {
        #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
        ciphertext: Vec<u8>,
    },
    #[serde(rename = "per_attribute_iv_and_salt")]
    PerAttribute {
        #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
        ciphertext: Vec<u8>,
        #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
        iv: Vec<u8>,
        salt: Salt,
    },
}

impl EncodedEnvelope {
    pub fn mode(&self) -> Mode {
        match self {
            EncodedEnvelope::Shared { .. } => Mode::SharedIvAndSalt,
            EncodedEnvelope::PerAttribute { .. } => Mode::PerAttributeIvAndSalt,
        }
    }

    /// Raw ciphertext bytes (with the tag appended for AEAD algorithms).
    pub fn ciphertext(&self) -> &[u8] {
        match self {
            EncodedEnvelope::Shared { ciphertext } => ciphertext,
            EncodedEnvelope::PerAttribute { ciphertext, .. } => ciphertext,
        }
    }

    /// Text columns for persistence.
    pub fn to_fields(&self) -> EnvelopeFields {
        match self {
            EncodedEnvelope::Shared { ciphertext } => EnvelopeFields {
                ciphertext: BASE64.encode(ciphertext),
                iv: None,
                salt: None,
            },
            EncodedEnvelope::PerAttribute {
                ciphertext,
                iv,
                salt,
            } => EnvelopeFields {
                ciphertext: BASE64.encode(ciphertext),
                iv: Some(BASE64.encode(iv)),
                salt: Some(salt.as_str().to_string()),
            },
        }
    }

    /// Rebuild an envelope from stored columns, expecting `mode`.
    ///
    /// Empty columns count as absent. Malformed base64 is reported as
    /// [`CodecError::DecryptionFailed`], the same as any other corruption.
    pub fn from_fields(fields: &EnvelopeFields, mode: Mode) -> Result<Self> {
        let iv = fields.iv.as_deref().filter(|s| !s.trim().is_empty());
        let salt = fields.salt.as_deref().filter(|s| !s.trim().is_empty());
        let ciphertext = decode_base64(&fields.ciphertext)?;

        match mode {
            Mode::SharedIvAndSalt => {
                if iv.is_some() {
                    return Err(CodecError::UnexpectedAuxiliaryField("iv"));
                }
                if salt.is_some() {
                    return Err(CodecError::UnexpectedAuxiliaryField("salt"));
                }
                Ok(EncodedEnvelope::Shared { ciphertext })
            }
            Mode::PerAttributeIvAndSalt => {
                let iv = iv.ok_or(CodecError::MissingAuxiliaryField("iv"))?;
                let salt = salt.ok_or(CodecError::MissingAuxiliaryField("salt"))?;
                Ok(EncodedEnvelope::PerAttribute {
                    ciphertext,
                    iv: decode_base64(iv)?,
                    salt: Salt::new(salt.trim())?,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EnvelopeFields / column naming
// ---------------------------------------------------------------------------

/// The stored text columns of one encrypted attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeFields {
    /// Base64 ciphertext.
    pub ciphertext: String,

    /// Base64 IV, per-attribute mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,

    /// Salt text, per-attribute mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

/// How encrypted column names are built from an attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub prefix: String,
    pub suffix: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            prefix: "encrypted_".to_string(),
            suffix: String::new(),
        }
    }
}

/// Column names of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeColumns {
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
}

impl ColumnNames {
    /// `nickname` → `encrypted_nickname`, `encrypted_nickname_iv`,
    /// `encrypted_nickname_salt` with the default prefix.
    pub fn for_attribute(&self, attribute: &str) -> AttributeColumns {
        let ciphertext = format!("{}{attribute}{}", self.prefix, self.suffix);
        AttributeColumns {
            iv: format!("{ciphertext}_iv"),
            salt: format!("{ciphertext}_salt"),
            ciphertext,
        }
    }
}

// ---------------------------------------------------------------------------
// Base64 helpers
// ---------------------------------------------------------------------------

/// Decode base64 that may be line-wrapped or carry a trailing newline,
/// as older writers produced.
fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|_| CodecError::DecryptionFailed)
}

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    decode_base64(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_attribute_fields() -> EnvelopeFields {
        EnvelopeFields {
            ciphertext: "E4lJTxFG/EfkfPg5MpnriQ==".into(),
            iv: Some("z4Q8deE4h7f6S8NNZcbPNg==".into()),
            salt: Some("adcd833001a873db".into()),
        }
    }

    #[test]
    fn fields_round_trip_through_envelope() {
        let fields = per_attribute_fields();
        let envelope = EncodedEnvelope::from_fields(&fields, Mode::PerAttributeIvAndSalt).unwrap();
        assert_eq!(envelope.mode(), Mode::PerAttributeIvAndSalt);
        assert_eq!(envelope.ciphertext().len(), 16);
        assert_eq!(envelope.to_fields(), fields);
    }

    #[test]
    fn line_wrapped_base64_is_accepted() {
        let fields = EnvelopeFields {
            ciphertext: "E4lJTxFG/EfkfPg5\nMpnriQ==\n".into(),
            iv: Some("z4Q8deE4h7f6S8NNZcbPNg==\n".into()),
            salt: Some("adcd833001a873db".into()),
        };
        let envelope = EncodedEnvelope::from_fields(&fields, Mode::PerAttributeIvAndSalt).unwrap();
        assert_eq!(envelope.to_fields(), per_attribute_fields());
    }

    #[test]
    fn per_attribute_mode_requires_iv_and_salt() {
        let mut fields = per_attribute_fields();
        fields.iv = None;
        assert!(matches!(
            EncodedEnvelope::from_fields(&fields, Mode::PerAttributeIvAndSalt),
            Err(CodecError::MissingAuxiliaryField("iv"))
        ));

        let mut fields = per_attribute_fields();
        fields.salt = Some(String::new());
        assert!(matches!(
            EncodedEnvelope::from_fields(&fields, Mode::PerAttributeIvAndSalt),
            Err(CodecError::MissingAuxiliaryField("salt"))
        ));
    }

    #[test]
    fn shared_mode_rejects_auxiliary_fields() {
        assert!(matches!(
            EncodedEnvelope::from_fields(&per_attribute_fields(), Mode::SharedIvAndSalt),
            Err(CodecError::UnexpectedAuxiliaryField("iv"))
        ));
    }

    #[test]
    fn invalid_base64_is_a_decryption_failure() {
        let mut fields = per_attribute_fields();
        fields.ciphertext = "not*base64".into();
        assert!(matches!(
            EncodedEnvelope::from_fields(&fields, Mode::PerAttributeIvAndSalt),
            Err(CodecError::DecryptionFailed)
        ));
    }

    #[test]
    fn envelope_json_carries_mode_tag() {
        let envelope =
            EncodedEnvelope::from_fields(&per_attribute_fields(), Mode::PerAttributeIvAndSalt)
                .unwrap();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["mode"], "per_attribute_iv_and_salt");
        assert_eq!(json["ciphertext"], "E4lJTxFG/EfkfPg5MpnriQ==");
        assert_eq!(json["salt"], "adcd833001a873db");

        let back: EncodedEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn salts_from_labels_are_stable_and_short() {
        let salt = Salt::from_label("my-really-really-secret-pet-nickname-salt");
        assert_eq!(salt.as_str(), "a54aca408eb86c54");
        assert_eq!(Salt::random().as_str().len(), SALT_LEN);
        assert_ne!(Salt::random(), Salt::random());
    }

    #[test]
    fn column_names_follow_prefix_and_suffix() {
        let columns = ColumnNames::default().for_attribute("nickname");
        assert_eq!(columns.ciphertext, "encrypted_nickname");
        assert_eq!(columns.iv, "encrypted_nickname_iv");
        assert_eq!(columns.salt, "encrypted_nickname_salt");

        let naming = ColumnNames {
            prefix: "secret_".into(),
            suffix: "_enc".into(),
        };
        assert_eq!(naming.for_attribute("ssn").iv, "secret_ssn_enc_iv");
    }
}
