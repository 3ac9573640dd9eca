//! Encode and decode entry points for one encrypted attribute.
//!
//! `AttributeCodec` holds the attribute's immutable options and ties the
//! key source, key derivation, cipher and structured-value layers
//! together. Each call is self-contained, so one codec can be shared
//! freely across threads.

use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use super::format::{EncodedEnvelope, EnvelopeFields, Mode, Salt};
use crate::crypto::cipher::{self, Algorithm};
use crate::crypto::kdf::{bytes_to_key, KeyDerivation};
use crate::crypto::keys::KeySource;
use crate::errors::{CodecError, Result};
use crate::marshal::{self, Value, ValueFormat};

/// Per-attribute configuration.
///
/// The defaults reproduce the historical configuration: per-attribute IV
/// and salt, AES-256-CBC, no marshalling, PBKDF2-HMAC-SHA1 × 2000.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeOptions {
    pub mode: Mode,
    pub algorithm: Algorithm,
    /// Serialize values with `marshal_format` before encryption.
    pub marshal: bool,
    /// Revision written by `encode`; `decode` accepts every revision.
    pub marshal_format: ValueFormat,
    pub key_derivation: KeyDerivation,
    /// Label whose digest becomes the salt when none is supplied.
    /// Without one, a random salt is generated per encode.
    pub salt_label: Option<String>,
}

/// Explicit IV and salt for a single encode. Unset values are generated.
#[derive(Debug, Clone, Default)]
pub struct EncodeParams {
    pub iv: Option<Vec<u8>>,
    pub salt: Option<Salt>,
}

/// Encoder/decoder for one attribute configuration.
#[derive(Debug, Clone)]
pub struct AttributeCodec {
    options: AttributeOptions,
}

impl AttributeCodec {
    /// Validate `options` and build a codec.
    ///
    /// Shared mode reuses one IV for every record, which is fatal for GCM's
    /// nonce, so that combination is refused.
    pub fn new(options: AttributeOptions) -> Result<Self> {
        if options.mode == Mode::SharedIvAndSalt && options.algorithm.is_aead() {
            return Err(CodecError::UnsupportedMode(format!(
                "{} cannot be used with {}",
                options.mode, options.algorithm
            )));
        }
        options.key_derivation.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &AttributeOptions {
        &self.options
    }

    /// Encrypt `value`, generating any IV and salt the mode needs.
    pub fn encode<K: KeySource + ?Sized>(&self, value: &Value, key: &K) -> Result<EncodedEnvelope> {
        self.encode_with(value, key, EncodeParams::default())
    }

    /// Encrypt `value` with an explicit IV and/or salt.
    ///
    /// With both supplied the output is fully deterministic.
    pub fn encode_with<K: KeySource + ?Sized>(
        &self,
        value: &Value,
        key: &K,
        params: EncodeParams,
    ) -> Result<EncodedEnvelope> {
        let algorithm = self.options.algorithm;
        let payload = self.payload(value)?;
        let secret = key.resolve()?;

        let envelope = match self.options.mode {
            Mode::PerAttributeIvAndSalt => {
                let salt = match params.salt {
                    Some(salt) => salt,
                    None => match &self.options.salt_label {
                        Some(label) => Salt::from_label(label),
                        None => Salt::random(),
                    },
                };
                let iv = match params.iv {
                    Some(iv) => iv,
                    None => {
                        let mut iv = vec![0u8; algorithm.iv_len()];
                        rand::rng().fill_bytes(&mut iv);
                        iv
                    }
                };

                let derived = self.options.key_derivation.derive(
                    secret.as_bytes(),
                    salt.as_bytes(),
                    algorithm.key_len(),
                )?;
                let sealed = cipher::encrypt(algorithm, &derived, &iv, &payload)?;
                EncodedEnvelope::PerAttribute {
                    ciphertext: sealed.into_combined(),
                    iv,
                    salt,
                }
            }
            Mode::SharedIvAndSalt => {
                if params.iv.is_some() {
                    return Err(CodecError::UnexpectedAuxiliaryField("iv"));
                }
                if params.salt.is_some() {
                    return Err(CodecError::UnexpectedAuxiliaryField("salt"));
                }
                let (derived, iv) =
                    bytes_to_key(secret.as_bytes(), algorithm.key_len(), algorithm.iv_len())?;
                let sealed = cipher::encrypt(algorithm, &derived, &iv, &payload)?;
                EncodedEnvelope::Shared {
                    ciphertext: sealed.into_combined(),
                }
            }
        };

        debug!(
            mode = %self.options.mode,
            algorithm = %algorithm,
            marshal = self.options.marshal,
            ciphertext_len = envelope.ciphertext().len(),
            "encoded attribute"
        );
        Ok(envelope)
    }

    /// Decrypt `envelope` back into the original value.
    pub fn decode<K: KeySource + ?Sized>(
        &self,
        envelope: &EncodedEnvelope,
        key: &K,
    ) -> Result<Value> {
        let algorithm = self.options.algorithm;

        let plaintext = match (self.options.mode, envelope) {
            (
                Mode::PerAttributeIvAndSalt,
                EncodedEnvelope::PerAttribute {
                    ciphertext,
                    iv,
                    salt,
                },
            ) => {
                let secret = key.resolve()?;
                let derived = self.options.key_derivation.derive(
                    secret.as_bytes(),
                    salt.as_bytes(),
                    algorithm.key_len(),
                )?;
                let (ciphertext, tag) = cipher::split_combined(algorithm, ciphertext)?;
                cipher::decrypt(algorithm, &derived, iv, ciphertext, tag)?
            }
            (Mode::SharedIvAndSalt, EncodedEnvelope::Shared { ciphertext }) => {
                let secret = key.resolve()?;
                let (derived, iv) =
                    bytes_to_key(secret.as_bytes(), algorithm.key_len(), algorithm.iv_len())?;
                let (ciphertext, tag) = cipher::split_combined(algorithm, ciphertext)?;
                cipher::decrypt(algorithm, &derived, &iv, ciphertext, tag)?
            }
            (Mode::PerAttributeIvAndSalt, EncodedEnvelope::Shared { .. }) => {
                return Err(CodecError::MissingAuxiliaryField("iv"));
            }
            (Mode::SharedIvAndSalt, EncodedEnvelope::PerAttribute { .. }) => {
                return Err(CodecError::UnexpectedAuxiliaryField("iv"));
            }
        };

        self.value_from(plaintext)
    }

    /// Encrypt `value` straight to stored text columns.
    pub fn encode_fields<K: KeySource + ?Sized>(
        &self,
        value: &Value,
        key: &K,
    ) -> Result<EnvelopeFields> {
        Ok(self.encode(value, key)?.to_fields())
    }

    /// Decrypt stored text columns.
    pub fn decode_fields<K: KeySource + ?Sized>(
        &self,
        fields: &EnvelopeFields,
        key: &K,
    ) -> Result<Value> {
        let envelope = EncodedEnvelope::from_fields(fields, self.options.mode)?;
        self.decode(&envelope, key)
    }

    fn payload(&self, value: &Value) -> Result<Zeroizing<Vec<u8>>> {
        let bytes = if self.options.marshal {
            marshal::serialize(value, self.options.marshal_format)?
        } else {
            value.to_plain_string().into_bytes()
        };
        Ok(Zeroizing::new(bytes))
    }

    fn value_from(&self, plaintext: Zeroizing<Vec<u8>>) -> Result<Value> {
        if self.options.marshal {
            let format = ValueFormat::detect(&plaintext);
            debug!(
                mode = %self.options.mode,
                revision = ?format,
                "decoding marshalled attribute"
            );
            return marshal::deserialize(&plaintext);
        }

        let text = std::str::from_utf8(&plaintext).map_err(|_| CodecError::DecryptionFailed)?;
        debug!(mode = %self.options.mode, "decoded attribute");
        Ok(Value::String(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::SecretKey;

    fn codec(options: AttributeOptions) -> AttributeCodec {
        AttributeCodec::new(options).unwrap()
    }

    #[test]
    fn codec_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AttributeCodec>();
    }

    #[test]
    fn shared_mode_with_gcm_is_refused() {
        let err = AttributeCodec::new(AttributeOptions {
            mode: Mode::SharedIvAndSalt,
            algorithm: Algorithm::Aes256Gcm,
            ..AttributeOptions::default()
        })
        .unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedMode(_)));
    }

    #[test]
    fn shared_mode_matches_openssl_keyivgen() {
        let codec = codec(AttributeOptions {
            mode: Mode::SharedIvAndSalt,
            ..AttributeOptions::default()
        });
        let key = SecretKey::from("shared-secret");
        let fields = codec.encode_fields(&Value::from("Fido the Dog"), &key).unwrap();
        assert_eq!(fields.ciphertext, "mOk6+JK4CGzNkA3eIv1fRQ==");
        assert!(fields.iv.is_none());
        assert!(fields.salt.is_none());
    }

    #[test]
    fn shared_mode_rejects_explicit_iv() {
        let codec = codec(AttributeOptions {
            mode: Mode::SharedIvAndSalt,
            ..AttributeOptions::default()
        });
        let params = EncodeParams {
            iv: Some(vec![0u8; 16]),
            salt: None,
        };
        let err = codec
            .encode_with(&Value::from("x"), &SecretKey::from("k"), params)
            .unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedAuxiliaryField("iv")));
    }

    #[test]
    fn salt_label_makes_salt_deterministic() {
        let codec = codec(AttributeOptions {
            salt_label: Some("pet-nickname".into()),
            ..AttributeOptions::default()
        });
        let key = SecretKey::from("k");
        let a = codec.encode_fields(&Value::from("Fido"), &key).unwrap();
        let b = codec.encode_fields(&Value::from("Fido"), &key).unwrap();
        assert_eq!(a.salt, b.salt);
        assert_eq!(a.salt.as_deref(), Some(Salt::from_label("pet-nickname").as_str()));
        // IVs are still random per encode.
        assert_ne!(a.iv, b.iv);
    }

    #[test]
    fn wrong_length_iv_fails_fast() {
        let params = EncodeParams {
            iv: Some(vec![0u8; 8]),
            salt: None,
        };
        let err = codec(AttributeOptions::default())
            .encode_with(&Value::from("x"), &SecretKey::from("k"), params)
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidKeyLength(_)));
    }

    #[test]
    fn non_marshalled_values_are_stored_as_text() {
        let codec = codec(AttributeOptions::default());
        let key = SecretKey::from("k");
        let date = chrono::NaiveDate::from_ymd_opt(2011, 7, 9).unwrap();
        let envelope = codec.encode(&Value::Date(date), &key).unwrap();
        assert_eq!(
            codec.decode(&envelope, &key).unwrap(),
            Value::from("2011-07-09")
        );
    }
}
