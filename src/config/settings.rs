use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::cipher::Algorithm;
use crate::crypto::kdf::{Argon2Params, KeyDerivation, DEFAULT_PBKDF2_ITERATIONS};
use crate::envelope::{AttributeCodec, AttributeOptions, ColumnNames, Mode};
use crate::errors::{CodecError, Result};
use crate::marshal::ValueFormat;

/// Key derivation function selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KdfKind {
    #[default]
    #[serde(rename = "pbkdf2-hmac-sha1")]
    Pbkdf2HmacSha1,
    #[serde(rename = "argon2id")]
    Argon2id,
}

/// Options that differ for a single attribute. Unset fields inherit
/// the top-level value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOverrides {
    #[serde(default)]
    pub algorithm: Option<Algorithm>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub marshal: Option<bool>,
    #[serde(default)]
    pub marshal_format: Option<ValueFormat>,
    #[serde(default)]
    pub salt_label: Option<String>,
}

/// Codec configuration, usually loaded from `.attrcrypt.toml`.
///
/// Every field has a default equal to the historical configuration so
/// existing records decode without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Cipher for every attribute (default: aes-256-cbc).
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Where IVs and salts live (default: per_attribute_iv_and_salt).
    #[serde(default)]
    pub mode: Mode,

    /// Serialize structured values before encryption (default: false).
    #[serde(default)]
    pub marshal: bool,

    /// Revision new marshalled values are written in (default: tagged).
    #[serde(default)]
    pub marshal_format: ValueFormat,

    /// Per-attribute key derivation (default: pbkdf2-hmac-sha1).
    #[serde(default)]
    pub kdf: KdfKind,

    /// PBKDF2 iteration count (default: 2000).
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Prefix of encrypted column names (default: "encrypted_").
    #[serde(default = "default_column_prefix")]
    pub column_prefix: String,

    /// Suffix of encrypted column names (default: none).
    #[serde(default)]
    pub column_suffix: String,

    /// Per-attribute overrides, keyed by attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeOverrides>,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_pbkdf2_iterations() -> u32 {
    DEFAULT_PBKDF2_ITERATIONS
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_column_prefix() -> String {
    "encrypted_".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            mode: Mode::default(),
            marshal: false,
            marshal_format: ValueFormat::default(),
            kdf: KdfKind::default(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            column_prefix: default_column_prefix(),
            column_suffix: String::new(),
            attributes: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Name of the config file looked up by `load`.
    const FILE_NAME: &'static str = ".attrcrypt.toml";

    /// Parse settings from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| CodecError::ConfigError(format!("Failed to parse settings: {e}")))
    }

    /// Load settings from `<dir>/.attrcrypt.toml`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        toml::from_str(&contents).map_err(|e| {
            CodecError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Convert the KDF settings into crypto-layer params.
    pub fn key_derivation(&self) -> KeyDerivation {
        match self.kdf {
            KdfKind::Pbkdf2HmacSha1 => KeyDerivation::Pbkdf2HmacSha1 {
                iterations: self.pbkdf2_iterations,
            },
            KdfKind::Argon2id => KeyDerivation::Argon2id(Argon2Params {
                memory_kib: self.argon2_memory_kib,
                iterations: self.argon2_iterations,
                parallelism: self.argon2_parallelism,
            }),
        }
    }

    /// Options for `attribute`, with its overrides applied.
    pub fn options_for(&self, attribute: &str) -> AttributeOptions {
        let overrides = self.attributes.get(attribute).cloned().unwrap_or_default();
        AttributeOptions {
            mode: overrides.mode.unwrap_or(self.mode),
            algorithm: overrides.algorithm.unwrap_or(self.algorithm),
            marshal: overrides.marshal.unwrap_or(self.marshal),
            marshal_format: overrides.marshal_format.unwrap_or(self.marshal_format),
            key_derivation: self.key_derivation(),
            salt_label: overrides.salt_label,
        }
    }

    /// A validated codec for `attribute`.
    pub fn codec_for(&self, attribute: &str) -> Result<AttributeCodec> {
        AttributeCodec::new(self.options_for(attribute))
    }

    pub fn column_names(&self) -> ColumnNames {
        ColumnNames {
            prefix: self.column_prefix.clone(),
            suffix: self.column_suffix.clone(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_match_historical_configuration() {
        let s = Settings::default();
        assert_eq!(s.algorithm, Algorithm::Aes256Cbc);
        assert_eq!(s.mode, Mode::PerAttributeIvAndSalt);
        assert!(!s.marshal);
        assert_eq!(s.kdf, KdfKind::Pbkdf2HmacSha1);
        assert_eq!(s.pbkdf2_iterations, 2000);
        assert_eq!(s.column_prefix, "encrypted_");
        assert_eq!(s.options_for("anything"), AttributeOptions::default());
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.pbkdf2_iterations, 2000);
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
algorithm = "aes-256-gcm"
marshal = true
marshal_format = "ruby_marshal"
kdf = "argon2id"
argon2_memory_kib = 131072
argon2_iterations = 5
argon2_parallelism = 8
column_prefix = "secret_"
"#;
        fs::write(tmp.path().join(".attrcrypt.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.algorithm, Algorithm::Aes256Gcm);
        assert!(settings.marshal);
        assert_eq!(settings.marshal_format, ValueFormat::RubyMarshal);
        assert_eq!(
            settings.key_derivation(),
            KeyDerivation::Argon2id(Argon2Params {
                memory_kib: 131_072,
                iterations: 5,
                parallelism: 8,
            })
        );
        assert_eq!(settings.column_names().for_attribute("ssn").ciphertext, "secret_ssn");
    }

    #[test]
    fn legacy_mode_name_is_accepted() {
        let settings = Settings::from_toml("mode = \"single_iv_and_salt\"\n").unwrap();
        assert_eq!(settings.mode, Mode::SharedIvAndSalt);
    }

    #[test]
    fn attribute_overrides_inherit_unset_fields() {
        let config = r#"
marshal = true

[attributes.nickname]
marshal = false
salt_label = "pet-nickname"

[attributes.birthdate]
marshal_format = "ruby_marshal"
"#;
        let settings = Settings::from_toml(config).unwrap();

        let nickname = settings.options_for("nickname");
        assert!(!nickname.marshal);
        assert_eq!(nickname.salt_label.as_deref(), Some("pet-nickname"));

        let birthdate = settings.options_for("birthdate");
        assert!(birthdate.marshal);
        assert_eq!(birthdate.marshal_format, ValueFormat::RubyMarshal);
    }

    #[test]
    fn codec_for_rejects_invalid_combinations() {
        let config = "mode = \"shared_iv_and_salt\"\nalgorithm = \"aes-256-gcm\"\n";
        let settings = Settings::from_toml(config).unwrap();
        assert!(matches!(
            settings.codec_for("nickname"),
            Err(CodecError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".attrcrypt.toml"), "not valid {{toml").unwrap();

        let result = Settings::load(tmp.path());
        assert!(matches!(result, Err(CodecError::ConfigError(_))));
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        assert!(Settings::from_toml("algorithm = \"rot13\"\n").is_err());
    }
}
