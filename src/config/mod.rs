//! Declarative codec configuration.

pub mod settings;

pub use settings::{AttributeOverrides, KdfKind, Settings};
