//! Envelope format and the encode/decode entry points.
//!
//! - `format`: the persisted envelope, its modes and column layout.
//! - `codec`: `AttributeCodec`, which turns values into envelopes and back.

pub mod codec;
pub mod format;

pub use codec::{AttributeCodec, AttributeOptions, EncodeParams};
pub use format::{AttributeColumns, ColumnNames, EncodedEnvelope, EnvelopeFields, Mode, Salt};
