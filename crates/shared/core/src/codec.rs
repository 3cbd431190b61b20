//! Envelope codec - converts envelopes to and from transport payloads
//!
//! The transport only moves bytes. A codec is the single place where an
//! [`Envelope`] becomes a payload and where a payload is checked before it
//! becomes an envelope again.

use crate::envelope::Envelope;
use serde_json::json;
use thiserror::Error;

/// Payload could not be turned back into an envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not a serialized envelope (bad structure, missing field, wrong type)
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// Structurally valid but a participant field is empty
    #[error("Envelope field '{0}' is empty")]
    EmptyField(&'static str),
}

/// Wire format for envelopes
///
/// Encoding is total and deterministic; decoding validates everything the
/// envelope constructor would.
pub trait EnvelopeCodec: Send + Sync {
    /// Serialize an envelope into a transport payload
    fn encode(&self, envelope: &Envelope) -> Vec<u8>;

    /// Deserialize a transport payload
    fn decode(&self, payload: &[u8]) -> Result<Envelope, DecodeError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// JSON object codec: `{"content": ..., "from": ..., "to": ...}`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EnvelopeCodec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Vec<u8> {
        // serde_json::Value objects are key-sorted, so output is stable
        json!({
            "from": envelope.from(),
            "to": envelope.to(),
            "content": envelope.content(),
        })
        .to_string()
        .into_bytes()
    }

    fn decode(&self, payload: &[u8]) -> Result<Envelope, DecodeError> {
        let decoded: Envelope = serde_json::from_slice(payload)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        if decoded.from().is_empty() {
            return Err(DecodeError::EmptyField("from"));
        }
        if decoded.to().is_empty() {
            return Err(DecodeError::EmptyField("to"));
        }

        Ok(decoded)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
