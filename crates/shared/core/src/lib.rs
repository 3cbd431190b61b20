//! Relay Core Domain
//!
//! Pure message types for the Relay pub/sub client.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! - [`Envelope`]: the from/to/content record exchanged between participants
//! - [`EnvelopeCodec`]: turns envelopes into transport payloads and back
//! - [`Topics`]: logical topic names used by producers and consumers

pub mod codec;
pub mod envelope;
pub mod topic;

// Re-export commonly used types at crate root
pub use codec::{DecodeError, EnvelopeCodec, JsonCodec};
pub use envelope::{Envelope, EnvelopeError};
pub use topic::Topics;
