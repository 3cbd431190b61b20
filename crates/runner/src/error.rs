//! Runner errors
//!
//! Only resource-acquisition failures surface here. Per-message failures
//! (send, decode, handle) are contained inside their loops and reported
//! through counters instead.

use relay_core::EnvelopeError;
use relay_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Producer needs a count bound or a time budget")]
    UnboundedProducer,

    #[error("Failed to register interrupt listener: {0}")]
    Signal(#[source] std::io::Error),

    #[error("Transport did not confirm stop within {0:?}")]
    StopTimeout(Duration),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
