//! Error types for the transport crate

use thiserror::Error;

/// Transport-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// `stop()` was called; no new sends or subscriptions are accepted
    #[error("Transport stopped")]
    Stopped,

    #[error("Invalid topic name: {0:?}")]
    InvalidTopic(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Timeout waiting for transport")]
    Timeout,
}

impl TransportError {
    /// Whether retrying the same operation later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Send(_) | TransportError::Subscribe(_) | TransportError::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Send("busy".to_string()).is_transient());
        assert!(TransportError::Timeout.is_transient());
        assert!(!TransportError::Stopped.is_transient());
        assert!(!TransportError::InvalidTopic(String::new()).is_transient());
    }
}
