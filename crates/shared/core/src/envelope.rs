//! Envelope - the unit of communication between chat participants

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Participant field '{0}' must not be empty")]
    EmptyParticipant(&'static str),
}

/// A message record travelling from one participant to another.
///
/// Fields are private: an envelope cannot be changed after construction,
/// only read or consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    from: String,
    to: String,
    content: String,
}

impl Envelope {
    /// Create a new envelope, rejecting empty sender or recipient
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, EnvelopeError> {
        let from = from.into();
        let to = to.into();

        if from.is_empty() {
            return Err(EnvelopeError::EmptyParticipant("from"));
        }
        if to.is_empty() {
            return Err(EnvelopeError::EmptyParticipant("to"));
        }

        Ok(Self {
            from,
            to,
            content: content.into(),
        })
    }

    /// Sending participant
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Intended recipient
    pub fn to(&self) -> &str {
        &self.to
    }

    /// Application payload
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume the envelope, returning `(from, to, content)`
    pub fn into_parts(self) -> (String, String, String) {
        (self.from, self.to, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_envelope() {
        let env = Envelope::new("A", "B", "hello").unwrap();
        assert_eq!(env.from(), "A");
        assert_eq!(env.to(), "B");
        assert_eq!(env.content(), "hello");
    }

    #[test]
    fn test_empty_participants_rejected() {
        assert_eq!(
            Envelope::new("", "B", "hi"),
            Err(EnvelopeError::EmptyParticipant("from"))
        );
        assert_eq!(
            Envelope::new("A", "", "hi"),
            Err(EnvelopeError::EmptyParticipant("to"))
        );
    }

    #[test]
    fn test_empty_content_allowed() {
        let env = Envelope::new("A", "B", "").unwrap();
        assert!(env.content().is_empty());
    }

    #[test]
    fn test_into_parts() {
        let env = Envelope::new("alice", "bob", "ping").unwrap();
        let (from, to, content) = env.into_parts();
        assert_eq!(
            (from.as_str(), to.as_str(), content.as_str()),
            ("alice", "bob", "ping")
        );
    }
}
