//! Transport configuration

use serde::{Deserialize, Serialize};

/// Channel adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Per-subscription buffer (bounded queue size)
    ///
    /// A full buffer makes `send` wait rather than drop the payload.
    #[serde(default = "default_channel_capacity")]
    pub capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: default_channel_capacity(),
        }
    }
}

/// Root transport configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl TransportConfig {
    /// Channel transport config with the given per-subscription capacity
    pub fn channel(capacity: usize) -> Self {
        Self {
            channel: ChannelConfig { capacity },
        }
    }
}
