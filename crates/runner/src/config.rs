//! Runner configuration
//!
//! One explicitly constructed [`RelayConfig`] is loaded at startup and passed
//! down; nothing reads configuration from global state.

use crate::error::{ConfigError, Result};
use crate::producer::ProducerBudget;
use crate::shutdown::ShutdownConfig;
use relay_core::{Envelope, Topics};
use relay_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which loops a chat session runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    Producer,
    Consumer,
    #[default]
    Both,
}

impl ChatRole {
    pub fn produces(&self) -> bool {
        matches!(self, ChatRole::Producer | ChatRole::Both)
    }

    pub fn consumes(&self) -> bool {
        matches!(self, ChatRole::Consumer | ChatRole::Both)
    }
}

/// Producer bounds and retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Maximum send attempts
    #[serde(default)]
    pub max_count: Option<u64>,
    /// Wall-clock budget for the run
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
    /// Pause after a failed send
    #[serde(default)]
    pub retry_backoff_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_count: Some(3),
            time_budget_ms: None,
            retry_backoff_ms: 0,
        }
    }
}

impl ProducerConfig {
    /// Convert to a run budget; fails if neither bound is set
    pub fn budget(&self) -> Result<ProducerBudget> {
        ProducerBudget::new(
            self.max_count,
            self.time_budget_ms.map(Duration::from_millis),
        )
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// The chat exchange to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub topic: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub role: ChatRole,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            topic: Topics::room("general"),
            from: "alice".to_string(),
            to: "bob".to_string(),
            content: "hello".to_string(),
            role: ChatRole::Both,
        }
    }
}

impl ChatConfig {
    /// The envelope a producer repeats
    pub fn envelope(&self) -> Result<Envelope> {
        Ok(Envelope::new(&self.from, &self.to, &self.content)?)
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl RelayConfig {
    /// Check everything that would otherwise fail after loops have started
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.transport.channel.capacity == 0 {
            return Err(ConfigError::Invalid(
                "transport.channel.capacity must be at least 1".to_string(),
            ));
        }
        if !Topics::is_valid(&self.chat.topic) {
            return Err(ConfigError::Invalid(format!(
                "chat.topic {:?} is not a valid topic name",
                self.chat.topic
            )));
        }
        if self.chat.from.is_empty() || self.chat.to.is_empty() {
            return Err(ConfigError::Invalid(
                "chat.from and chat.to must not be empty".to_string(),
            ));
        }
        if self.chat.role.produces()
            && self.producer.max_count.is_none()
            && self.producer.time_budget_ms.is_none()
        {
            return Err(ConfigError::Invalid(
                "producer needs max_count or time_budget_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> std::result::Result<RelayConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> std::result::Result<RelayConfig, ConfigError> {
    let config: RelayConfig = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> std::result::Result<RelayConfig, ConfigError> {
    let default_config = include_str!("relay_config.json");
    load_config_from_str(default_config)
}
