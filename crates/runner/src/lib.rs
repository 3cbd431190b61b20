//! Relay Runner - producer/consumer loops under one shutdown coordinator
//!
//! - **Producer**: sends envelopes to a topic within a count or time budget
//! - **Consumer**: decodes a topic's payloads and invokes a handler per envelope
//! - **Shutdown Coordinator**: turns an interrupt into an ordered teardown
//! - **Chat**: a producer and a consumer wired to one session
//!
//! ## Architecture
//!
//! ```text
//!   Ctrl-C / trigger()
//!          │
//!          ▼
//! ┌─────────────────────┐   signal   ┌──────────────┐   ┌──────────────┐
//! │ ShutdownCoordinator │──────────► │   Producer   │   │   Consumer   │
//! └──────────┬──────────┘            └──────┬───────┘   └──────▲───────┘
//!            │ stop / stopped               │ send             │ subscribe
//!            ▼                              ▼                  │
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │                     dyn Transport (topics)                    │
//!   └───────────────────────────────────────────────────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod consumer;
pub mod error;
pub mod producer;
pub mod shutdown;
pub mod signal;

// Re-export main types
pub use chat::{ChatSummary, run_chat};
pub use config::{
    ChatConfig, ChatRole, ProducerConfig, RelayConfig, load_config, load_config_from_str,
    load_default_config,
};
pub use consumer::{
    CloseReason, Consumer, ConsumerReport, EnvelopeHandler, SubscribedConsumer, handler_fn,
};
pub use error::{ConfigError, Result, RunnerError};
pub use producer::{Producer, ProducerBudget, ProducerReport, ProducerStop};
pub use shutdown::{ShutdownConfig, ShutdownCoordinator, ShutdownReport};
pub use signal::{ShutdownSignal, ShutdownTrigger};

// Re-export the envelope model for handler implementations
pub use relay_core::Envelope;
