//! Relay Transport
//!
//! Transport layer for the Relay pub/sub client. Provides:
//! - The [`Transport`] trait: send, subscribe, stop, stopped
//! - [`Subscription`]: the read-only, closable payload sequence a subscriber reads
//! - [`ChannelTransport`]: in-process adapter over tokio channels
//!
//! ## Architecture
//!
//! ```text
//!   Producer                        Consumer
//!      │ send(topic, bytes)            ▲ Subscription (bytes)
//!      ▼                               │
//! ┌──────────────────────────────────────────┐
//! │            dyn Transport                  │
//! │  topic "x" ──► [sub-1 queue] [sub-2 queue]│
//! │  topic "y" ──► [sub-3 queue]              │
//! └──────────────────────────────────────────┘
//!      stop() ──► drain in-flight ──► stopped()
//! ```
//!
//! The channel adapter is the reference backend for tests and single-process
//! runs. Broker-backed adapters (NATS, Redis, Kafka) implement the same trait
//! and hand their deliveries to a [`Subscription`].

pub mod error;
pub mod transport;

// Re-export commonly used types
pub use error::TransportError;
pub use transport::{
    Subscription, Transport,
    channel::{ChannelTransport, TransportStats},
    config::{ChannelConfig, TransportConfig},
};
