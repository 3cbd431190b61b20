//! Transport abstraction layer
//!
//! A named-topic pub/sub channel with a two-phase shutdown. The trait-based
//! design allows swapping the in-process channel adapter for a broker-backed
//! one without touching producers or consumers.

pub mod channel;
pub mod config;

use crate::error::TransportError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Pub/sub backend contract
///
/// - Payloads sent by one caller to one topic reach each subscriber in send order.
/// - A subscriber sees payloads sent after `subscribe` returned; there is no replay.
/// - `stop` is non-blocking and idempotent; `stopped` resolves once every
///   subscription handle is closed and in-flight sends have finished.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Enqueue one payload for delivery on `topic`
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Register interest in `topic`
    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError>;

    /// Stop accepting sends and subscriptions and begin draining
    fn stop(&self);

    /// Wait until the transport has released all of its resources
    async fn stopped(&self);
}

/// Subscription handle - a lazy sequence of raw payloads for one topic
///
/// Yields `None` once the transport closed the subscription. A closed
/// subscription cannot be reopened; subscribe again instead.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    topic: String,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Subscription {
    /// Wrap a receiving queue fed by a transport backend
    pub fn new(topic: impl Into<String>, rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            rx,
        }
    }

    /// Wait for the next payload; `None` once the subscription is closed
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Try to receive without blocking
    ///
    /// - `Ok(Some(payload))` - a payload was ready
    /// - `Ok(None)` - nothing buffered right now
    /// - `Err(TransportError::ChannelClosed)` - the subscription is closed
    pub fn try_next(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.rx.try_recv() {
            Ok(payload) => Ok(Some(payload)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportError::ChannelClosed),
        }
    }

    /// Close from the subscriber side; buffered payloads can still be read
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Stream for Subscription {
    type Item = Vec<u8>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
