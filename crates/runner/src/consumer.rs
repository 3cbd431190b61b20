//! Consumer - decodes a topic's payloads and hands envelopes to a handler
//!
//! Subscribing and running are separate steps: `Consumer::subscribe` is where
//! a resource failure can surface, and once it returns, every payload sent
//! afterwards is visible to the loop. The loop itself never fails; bad
//! payloads and failing handlers are counted, logged, and skipped.
//!
//! ```text
//! Subscribed ──payload──► Decoding ──ok──► Handling ──► Subscribed
//!     │                      └──err (counted)──────────► Subscribed
//!     └──subscription end / shutdown──► Closed
//! ```

use crate::error::Result;
use crate::signal::ShutdownSignal;
use async_trait::async_trait;
use futures::FutureExt;
use relay_core::{Envelope, EnvelopeCodec, JsonCodec};
use relay_transport::{Subscription, Transport};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Application logic invoked once per decoded envelope
///
/// A returned error (or a panic) is logged and counted by the consumer; it
/// never ends the subscription.
#[async_trait]
pub trait EnvelopeHandler: Send {
    async fn handle(&mut self, envelope: Envelope) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> EnvelopeHandler for F
where
    F: FnMut(Envelope) -> anyhow::Result<()> + Send,
{
    async fn handle(&mut self, envelope: Envelope) -> anyhow::Result<()> {
        (self)(envelope)
    }
}

/// Pin a closure's signature so it can be passed as an [`EnvelopeHandler`]
/// without annotating its argument and return types
pub fn handler_fn<F>(f: F) -> F
where
    F: FnMut(Envelope) -> anyhow::Result<()> + Send,
{
    f
}

/// Consumer loop state, traced on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumerState {
    Subscribed,
    Decoding,
    Handling,
    Closed,
}

/// Why the consumer loop closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CloseReason {
    /// The transport closed the subscription
    #[default]
    SubscriptionEnded,
    /// The shutdown signal fired and nothing was left buffered
    Shutdown,
}

/// Outcome of a consumer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Envelopes the handler accepted
    pub handled: u64,
    /// Payloads that were not valid envelopes
    pub decode_failures: u64,
    /// Handler errors and panics
    pub handler_failures: u64,
    pub reason: CloseReason,
}

/// Factory for subscribed consumer loops
pub struct Consumer {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn EnvelopeCodec>,
    signal: ShutdownSignal,
}

impl Consumer {
    /// Create a consumer using the JSON codec
    pub fn new(transport: Arc<dyn Transport>, signal: ShutdownSignal) -> Self {
        Self {
            transport,
            codec: Arc::new(JsonCodec),
            signal,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Register on `topic`; fails only if the transport refuses the subscription
    pub async fn subscribe(&self, topic: &str) -> Result<SubscribedConsumer> {
        let subscription = self.transport.subscribe(topic).await?;
        log::info!(
            "[consumer:{}] Subscribed ({}, codec={})",
            topic,
            subscription.id(),
            self.codec.name()
        );

        Ok(SubscribedConsumer {
            subscription,
            codec: self.codec.clone(),
            signal: self.signal.clone(),
            state: ConsumerState::Subscribed,
        })
    }
}

/// A registered subscription waiting to be driven by [`SubscribedConsumer::run`]
pub struct SubscribedConsumer {
    subscription: Subscription,
    codec: Arc<dyn EnvelopeCodec>,
    signal: ShutdownSignal,
    state: ConsumerState,
}

impl SubscribedConsumer {
    pub fn topic(&self) -> &str {
        self.subscription.topic()
    }

    fn transition(&mut self, next: ConsumerState) {
        log::trace!(
            "[consumer:{}] {:?} -> {:?}",
            self.subscription.topic(),
            self.state,
            next
        );
        self.state = next;
    }

    /// Drive the subscription until it ends or shutdown fires
    ///
    /// Payloads already buffered when shutdown fires are still handled; the
    /// loop closes on the first empty poll after the signal.
    pub async fn run<H: EnvelopeHandler>(mut self, mut handler: H) -> ConsumerReport {
        let topic = self.subscription.topic().to_string();
        let mut report = ConsumerReport::default();

        report.reason = loop {
            self.transition(ConsumerState::Subscribed);

            let payload = tokio::select! {
                biased;
                next = self.subscription.next() => match next {
                    Some(payload) => payload,
                    None => break CloseReason::SubscriptionEnded,
                },
                _ = self.signal.fired() => break CloseReason::Shutdown,
            };

            self.transition(ConsumerState::Decoding);
            let envelope = match self.codec.decode(&payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    report.decode_failures += 1;
                    log::warn!(
                        "[consumer:{}] Dropping undecodable payload ({} bytes): {}",
                        topic,
                        payload.len(),
                        e
                    );
                    continue;
                }
            };

            self.transition(ConsumerState::Handling);
            match AssertUnwindSafe(handler.handle(envelope)).catch_unwind().await {
                Ok(Ok(())) => report.handled += 1,
                Ok(Err(e)) => {
                    report.handler_failures += 1;
                    log::warn!(
                        "[consumer:{}] Handler failed ({} bytes): {:#}",
                        topic,
                        payload.len(),
                        e
                    );
                }
                Err(panic) => {
                    report.handler_failures += 1;
                    log::error!(
                        "[consumer:{}] Handler panicked ({} bytes): {}",
                        topic,
                        payload.len(),
                        panic_message(panic.as_ref())
                    );
                }
            }
        };

        self.transition(ConsumerState::Closed);
        log::info!(
            "[consumer:{}] Closed ({:?}): handled={} decode_failures={} handler_failures={}",
            topic,
            report.reason,
            report.handled,
            report.decode_failures,
            report.handler_failures
        );

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
