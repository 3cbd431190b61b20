//! Tokio channel-based transport for single-process mode
//!
//! Each subscription owns a bounded mpsc queue; a send fans the payload out to
//! every live queue registered for the topic. Queues are bounded, so a slow
//! subscriber applies backpressure instead of losing payloads.
//!
//! `stop()` lets deliveries already under way finish, except a send parked on
//! a full queue: that one returns `TransportError::Stopped`, so a subscriber
//! that stopped reading cannot hold the transport open.

use crate::error::TransportError;
use crate::transport::config::ChannelConfig;
use crate::transport::{Subscription, Transport};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Snapshot of transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Successful `send` calls
    pub sent: u64,
    /// Payload copies handed to subscription queues
    pub delivered: u64,
    /// Currently registered subscriptions
    pub subscriptions: usize,
}

/// Sending side of one subscription
struct TopicSubscriber {
    id: Uuid,
    tx: mpsc::Sender<Vec<u8>>,
}

/// In-process pub/sub transport
pub struct ChannelTransport {
    config: ChannelConfig,
    /// Live subscriptions by topic
    topics: DashMap<String, Vec<TopicSubscriber>>,
    /// Set once by `stop()`
    stopping: AtomicBool,
    /// Mirrors `stopping` for sends parked on a full queue
    stop_requested: watch::Sender<bool>,
    /// Sends and subscribes currently inside the transport
    in_flight: AtomicUsize,
    /// Latched to `true` when draining is complete
    stopped_tx: watch::Sender<bool>,
    sent: AtomicU64,
    delivered: AtomicU64,
}

/// Marks an operation as in flight; the last one out after `stop()` finishes draining
struct InFlight<'a> {
    transport: &'a ChannelTransport,
}

impl<'a> InFlight<'a> {
    fn enter(transport: &'a ChannelTransport) -> Self {
        transport.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { transport }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let remaining = self.transport.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.transport.stopping.load(Ordering::SeqCst) {
            self.transport.finish();
        }
    }
}

impl ChannelTransport {
    /// Create a transport with the given configuration
    pub fn new(config: ChannelConfig) -> Self {
        let (stopped_tx, _) = watch::channel(false);
        let (stop_requested, _) = watch::channel(false);
        Self {
            config,
            topics: DashMap::new(),
            stopping: AtomicBool::new(false),
            stop_requested,
            in_flight: AtomicUsize::new(0),
            stopped_tx,
            sent: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
        }
    }

    /// Create a transport with a custom per-subscription capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(ChannelConfig { capacity })
    }

    /// Per-subscription capacity
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Whether `stop()` has been called
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Whether draining has completed
    pub fn is_stopped(&self) -> bool {
        *self.stopped_tx.borrow()
    }

    /// Number of live subscriptions on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|subs| subs.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            sent: self.sent.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            subscriptions: self.topics.iter().map(|entry| entry.value().len()).sum(),
        }
    }

    fn check_accepting(&self, topic: &str) -> Result<(), TransportError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(TransportError::Stopped);
        }
        if topic.is_empty() || topic.chars().any(char::is_whitespace) {
            return Err(TransportError::InvalidTopic(topic.to_string()));
        }
        Ok(())
    }

    /// Drop every subscription sender so handles close, then latch `stopped`
    fn finish(&self) {
        self.topics.clear();
        let fired = self.stopped_tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
        if fired {
            log::info!("[transport] Stopped, all subscriptions released");
        }
    }

    async fn stop_requested(&self) {
        let mut rx = self.stop_requested.subscribe();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    fn prune(&self, topic: &str, dead: &[Uuid]) {
        if let Some(mut subs) = self.topics.get_mut(topic) {
            subs.retain(|s| !dead.contains(&s.id));
        }
        self.topics.remove_if(topic, |_, subs| subs.is_empty());
        log::debug!("[transport] Pruned {} closed subscription(s) on {}", dead.len(), topic);
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let _guard = InFlight::enter(self);
        self.check_accepting(topic)?;

        // Clone senders out so no map lock is held across an await
        let targets: Vec<(Uuid, mpsc::Sender<Vec<u8>>)> = match self.topics.get(topic) {
            Some(subs) => subs.iter().map(|s| (s.id, s.tx.clone())).collect(),
            None => Vec::new(),
        };

        if targets.is_empty() {
            log::trace!("[transport] No subscribers on {}", topic);
        }

        // A send waiting on a full queue gives up once stop is requested
        let mut dead = Vec::new();
        for (id, tx) in targets {
            tokio::select! {
                biased;
                result = tx.send(payload.clone()) => match result {
                    Ok(()) => {
                        self.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => dead.push(id),
                },
                _ = self.stop_requested() => {
                    log::debug!("[transport] Send on {} abandoned, transport stopping", topic);
                    return Err(TransportError::Stopped);
                }
            }
        }

        if !dead.is_empty() {
            self.prune(topic, &dead);
        }

        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        let _guard = InFlight::enter(self);
        self.check_accepting(topic)?;

        let (tx, rx) = mpsc::channel(self.config.capacity.max(1));
        let subscription = Subscription::new(topic, rx);

        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(TopicSubscriber {
                id: subscription.id(),
                tx,
            });

        log::debug!(
            "[transport] Subscription {} registered on {}",
            subscription.id(),
            topic
        );
        Ok(subscription)
    }

    fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("[transport] Stop requested, draining");
        self.stop_requested.send_replace(true);

        if self.in_flight.load(Ordering::SeqCst) == 0 {
            self.finish();
        }
    }

    async fn stopped(&self) {
        let mut rx = self.stopped_tx.subscribe();
        // The sender lives as long as `self`, so this only ends on `true`
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
