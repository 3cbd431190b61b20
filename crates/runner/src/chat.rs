//! Chat session - wires a producer and a consumer to one coordinator
//!
//! Everything that can be rejected (the envelope, the producer budget, the
//! subscription) is settled before any loop is spawned, so a failed start
//! leaves no loop running. The consumer subscribes before the producer
//! starts, so nothing the producer sends can be missed. Both loops run under
//! the coordinator; the session ends when the shutdown signal fires.

use crate::config::RelayConfig;
use crate::consumer::{Consumer, ConsumerReport, handler_fn};
use crate::error::Result;
use crate::producer::{Producer, ProducerReport};
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};

/// Everything a finished session reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSummary {
    pub shutdown: ShutdownReport,
    /// `None` when the session did not produce
    pub producer: Option<ProducerReport>,
    /// `None` when the session did not consume
    pub consumer: Option<ConsumerReport>,
}

/// Run one chat session until the coordinator's signal fires
pub async fn run_chat(config: &RelayConfig, coordinator: ShutdownCoordinator) -> Result<ChatSummary> {
    let chat = &config.chat;
    let transport = coordinator.transport();
    let signal = coordinator.signal();

    log::info!(
        "[chat:{}] Session starting (role={:?}, {} -> {})",
        chat.topic,
        chat.role,
        chat.from,
        chat.to
    );

    let outgoing = if chat.role.produces() {
        Some((chat.envelope()?, config.producer.budget()?))
    } else {
        None
    };
    let subscribed = if chat.role.consumes() {
        Some(
            Consumer::new(transport.clone(), signal.clone())
                .subscribe(&chat.topic)
                .await?,
        )
    } else {
        None
    };

    let consumer = if let Some(subscribed) = subscribed {
        let topic = chat.topic.clone();
        Some(coordinator.spawn(subscribed.run(handler_fn(move |envelope| {
            log::info!(
                "[chat:{}] {} -> {}: {}",
                topic,
                envelope.from(),
                envelope.to(),
                envelope.content()
            );
            Ok(())
        }))))
    } else {
        None
    };

    let producer = if let Some((envelope, budget)) = outgoing {
        let producer = Producer::new(transport, signal)
            .with_retry_backoff(config.producer.retry_backoff());
        let topic = chat.topic.clone();
        Some(coordinator.spawn(async move {
            producer
                .run(&topic, std::iter::repeat(envelope), budget)
                .await
        }))
    } else {
        None
    };

    let shutdown = coordinator.run().await?;

    let producer = match producer {
        Some(handle) => Some(handle.await?),
        None => None,
    };
    let consumer = match consumer {
        Some(handle) => Some(handle.await?),
        None => None,
    };

    Ok(ChatSummary {
        shutdown,
        producer,
        consumer,
    })
}
