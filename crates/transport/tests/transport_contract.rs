//! Integration test: ChannelTransport through the `dyn Transport` boundary
//!
//! Exercises the contract the runner relies on:
//! fan-out, per-sender ordering across concurrent senders, and stop/stopped.

use relay_transport::{ChannelTransport, Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn transport(capacity: usize) -> Arc<dyn Transport> {
    Arc::new(ChannelTransport::with_capacity(capacity))
}

/// Two concurrent senders on one topic: each sender's payloads stay in order
#[tokio::test]
async fn test_per_sender_order_with_concurrent_senders() {
    let _ = env_logger::try_init();
    let transport = transport(8);
    let mut sub = transport.subscribe("room").await.unwrap();

    let mut senders = Vec::new();
    for sender_id in [b'a', b'b'] {
        let transport = transport.clone();
        senders.push(tokio::spawn(async move {
            for seq in 0..50u8 {
                transport.send("room", vec![sender_id, seq]).await.unwrap();
            }
        }));
    }

    let mut from_a = Vec::new();
    let mut from_b = Vec::new();
    for _ in 0..100 {
        let payload = timeout(Duration::from_secs(1), sub.next())
            .await
            .expect("timeout")
            .expect("payload");
        match payload[0] {
            b'a' => from_a.push(payload[1]),
            _ => from_b.push(payload[1]),
        }
    }

    for handle in senders {
        handle.await.unwrap();
    }

    let expected: Vec<u8> = (0..50).collect();
    assert_eq!(from_a, expected);
    assert_eq!(from_b, expected);
}

/// Stop closes every subscription and rejects new work
#[tokio::test]
async fn test_stop_lifecycle_through_trait_object() {
    let _ = env_logger::try_init();
    let transport = transport(8);
    let mut sub_x = transport.subscribe("x").await.unwrap();
    let mut sub_y = transport.subscribe("y").await.unwrap();

    transport.stop();
    transport.stop();

    timeout(Duration::from_secs(1), transport.stopped())
        .await
        .expect("stopped should fire");

    assert_eq!(sub_x.next().await, None);
    assert_eq!(sub_y.next().await, None);
    assert_eq!(
        transport.send("x", b"late".to_vec()).await,
        Err(TransportError::Stopped)
    );
}

/// Many waiters on `stopped` all observe the single completion
#[tokio::test]
async fn test_stopped_wakes_every_waiter() {
    let _ = env_logger::try_init();
    let transport = transport(8);

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let transport = transport.clone();
            tokio::spawn(async move { transport.stopped().await })
        })
        .collect();

    tokio::task::yield_now().await;
    transport.stop();

    for waiter in waiters {
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
