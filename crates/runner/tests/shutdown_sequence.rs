//! Shutdown Sequence Integration Test
//!
//! Tests the coordinator's teardown order end to end:
//! - Loops drain before the transport is stopped
//! - The transport stop is confirmed before `run` returns
//! - Repeated triggers tear down once
//! - A transport that never confirms its stop hits the configured bound
//! - A loop stuck on backpressure does not keep the transport from stopping
//! - A session that fails to start leaves nothing running
//! - A full chat session ends on interrupt

use async_trait::async_trait;
use relay_runner::{
    CloseReason, Consumer, Envelope, Producer, ProducerBudget, ProducerStop, RelayConfig,
    RunnerError, ShutdownConfig, ShutdownCoordinator, ShutdownTrigger, handler_fn, run_chat,
};
use relay_transport::{ChannelTransport, Subscription, Transport, TransportError};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Channel transport that appends lifecycle calls to a shared event log
struct RecordingTransport {
    inner: ChannelTransport,
    events: Arc<Mutex<Vec<String>>>,
    stops: AtomicUsize,
}

impl RecordingTransport {
    fn new(events: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            inner: ChannelTransport::with_capacity(64),
            events,
            stops: AtomicUsize::new(0),
        }
    }

    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.inner.send(topic, payload).await
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        self.inner.subscribe(topic).await
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.record("stop");
        self.inner.stop();
    }

    async fn stopped(&self) {
        self.inner.stopped().await;
        self.record("stopped");
    }
}

/// Transport that accepts a stop request but never confirms it
struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), TransportError> {
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        Err(TransportError::Subscribe(topic.to_string()))
    }

    fn stop(&self) {}

    async fn stopped(&self) {
        std::future::pending::<()>().await
    }
}

fn interrupt() -> (oneshot::Sender<()>, impl Future<Output = ()> + Send + 'static) {
    let (tx, rx) = oneshot::channel::<()>();
    (tx, async move {
        let _ = rx.await;
    })
}

/// Consumer started, 5 envelopes sent, then interrupt: every envelope is
/// handled before stop, and `run` returns only after the stop is confirmed
#[tokio::test]
async fn test_interrupt_drains_then_stops_then_confirms() {
    let _ = env_logger::try_init();
    let events = Arc::new(Mutex::new(Vec::new()));
    let transport = Arc::new(RecordingTransport::new(events.clone()));
    let (interrupt_tx, interrupt) = interrupt();
    let coordinator =
        ShutdownCoordinator::with_interrupt(transport.clone(), ShutdownConfig::default(), interrupt);

    let subscribed = Consumer::new(transport.clone(), coordinator.signal())
        .subscribe("x")
        .await
        .unwrap();
    let consumer = coordinator.spawn(subscribed.run(handler_fn({
        let events = events.clone();
        move |envelope| {
            events
                .lock()
                .unwrap()
                .push(format!("handled {}", envelope.content()));
            Ok(())
        }
    })));

    let source: Vec<Envelope> = (0..5)
        .map(|i| Envelope::new("A", "B", i.to_string()).unwrap())
        .collect();
    let sent = Producer::new(transport.clone(), coordinator.signal())
        .run("x", source, ProducerBudget::count(5))
        .await;
    assert_eq!(sent.sent, 5);

    interrupt_tx.send(()).unwrap();
    let report = timeout(Duration::from_secs(1), coordinator.run())
        .await
        .expect("coordinator should return")
        .unwrap();

    assert_eq!(report.trigger, ShutdownTrigger::Interrupt);
    assert_eq!(report.drained_tasks, 1);

    let consumer = consumer.await.unwrap();
    assert_eq!(consumer.handled, 5);
    assert_eq!(consumer.reason, CloseReason::Shutdown);

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            "handled 0",
            "handled 1",
            "handled 2",
            "handled 3",
            "handled 4",
            "stop",
            "stopped"
        ]
    );
}

/// Triggering repeatedly, from code and from the interrupt, tears down once
#[tokio::test]
async fn test_repeated_triggers_tear_down_once() {
    let _ = env_logger::try_init();
    let events = Arc::new(Mutex::new(Vec::new()));
    let transport = Arc::new(RecordingTransport::new(events.clone()));
    let (interrupt_tx, interrupt) = interrupt();
    let coordinator =
        ShutdownCoordinator::with_interrupt(transport.clone(), ShutdownConfig::default(), interrupt);

    assert!(coordinator.trigger());
    assert!(!coordinator.trigger());
    let _ = interrupt_tx.send(());

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.trigger, ShutdownTrigger::Programmatic);
    assert_eq!(transport.stops.load(Ordering::SeqCst), 1);
    assert_eq!(*events.lock().unwrap(), vec!["stop", "stopped"]);
}

/// A producer running on a long time budget ends promptly on interrupt
#[tokio::test]
async fn test_interrupt_ends_long_running_producer() {
    let _ = env_logger::try_init();
    let transport: Arc<dyn Transport> = Arc::new(ChannelTransport::default());
    let (interrupt_tx, interrupt) = interrupt();
    let coordinator =
        ShutdownCoordinator::with_interrupt(transport.clone(), ShutdownConfig::default(), interrupt);

    let subscribed = Consumer::new(transport.clone(), coordinator.signal())
        .subscribe("x")
        .await
        .unwrap();
    let consumer = coordinator.spawn(subscribed.run(handler_fn(|_envelope| Ok(()))));

    let producer = Producer::new(transport.clone(), coordinator.signal());
    let producer = coordinator.spawn(async move {
        producer
            .run(
                "x",
                std::iter::repeat(Envelope::new("A", "B", "tick").unwrap()),
                ProducerBudget::duration(Duration::from_secs(60)),
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    interrupt_tx.send(()).unwrap();

    let report = timeout(Duration::from_secs(5), coordinator.run())
        .await
        .expect("coordinator should return")
        .unwrap();
    assert_eq!(report.drained_tasks, 2);

    let producer = producer.await.unwrap();
    assert_eq!(producer.stop, ProducerStop::Shutdown);
    assert!(producer.sent > 0);

    let consumer = consumer.await.unwrap();
    assert!(consumer.handled > 0);
    assert!(consumer.handled <= producer.sent);
}

/// A stop that is never confirmed surfaces as a timeout when bounded
#[tokio::test]
async fn test_unconfirmed_stop_hits_bound() {
    let _ = env_logger::try_init();
    let coordinator = ShutdownCoordinator::with_interrupt(
        Arc::new(HangingTransport),
        ShutdownConfig::bounded(Duration::from_millis(50)),
        std::future::pending::<()>(),
    );
    coordinator.trigger();

    let result = timeout(Duration::from_secs(1), coordinator.run())
        .await
        .expect("bounded stop should not hang");
    assert!(matches!(result, Err(RunnerError::StopTimeout(_))));
}

/// A producer parked on the full queue of a subscriber that never reads
/// cannot drain; the bound expires, the transport is stopped anyway, and the
/// stop releases the producer
#[tokio::test]
async fn test_backpressured_producer_cannot_block_stop() {
    let _ = env_logger::try_init();
    let transport = Arc::new(ChannelTransport::with_capacity(1));
    let coordinator = ShutdownCoordinator::with_interrupt(
        transport.clone(),
        ShutdownConfig::bounded(Duration::from_millis(100)),
        std::future::pending::<()>(),
    );

    // Subscribed, never read
    let _idle = transport.subscribe("x").await.unwrap();

    let producer = Producer::new(transport.clone(), coordinator.signal());
    let producer = coordinator.spawn(async move {
        producer
            .run(
                "x",
                std::iter::repeat(Envelope::new("A", "B", "flood").unwrap()),
                ProducerBudget::count(10),
            )
            .await
    });

    // First payload fills the queue, the second one parks the producer
    timeout(Duration::from_secs(1), async {
        while transport.stats().sent == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("producer should start sending");

    coordinator.trigger();
    let report = timeout(Duration::from_secs(2), coordinator.run())
        .await
        .expect("coordinator should return")
        .unwrap();

    assert_eq!(report.drained_tasks, 1);
    assert_eq!(report.undrained_tasks, 1);
    assert!(transport.is_stopping());
    assert!(transport.is_stopped());

    let producer = timeout(Duration::from_secs(1), producer)
        .await
        .expect("producer should be released")
        .unwrap();
    assert_eq!(producer.sent, 1);
    assert_eq!(producer.failed, 1);
    assert_eq!(producer.stop, ProducerStop::TransportStopped);
}

/// Full chat session from the default configuration, ended by interrupt
#[tokio::test]
async fn test_chat_session_ends_on_interrupt() {
    let _ = env_logger::try_init();
    let config = RelayConfig::default();
    config.validate().unwrap();

    let transport: Arc<dyn Transport> =
        Arc::new(ChannelTransport::new(config.transport.channel.clone()));
    let (interrupt_tx, interrupt) = interrupt();
    let coordinator =
        ShutdownCoordinator::with_interrupt(transport, config.shutdown.clone(), interrupt);

    let session = tokio::spawn(async move { run_chat(&config, coordinator).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    interrupt_tx.send(()).unwrap();

    let summary = timeout(Duration::from_secs(1), session)
        .await
        .expect("session should end")
        .unwrap()
        .unwrap();

    assert_eq!(summary.shutdown.trigger, ShutdownTrigger::Interrupt);
    assert_eq!(summary.producer.unwrap().sent, 3);
    assert_eq!(summary.consumer.unwrap().handled, 3);
}

/// A session rejected at startup has spawned nothing: no subscription is
/// held and the transport is still usable
#[tokio::test]
async fn test_rejected_session_leaves_nothing_running() {
    let _ = env_logger::try_init();
    let transport = Arc::new(ChannelTransport::default());
    let coordinator = ShutdownCoordinator::with_interrupt(
        transport.clone(),
        ShutdownConfig::default(),
        std::future::pending::<()>(),
    );

    let mut config = RelayConfig::default();
    config.chat.from = String::new();

    let result = run_chat(&config, coordinator).await;
    assert!(matches!(result, Err(RunnerError::Envelope(_))));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.subscriber_count(&config.chat.topic), 0);
    assert!(!transport.is_stopping());
    transport
        .send(&config.chat.topic, b"still open".to_vec())
        .await
        .unwrap();
}
