//! Producer - pushes envelopes onto a topic until its bound runs out
//!
//! The loop checks its bounds and the shutdown signal between sends only.
//! A send that is already in progress is never interrupted, so with a time
//! budget the last send may finish up to one send latency past the budget.

use crate::error::{Result, RunnerError};
use crate::signal::ShutdownSignal;
use relay_core::{Envelope, EnvelopeCodec, JsonCodec};
use relay_transport::{Transport, TransportError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Termination bound for a producer run
///
/// At least one of a count or a time budget is always set. Bounds are checked
/// between sends, so a send already in progress when the time budget runs out
/// finishes first and the run overshoots by at most that send's latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerBudget {
    max_count: Option<u64>,
    time_budget: Option<Duration>,
}

impl ProducerBudget {
    /// Stop after `max_count` send attempts
    pub fn count(max_count: u64) -> Self {
        Self {
            max_count: Some(max_count),
            time_budget: None,
        }
    }

    /// Stop once `budget` has elapsed
    pub fn duration(budget: Duration) -> Self {
        Self {
            max_count: None,
            time_budget: Some(budget),
        }
    }

    /// Stop at whichever of the two bounds is reached first
    pub fn count_within(max_count: u64, budget: Duration) -> Self {
        Self {
            max_count: Some(max_count),
            time_budget: Some(budget),
        }
    }

    /// Build from optional bounds, rejecting an unbounded run
    pub fn new(max_count: Option<u64>, time_budget: Option<Duration>) -> Result<Self> {
        if max_count.is_none() && time_budget.is_none() {
            return Err(RunnerError::UnboundedProducer);
        }
        Ok(Self {
            max_count,
            time_budget,
        })
    }

    pub fn max_count(&self) -> Option<u64> {
        self.max_count
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget
    }
}

impl fmt::Display for ProducerBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.max_count, self.time_budget) {
            (Some(count), Some(budget)) => write!(f, "{} sends within {:?}", count, budget),
            (Some(count), None) => write!(f, "{} sends", count),
            (None, Some(budget)) => write!(f, "{:?}", budget),
            (None, None) => write!(f, "unbounded"),
        }
    }
}

/// Why a producer run ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProducerStop {
    #[default]
    CountReached,
    BudgetElapsed,
    SourceExhausted,
    Shutdown,
    /// The transport refuses all further sends
    TransportStopped,
}

/// Outcome of a producer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    /// Sends the transport accepted
    pub sent: u64,
    /// Sends the transport rejected
    pub failed: u64,
    /// `sent + failed`
    pub attempted: u64,
    pub stop: ProducerStop,
}

/// Envelope producer bound to one transport and one shutdown signal
pub struct Producer {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn EnvelopeCodec>,
    signal: ShutdownSignal,
    retry_backoff: Duration,
}

impl Producer {
    /// Create a producer using the JSON codec and no retry backoff
    pub fn new(transport: Arc<dyn Transport>, signal: ShutdownSignal) -> Self {
        Self {
            transport,
            codec: Arc::new(JsonCodec),
            signal,
            retry_backoff: Duration::ZERO,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Pause after a failed send; the pause ends early on shutdown
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Send envelopes from `source` to `topic` until a bound is reached
    ///
    /// `std::iter::repeat(envelope)` sends one envelope over and over; a
    /// finite iterator also ends the run when it runs dry.
    pub async fn run<I>(&self, topic: &str, source: I, budget: ProducerBudget) -> ProducerReport
    where
        I: IntoIterator<Item = Envelope>,
        I::IntoIter: Send,
    {
        let started = Instant::now();
        let mut source = source.into_iter();
        let mut report = ProducerReport::default();

        log::info!("[producer:{}] Started ({})", topic, budget);

        report.stop = loop {
            if self.signal.is_fired() {
                break ProducerStop::Shutdown;
            }
            if let Some(max) = budget.max_count {
                if report.attempted >= max {
                    break ProducerStop::CountReached;
                }
            }
            if let Some(limit) = budget.time_budget {
                if started.elapsed() >= limit {
                    break ProducerStop::BudgetElapsed;
                }
            }
            let Some(envelope) = source.next() else {
                break ProducerStop::SourceExhausted;
            };

            let payload = self.codec.encode(&envelope);
            report.attempted += 1;

            match self.transport.send(topic, payload).await {
                Ok(()) => report.sent += 1,
                Err(TransportError::Stopped) => {
                    report.failed += 1;
                    log::warn!("[producer:{}] Transport stopped, ending run", topic);
                    break ProducerStop::TransportStopped;
                }
                Err(e) => {
                    report.failed += 1;
                    log::debug!(
                        "[producer:{}] Send #{} failed: {}",
                        topic,
                        report.attempted,
                        e
                    );
                    self.back_off().await;
                }
            }
        };

        log::info!(
            "[producer:{}] Finished ({:?}): sent={} failed={} in {:?}",
            topic,
            report.stop,
            report.sent,
            report.failed,
            started.elapsed()
        );

        report
    }

    async fn back_off(&self) {
        if self.retry_backoff.is_zero() {
            // Still yield so a failing transport cannot starve other tasks
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = self.signal.fired() => {}
            _ = tokio::time::sleep(self.retry_backoff) => {}
        }
    }
}
