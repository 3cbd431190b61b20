//! Shutdown Coordinator - deterministic, interrupt-driven teardown
//!
//! ## Sequence
//!
//! ```text
//! install() ── interrupt listener registered, signal created
//!    │
//!    │   loops spawned via spawn() observe the signal
//!    ▼
//! interrupt / trigger() ── signal fires (once)
//!    │
//!    ├─► wait for spawned loops to drain   (bounded by stop_timeout)
//!    ├─► transport.stop()                  (always called)
//!    ├─► transport.stopped()               (bounded by stop_timeout)
//!    └─► interrupt listener released (every exit path)
//! ```
//!
//! Without a `stop_timeout` the coordinator waits for both phases forever; a
//! loop that never ends or a backend that never confirms its stop hangs the
//! process. With a bound, a drain that overruns it is cut short and the
//! transport is stopped anyway, which releases loops parked inside the
//! transport. A stop that is still unconfirmed after a second bound becomes
//! `RunnerError::StopTimeout`.

use crate::error::{Result, RunnerError};
use crate::signal::{ShutdownSignal, ShutdownTrigger};
use relay_transport::Transport;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Shutdown settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Upper bound on waiting for the transport to confirm its stop.
    /// `None` waits indefinitely.
    #[serde(default)]
    pub stop_timeout_ms: Option<u64>,
}

impl ShutdownConfig {
    /// Bounded wait for the transport stop
    ///
    /// Sub-millisecond remainders round up, so a non-zero bound never
    /// becomes zero.
    pub fn bounded(stop_timeout: Duration) -> Self {
        let mut millis = u64::try_from(stop_timeout.as_millis()).unwrap_or(u64::MAX);
        if stop_timeout.subsec_nanos() % 1_000_000 != 0 {
            millis = millis.saturating_add(1);
        }
        Self {
            stop_timeout_ms: Some(millis),
        }
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_ms.map(Duration::from_millis)
    }
}

/// Outcome of a completed shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub trigger: ShutdownTrigger,
    /// Loops that were still running when the signal fired
    pub drained_tasks: usize,
    /// Loops still running when the drain bound expired and the transport
    /// was stopped under them
    pub undrained_tasks: usize,
}

/// Interrupt listener task; aborting it drops the OS signal registration
struct InterruptListener {
    handle: JoinHandle<()>,
}

impl InterruptListener {
    fn spawn<F>(interrupt: F, signal: ShutdownSignal) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = interrupt => {
                    if signal.fire(ShutdownTrigger::Interrupt) {
                        log::info!("[shutdown] Interrupt received");
                    }
                }
                _ = signal.fired() => {}
            }
        });
        Self { handle }
    }
}

impl Drop for InterruptListener {
    fn drop(&mut self) {
        self.handle.abort();
        log::debug!("[shutdown] Interrupt listener released");
    }
}

/// Owns the shutdown signal and the interrupt subscription for one run
pub struct ShutdownCoordinator {
    transport: Arc<dyn Transport>,
    signal: ShutdownSignal,
    tracker: TaskTracker,
    config: ShutdownConfig,
    listener: InterruptListener,
}

impl ShutdownCoordinator {
    /// Register the OS interrupt listener (Ctrl-C / SIGINT)
    ///
    /// Must be called inside a tokio runtime, before any loop is started, so
    /// no interrupt can slip in between loop start and registration.
    pub fn install(transport: Arc<dyn Transport>, config: ShutdownConfig) -> Result<Self> {
        let interrupt = os_interrupt()?;
        Ok(Self::with_interrupt(transport, config, interrupt))
    }

    /// Use any future as the interrupt source (tests, embedding applications)
    pub fn with_interrupt<F>(transport: Arc<dyn Transport>, config: ShutdownConfig, interrupt: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let signal = ShutdownSignal::new();
        let listener = InterruptListener::spawn(interrupt, signal.clone());

        Self {
            transport,
            signal,
            tracker: TaskTracker::new(),
            config,
            listener,
        }
    }

    /// Signal handle for loops started outside [`ShutdownCoordinator::spawn`]
    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Fire the shutdown signal from code. Returns `true` if this call fired it.
    pub fn trigger(&self) -> bool {
        self.signal.fire(ShutdownTrigger::Programmatic)
    }

    /// Run a loop that the drain phase waits for
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Wait for the signal, then drain, stop, and confirm the transport
    pub async fn run(self) -> Result<ShutdownReport> {
        // `_listener` lives until this function returns, on every path
        let Self {
            transport,
            signal,
            tracker,
            config,
            listener: _listener,
        } = self;

        signal.fired().await;
        let trigger = signal.trigger().unwrap_or(ShutdownTrigger::Programmatic);
        let drained_tasks = tracker.len();
        log::info!(
            "[shutdown] Signal fired ({:?}), draining {} loop(s)",
            trigger,
            drained_tasks
        );

        tracker.close();
        let undrained_tasks = match config.stop_timeout() {
            None => {
                tracker.wait().await;
                0
            }
            Some(limit) => match tokio::time::timeout(limit, tracker.wait()).await {
                Ok(()) => 0,
                Err(_) => {
                    let remaining = tracker.len();
                    log::warn!(
                        "[shutdown] {} loop(s) still running after {:?}, stopping transport anyway",
                        remaining,
                        limit
                    );
                    remaining
                }
            },
        };

        if undrained_tasks == 0 {
            log::info!("[shutdown] Loops drained, stopping transport");
        }
        transport.stop();

        match config.stop_timeout() {
            None => transport.stopped().await,
            Some(limit) => {
                if tokio::time::timeout(limit, transport.stopped()).await.is_err() {
                    log::error!("[shutdown] Transport did not confirm stop within {:?}", limit);
                    return Err(RunnerError::StopTimeout(limit));
                }
            }
        }

        log::info!("[shutdown] Shutdown complete");
        Ok(ShutdownReport {
            trigger,
            drained_tasks,
            undrained_tasks,
        })
    }
}

/// Interrupt future whose OS registration is already in place when returned
#[cfg(unix)]
fn os_interrupt() -> Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).map_err(RunnerError::Signal)?;
    Ok(async move {
        interrupt.recv().await;
    })
}

#[cfg(not(unix))]
fn os_interrupt() -> Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("[shutdown] Interrupt listener failed: {}", e);
            std::future::pending::<()>().await;
        }
    })
}
