//! Shutdown signal - a one-shot latch shared by every loop

use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// What fired the shutdown signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// OS interrupt (Ctrl-C / SIGINT)
    Interrupt,
    /// `fire` called from code (tests, embedding applications)
    Programmatic,
}

/// Single-fire cancellation flag
///
/// Clones share the same latch. Once fired it never resets, and the first
/// trigger is the one recorded.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    trigger: Arc<OnceLock<ShutdownTrigger>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn fire(&self, trigger: ShutdownTrigger) -> bool {
        let first = self.trigger.set(trigger).is_ok();
        self.token.cancel();
        first
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger recorded by the first `fire`, if any
    pub fn trigger(&self) -> Option<ShutdownTrigger> {
        self.trigger.get().copied()
    }

    /// Resolves once the signal has fired (immediately if it already has)
    pub async fn fired(&self) {
        self.token.cancelled().await
    }
}
