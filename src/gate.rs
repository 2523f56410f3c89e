//! Suspend gate - keeps polling out of the way of in-flight gestures
//!
//! A gesture acquires the gate for the whole fetch → decide → write sequence.
//! While any holder exists, poll ticks are skipped. Each acquisition bumps an
//! epoch so a poll whose fetch overlapped a gesture can detect that its
//! snapshot is stale.
//!
//! Release is tied to [`GateGuard`]'s `Drop`, so every exit path of a gesture
//! (including errors and panics) resumes polling.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct GateState {
    holders: usize,
    epoch: u64,
}

/// Shared suspend signal (cheap to clone)
#[derive(Debug, Clone, Default)]
pub struct SuspendGate {
    state: Arc<Mutex<GateState>>,
}

impl SuspendGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend polling until the returned guard is dropped
    pub fn acquire(&self) -> GateGuard {
        let mut state = self.state.lock();
        state.holders += 1;
        state.epoch += 1;
        trace!("Gate acquired (holders: {}, epoch: {})", state.holders, state.epoch);

        GateGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// Whether any gesture currently holds the gate
    pub fn is_held(&self) -> bool {
        self.state.lock().holders > 0
    }

    /// Acquisition counter, read before a fetch and checked after it
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Run `apply` only if the gate is free and nobody acquired it since `epoch`
    ///
    /// The gate lock is held while `apply` runs, so no gesture can start its
    /// optimistic write in the middle of it. Returns `None` when skipped.
    pub fn run_if_idle<T>(&self, epoch: u64, apply: impl FnOnce() -> T) -> Option<T> {
        let state = self.state.lock();
        if state.holders > 0 || state.epoch != epoch {
            return None;
        }
        let result = apply();
        drop(state);
        Some(result)
    }
}

/// Scoped hold on a [`SuspendGate`]
#[must_use = "dropping the guard immediately resumes polling"]
#[derive(Debug)]
pub struct GateGuard {
    state: Arc<Mutex<GateState>>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.holders = state.holders.saturating_sub(1);
        trace!("Gate released (holders: {})", state.holders);
    }
}
