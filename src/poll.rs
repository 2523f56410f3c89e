//! Poll loop actor - periodic Home Assistant → surface sync
//!
//! The loop runs as its own task and is driven through [`PollLoopHandle`].
//!
//! # Tick policy
//!
//! 1. If the suspend gate is held (a gesture is talking to the hub), the tick
//!    is skipped. It is not queued and not retried.
//! 2. Otherwise the full snapshot is fetched.
//! 3. The snapshot is applied only if no gesture acquired the gate while the
//!    fetch was in flight; otherwise it is discarded as stale.
//!
//! Fetch failures are logged and the loop waits for the next tick. Ticks
//! missed because a fetch ran long are skipped rather than bursted.
//!
//! An interval of 0 disables polling: no timer is armed until a non-zero
//! interval is set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::BridgeError;
use crate::gate::SuspendGate;
use crate::hass::HassClient;
use crate::reconcile::{ReconcileReport, Reconciler};

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gate held at tick entry, nothing fetched
    Suspended,
    /// A gesture started during the fetch, snapshot dropped
    Stale,
    /// Snapshot fetch failed
    Failed,
    /// Snapshot applied
    Reconciled(ReconcileReport),
}

/// Tick counters, shared with the handle
#[derive(Debug, Default)]
pub struct PollStats {
    pub ticks: AtomicU64,
    pub suspended: AtomicU64,
    pub stale: AtomicU64,
    pub failures: AtomicU64,
    pub reconciled: AtomicU64,
}

impl PollStats {
    fn record(&self, outcome: &TickOutcome) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            TickOutcome::Suspended => &self.suspended,
            TickOutcome::Stale => &self.stale,
            TickOutcome::Failed => &self.failures,
            TickOutcome::Reconciled(_) => &self.reconciled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// Commands sent to the poll loop
#[derive(Debug)]
pub enum PollCommand {
    /// Change the interval in seconds (0 disables)
    SetInterval(u64),
    /// Run a tick right away and report what it did
    PollNow(oneshot::Sender<TickOutcome>),
    /// Stop the loop
    Shutdown,
}

pub struct PollLoop {
    client: Arc<dyn HassClient>,
    reconciler: Reconciler,
    gate: SuspendGate,
    command_rx: mpsc::Receiver<PollCommand>,
    interval_secs: u64,
    ticker: Option<Interval>,
    stats: Arc<PollStats>,
}

/// Handle to the poll loop task (cheap to clone)
#[derive(Clone)]
pub struct PollLoopHandle {
    cmd_tx: mpsc::Sender<PollCommand>,
    stats: Arc<PollStats>,
}

fn make_ticker(interval_secs: u64) -> Option<Interval> {
    if interval_secs == 0 {
        return None;
    }
    let period = Duration::from_secs(interval_secs);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl PollLoop {
    /// Spawn the poll loop task
    pub fn spawn(
        client: Arc<dyn HassClient>,
        reconciler: Reconciler,
        gate: SuspendGate,
        interval_secs: u64,
    ) -> PollLoopHandle {
        let (cmd_tx, command_rx) = mpsc::channel(16);
        let stats = Arc::new(PollStats::default());

        let poll_loop = PollLoop {
            client,
            reconciler,
            gate,
            command_rx,
            interval_secs,
            ticker: make_ticker(interval_secs),
            stats: Arc::clone(&stats),
        };
        tokio::spawn(poll_loop.run());

        PollLoopHandle { cmd_tx, stats }
    }

    async fn run(mut self) {
        if self.interval_secs == 0 {
            info!("State polling disabled (interval = 0)");
        } else {
            info!("State polling every {}s", self.interval_secs);
        }

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(PollCommand::SetInterval(secs)) => self.set_interval(secs),
                        Some(PollCommand::PollNow(response_tx)) => {
                            let outcome = self.tick().await;
                            let _ = response_tx.send(outcome);
                        }
                        Some(PollCommand::Shutdown) | None => {
                            info!(
                                "Poll loop stopped ({} ticks, {} suspended, {} failed)",
                                self.stats.ticks(),
                                self.stats.suspended.load(Ordering::Relaxed),
                                self.stats.failures.load(Ordering::Relaxed),
                            );
                            return;
                        }
                    }
                }
                _ = next_tick(&mut self.ticker) => {
                    self.tick().await;
                }
            }
        }
    }

    fn set_interval(&mut self, secs: u64) {
        if secs == self.interval_secs {
            return;
        }
        info!("Poll interval changed: {}s → {}s", self.interval_secs, secs);
        self.interval_secs = secs;
        self.ticker = make_ticker(secs);
    }

    async fn tick(&mut self) -> TickOutcome {
        let outcome = self.poll_once().await;
        self.stats.record(&outcome);
        outcome
    }

    async fn poll_once(&self) -> TickOutcome {
        if self.gate.is_held() {
            debug!("Gesture in flight, skipping poll tick");
            return TickOutcome::Suspended;
        }

        let epoch = self.gate.epoch();
        let snapshot = match self.client.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{}", BridgeError::Poll(e));
                return TickOutcome::Failed;
            }
        };

        match self.gate.run_if_idle(epoch, || self.reconciler.apply(&snapshot)) {
            Some(report) => {
                trace!("Poll tick reconciled {} entities", report.matched);
                TickOutcome::Reconciled(report)
            }
            None => {
                debug!("Gesture started during poll fetch, dropping snapshot");
                TickOutcome::Stale
            }
        }
    }
}

impl PollLoopHandle {
    /// Change the poll interval (0 disables polling)
    pub async fn set_interval(&self, secs: u64) {
        let _ = self.cmd_tx.send(PollCommand::SetInterval(secs)).await;
    }

    /// Run one tick immediately
    ///
    /// Returns `None` if the loop has stopped.
    pub async fn poll_now(&self) -> Option<TickOutcome> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(PollCommand::PollNow(tx)).await.ok()?;
        rx.await.ok()
    }

    /// Stop the loop (fire-and-forget)
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.try_send(PollCommand::Shutdown);
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }
}
