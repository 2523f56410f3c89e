//! Gesture handling - surface → Home Assistant
//!
//! Every gesture follows the same shape:
//! suspend polling → read authoritative state → decide whether a write is
//! needed → flip the cached state → write (if needed) → resume polling.
//!
//! Remote failures never undo the local flip: the surface keeps showing what
//! the user asked for and the next successful poll corrects any drift.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::entity::{LIGHT_DOMAIN, SWITCH_DOMAIN};
use crate::error::BridgeError;
use crate::gate::{GateGuard, SuspendGate};
use crate::hass::{HassClient, ServiceCall};
use crate::surface::{ButtonControl, FaderControl};
use crate::throttle::VolumeThrottle;

/// Default light transition for brightness changes (seconds)
pub const DEFAULT_TRANSITION_SECS: f32 = 0.35;

/// What a toggle-style gesture ended up doing on the hub side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// A toggle call was issued and accepted
    Toggled,
    /// Hub already in the requested state, no call issued
    AlreadyInSync,
    /// Pre-read or call failed; only the local state changed
    RemoteFailed,
}

/// Translates surface gestures into hub service calls
#[derive(Clone)]
pub struct GestureHandler {
    client: Arc<dyn HassClient>,
    gate: SuspendGate,
    throttle: Arc<VolumeThrottle>,
    transition_secs: f32,
}

impl GestureHandler {
    pub fn new(client: Arc<dyn HassClient>, gate: SuspendGate) -> Self {
        Self::with_transition(client, gate, DEFAULT_TRANSITION_SECS)
    }

    pub fn with_transition(client: Arc<dyn HassClient>, gate: SuspendGate, transition_secs: f32) -> Self {
        Self {
            client,
            gate,
            throttle: Arc::new(VolumeThrottle::new()),
            transition_secs,
        }
    }

    /// Mute pressed on a fader
    ///
    /// Toggles the light only when its authoritative on/off state equals the
    /// desired muted value, i.e. the surface and the hub disagree about where
    /// the press should lead. The mute LED flips in every case.
    pub async fn mute_pressed(&self, fader: &FaderControl) -> GestureOutcome {
        let _guard = self.gate.acquire();
        let desired_muted = !fader.muted();

        let outcome = match self.client.fetch_one(LIGHT_DOMAIN, fader.id()).await {
            Ok(entity) => {
                let needs_toggle = entity.is_on() == desired_muted;
                fader.set_muted(desired_muted);
                if needs_toggle {
                    self.toggle(fader.id()).await
                } else {
                    debug!("{} already {}, skipping toggle", fader.id(), entity.state);
                    GestureOutcome::AlreadyInSync
                }
            }
            Err(e) => {
                warn!("{}", BridgeError::gesture(fader.id(), e));
                fader.set_muted(desired_muted);
                GestureOutcome::RemoteFailed
            }
        };

        info!("🔇 {} mute → {} ({:?})", fader.id(), desired_muted, outcome);
        outcome
    }

    /// Button pressed
    ///
    /// Toggles the switch only when its authoritative state still matches the
    /// displayed one. The button LED flips in every case.
    pub async fn button_pressed(&self, button: &ButtonControl) -> GestureOutcome {
        let _guard = self.gate.acquire();
        let cached_active = button.active();
        let desired_active = !cached_active;

        let outcome = match self.client.fetch_one(SWITCH_DOMAIN, button.id()).await {
            Ok(entity) => {
                let needs_toggle = entity.is_on() == cached_active;
                button.set_active(desired_active);
                if needs_toggle {
                    self.toggle(button.id()).await
                } else {
                    debug!("{} already {}, skipping toggle", button.id(), entity.state);
                    GestureOutcome::AlreadyInSync
                }
            }
            Err(e) => {
                warn!("{}", BridgeError::gesture(button.id(), e));
                button.set_active(desired_active);
                GestureOutcome::RemoteFailed
            }
        };

        info!("🔘 {} active → {} ({:?})", button.id(), desired_active, outcome);
        outcome
    }

    /// Fader moved
    ///
    /// The surface is updated immediately. The brightness write goes through
    /// the per-fader throttle: the first move opens a window of
    /// `fader.throttle()`, later moves replace the pending value, and only the
    /// latest one is sent when the window expires. Polling stays suspended
    /// until that write completes.
    pub fn volume_changed(&self, fader: &Arc<FaderControl>, level: f32) {
        let guard = self.gate.acquire();
        let level = level.clamp(0.0, 1.0);
        let percent = (level * 100.0).round() as u8;

        fader.set_volume(level);
        fader.set_muted(percent == 0);

        if self.throttle.offer(fader.id(), percent) {
            let handler = self.clone();
            let fader = Arc::clone(fader);
            tokio::spawn(async move {
                handler.flush_volume(&fader, fader.throttle(), guard).await;
            });
        }
    }

    async fn flush_volume(&self, fader: &FaderControl, window: Duration, _guard: GateGuard) {
        tokio::time::sleep(window).await;

        let Some(percent) = self.throttle.take(fader.id()) else {
            return;
        };

        let call = ServiceCall::turn_on_brightness(fader.id(), percent, self.transition_secs);
        match self.client.invoke_service(&call).await {
            Ok(()) => debug!("💡 {} brightness → {}%", fader.id(), percent),
            Err(e) => warn!("{}", BridgeError::gesture(fader.id(), e)),
        }
    }

    async fn toggle(&self, entity_id: &str) -> GestureOutcome {
        match self.client.invoke_service(&ServiceCall::toggle(entity_id)).await {
            Ok(()) => GestureOutcome::Toggled,
            Err(e) => {
                warn!("{}", BridgeError::gesture(entity_id, e));
                GestureOutcome::RemoteFailed
            }
        }
    }
}
