//! Bridge - process-lifetime context of the reconciliation engine
//!
//! Owns everything the engine shares between components:
//! - Home Assistant client
//! - Control registry (built once from discovery)
//! - Suspend gate
//! - Gesture handler and the dispatcher task feeding it
//! - Poll loop actor
//!
//! Startup: discover → classify → register → initial reconcile → start polling.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::entity::classify;
use crate::error::BridgeError;
use crate::gate::SuspendGate;
use crate::gesture::{GestureHandler, DEFAULT_TRANSITION_SECS};
use crate::hass::HassClient;
use crate::poll::{PollLoop, PollLoopHandle, TickOutcome};
use crate::reconcile::Reconciler;
use crate::registry::ControlRegistry;
use crate::surface::{ControlEvent, ControlHandle, DisplayCallback, DEFAULT_FADER_THROTTLE};

/// Runtime options of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    /// Poll interval in seconds, 0 disables polling
    pub poll_interval_secs: u64,
    /// Minimum spacing between brightness writes of one fader
    pub fader_throttle: Duration,
    /// Light transition used for brightness writes (seconds)
    pub transition_secs: f32,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            poll_interval_secs: 0,
            fader_throttle: DEFAULT_FADER_THROTTLE,
            transition_secs: DEFAULT_TRANSITION_SECS,
        }
    }
}

impl BridgeOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval_secs: config.hass.poll_interval_secs,
            fader_throttle: Duration::from_millis(config.bridge.volume_throttle_ms),
            transition_secs: config.bridge.transition_secs,
        }
    }
}

/// Running reconciliation engine
pub struct Bridge {
    registry: Arc<ControlRegistry>,
    gate: SuspendGate,
    gestures: GestureHandler,
    poll: PollLoopHandle,
    event_tx: mpsc::UnboundedSender<ControlEvent>,
    dispatcher: JoinHandle<()>,
}

impl Bridge {
    /// Discover entities, build the registry and start polling
    ///
    /// `display` receives every display change of every control, starting
    /// with the initial sync from the discovery snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Discovery`] if the startup snapshot cannot be
    /// fetched. Nothing is started in that case.
    pub async fn start(
        client: Arc<dyn HassClient>,
        options: BridgeOptions,
        display: Option<DisplayCallback>,
    ) -> Result<Self, BridgeError> {
        info!("🔍 Discovering Home Assistant entities...");
        let entities = client.discover().await.map_err(BridgeError::Discovery)?;

        let registry = Arc::new(ControlRegistry::with_options(options.fader_throttle, display));
        let mut faders = 0;
        let mut buttons = 0;
        for entity in &entities {
            let kind = classify(entity.id());
            match registry.register(entity, kind) {
                Some(ControlHandle::Fader(fader)) => {
                    if let Some(pct) = entity.brightness_pct() {
                        fader.set_volume(f32::from(pct) / 100.0);
                    }
                    faders += 1;
                }
                Some(ControlHandle::Button(_)) => buttons += 1,
                None => {}
            }
        }
        info!(
            "✅ Discovered {} entities: {} faders, {} buttons",
            entities.len(),
            faders,
            buttons
        );

        // Initial display state comes from the discovery snapshot itself
        Reconciler::new(Arc::clone(&registry)).apply(&entities);

        let gate = SuspendGate::new();
        let gestures =
            GestureHandler::with_transition(Arc::clone(&client), gate.clone(), options.transition_secs);

        let poll = PollLoop::spawn(
            Arc::clone(&client),
            Reconciler::new(Arc::clone(&registry)),
            gate.clone(),
            options.poll_interval_secs,
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(run_dispatcher(
            event_rx,
            Arc::clone(&registry),
            gestures.clone(),
        ));

        Ok(Self {
            registry,
            gate,
            gestures,
            poll,
            event_tx,
            dispatcher,
        })
    }

    pub fn registry(&self) -> &Arc<ControlRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &SuspendGate {
        &self.gate
    }

    pub fn poll(&self) -> &PollLoopHandle {
        &self.poll
    }

    /// Sender the host uses to raise gestures
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ControlEvent> {
        self.event_tx.clone()
    }

    /// Handle a gesture and wait for it to finish
    ///
    /// Volume changes return once the surface is updated; the throttled
    /// write completes in the background.
    pub async fn handle_event(&self, event: ControlEvent) {
        handle_event(&self.registry, &self.gestures, event).await;
    }

    pub async fn set_poll_interval(&self, secs: u64) {
        self.poll.set_interval(secs).await;
    }

    /// Force a poll tick now
    pub async fn poll_now(&self) -> Option<TickOutcome> {
        self.poll.poll_now().await
    }

    /// Stop polling and gesture dispatch
    ///
    /// Gestures already running finish on their own; their results only touch
    /// the (still alive) control handles.
    pub async fn shutdown(self) {
        self.poll.shutdown();
        drop(self.event_tx);
        self.dispatcher.abort();
        let _ = self.dispatcher.await;
        info!("Bridge stopped");
    }
}

/// Dispatch gestures from the host
///
/// Fader moves are applied inline so their levels reach the throttle in send
/// order. Presses await the hub and run as their own tasks; each one
/// serializes against polling through the suspend gate.
async fn run_dispatcher(
    mut event_rx: mpsc::UnboundedReceiver<ControlEvent>,
    registry: Arc<ControlRegistry>,
    gestures: GestureHandler,
) {
    while let Some(event) = event_rx.recv().await {
        debug!("Gesture received: {:?}", event);
        if let ControlEvent::VolumeChanged { .. } = event {
            handle_event(&registry, &gestures, event).await;
            continue;
        }
        let registry = Arc::clone(&registry);
        let gestures = gestures.clone();
        tokio::spawn(async move {
            handle_event(&registry, &gestures, event).await;
        });
    }
    debug!("Gesture dispatcher stopped");
}

async fn handle_event(registry: &ControlRegistry, gestures: &GestureHandler, event: ControlEvent) {
    let handle = registry.lookup(event.id());

    match (event, handle) {
        (ControlEvent::MutePressed { .. }, Some(ControlHandle::Fader(fader))) => {
            gestures.mute_pressed(&fader).await;
        }
        (ControlEvent::VolumeChanged { level, .. }, Some(ControlHandle::Fader(fader))) => {
            gestures.volume_changed(&fader, level);
        }
        (ControlEvent::Pressed { .. }, Some(ControlHandle::Button(button))) => {
            gestures.button_pressed(&button).await;
        }
        (event, Some(handle)) => {
            warn!(
                "Gesture {:?} does not apply to {} {}",
                event,
                handle.kind(),
                handle.id()
            );
        }
        (event, None) => {
            warn!("Gesture for unknown control: {:?}", event);
        }
    }
}
