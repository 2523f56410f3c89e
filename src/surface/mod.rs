//! Control surface objects
//!
//! Every bridged entity is represented by a handle the host renders:
//! - [`FaderControl`] for lights (mute LED + fader position)
//! - [`ButtonControl`] for switches (button LED)
//!
//! Handles cache the displayed state. The host is told about changes through a
//! [`DisplayCallback`] and raises gestures as [`ControlEvent`]s.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

pub mod console;

/// Default minimum spacing between remote writes of one fader
pub const DEFAULT_FADER_THROTTLE: Duration = Duration::from_millis(350);

/// Display change pushed to the host
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    Muted { id: String, muted: bool },
    Volume { id: String, volume: f32 },
    Active { id: String, active: bool },
}

/// Callback the host registers to render display changes
///
/// Invoked only when a cached value actually changes.
pub type DisplayCallback = Arc<dyn Fn(&DisplayUpdate) + Send + Sync>;

/// Gesture raised by the host on a control
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// Mute button of a fader pressed
    MutePressed { id: String },
    /// Fader moved, level in 0.0-1.0
    VolumeChanged { id: String, level: f32 },
    /// Button pressed
    Pressed { id: String },
}

impl ControlEvent {
    pub fn id(&self) -> &str {
        match self {
            ControlEvent::MutePressed { id }
            | ControlEvent::VolumeChanged { id, .. }
            | ControlEvent::Pressed { id } => id,
        }
    }
}

/// Cached fader display state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaderState {
    pub muted: bool,
    pub volume: f32,
}

/// Fader bound to a light
pub struct FaderControl {
    id: String,
    display_name: String,
    throttle: Duration,
    state: RwLock<FaderState>,
    display: Option<DisplayCallback>,
}

impl FaderControl {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        throttle: Duration,
        display: Option<DisplayCallback>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            throttle,
            state: RwLock::new(FaderState::default()),
            display,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Minimum spacing between remote writes for this fader
    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn muted(&self) -> bool {
        self.state.read().muted
    }

    pub fn volume(&self) -> f32 {
        self.state.read().volume
    }

    pub fn snapshot(&self) -> FaderState {
        *self.state.read()
    }

    /// Set the mute LED, returns true if it changed
    pub fn set_muted(&self, muted: bool) -> bool {
        {
            let mut state = self.state.write();
            if state.muted == muted {
                return false;
            }
            state.muted = muted;
        }
        self.emit(DisplayUpdate::Muted {
            id: self.id.clone(),
            muted,
        });
        true
    }

    /// Set the fader level (clamped to 0.0-1.0), returns true if it changed
    pub fn set_volume(&self, volume: f32) -> bool {
        let volume = volume.clamp(0.0, 1.0);
        {
            let mut state = self.state.write();
            if state.volume == volume {
                return false;
            }
            state.volume = volume;
        }
        self.emit(DisplayUpdate::Volume {
            id: self.id.clone(),
            volume,
        });
        true
    }

    fn emit(&self, update: DisplayUpdate) {
        if let Some(display) = &self.display {
            display(&update);
        }
    }
}

impl std::fmt::Debug for FaderControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaderControl")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("throttle", &self.throttle)
            .field("state", &*self.state.read())
            .finish()
    }
}

/// Button bound to a switch
pub struct ButtonControl {
    id: String,
    display_name: String,
    active: RwLock<bool>,
    display: Option<DisplayCallback>,
}

impl ButtonControl {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        display: Option<DisplayCallback>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            active: RwLock::new(false),
            display,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn active(&self) -> bool {
        *self.active.read()
    }

    /// Set the button LED, returns true if it changed
    pub fn set_active(&self, active: bool) -> bool {
        {
            let mut current = self.active.write();
            if *current == active {
                return false;
            }
            *current = active;
        }
        if let Some(display) = &self.display {
            display(&DisplayUpdate::Active {
                id: self.id.clone(),
                active,
            });
        }
        true
    }
}

impl std::fmt::Debug for ButtonControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ButtonControl")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("active", &*self.active.read())
            .finish()
    }
}

/// Handle to a registered control
#[derive(Debug, Clone)]
pub enum ControlHandle {
    Fader(Arc<FaderControl>),
    Button(Arc<ButtonControl>),
}

impl ControlHandle {
    pub fn id(&self) -> &str {
        match self {
            ControlHandle::Fader(f) => f.id(),
            ControlHandle::Button(b) => b.id(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ControlHandle::Fader(f) => f.display_name(),
            ControlHandle::Button(b) => b.display_name(),
        }
    }

    pub fn kind(&self) -> crate::entity::ControlKind {
        match self {
            ControlHandle::Fader(_) => crate::entity::ControlKind::Fader,
            ControlHandle::Button(_) => crate::entity::ControlKind::Button,
        }
    }
}
