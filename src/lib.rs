//! HASS Mixer Bridge
//!
//! Presents Home Assistant lights and switches as mixer channels on a control
//! surface. Lights become faders (mute + brightness), switches become buttons.
//!
//! The core is a bidirectional reconciliation engine:
//! - Gestures on the surface are turned into Home Assistant service calls
//! - A poll loop reads the hub state back into the surface
//! - A suspend gate keeps the two writers from racing each other

pub mod bridge;
pub mod config;
pub mod entity;
pub mod error;
pub mod gate;
pub mod gesture;
pub mod hass;
pub mod paths;
pub mod poll;
pub mod reconcile;
pub mod registry;
pub mod surface;
pub mod throttle;

pub use bridge::{Bridge, BridgeOptions};
pub use entity::{classify, ControlKind, RemoteEntity};
pub use error::{BridgeError, HassError};
pub use hass::{HassClient, RestHassClient, ServiceCall};
pub use registry::ControlRegistry;
pub use surface::{ButtonControl, ControlEvent, ControlHandle, DisplayCallback, FaderControl};
