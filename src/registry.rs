//! Control registry - entity id → control handle
//!
//! Built once from the discovery snapshot. Lookups happen on every poll tick
//! and every gesture, so the map is a `DashMap` shared behind an `Arc`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::entity::{ControlKind, RemoteEntity};
use crate::surface::{ButtonControl, ControlHandle, DisplayCallback, FaderControl, DEFAULT_FADER_THROTTLE};

/// Registry of control handles keyed by entity id
pub struct ControlRegistry {
    controls: DashMap<String, ControlHandle>,
    fader_throttle: Duration,
    display: Option<DisplayCallback>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::with_options(DEFAULT_FADER_THROTTLE, None)
    }

    /// Create a registry whose faders use `fader_throttle` and whose handles
    /// report display changes to `display`
    pub fn with_options(fader_throttle: Duration, display: Option<DisplayCallback>) -> Self {
        Self {
            controls: DashMap::new(),
            fader_throttle,
            display,
        }
    }

    /// Create and store the handle for an entity
    ///
    /// Returns `None` (and changes nothing) if the id is already registered
    /// or the kind is `Ignore`.
    pub fn register(&self, entity: &RemoteEntity, kind: ControlKind) -> Option<ControlHandle> {
        let handle = match kind {
            ControlKind::Fader => ControlHandle::Fader(Arc::new(FaderControl::new(
                entity.id(),
                entity.display_name(),
                self.fader_throttle,
                self.display.clone(),
            ))),
            ControlKind::Button => ControlHandle::Button(Arc::new(ButtonControl::new(
                entity.id(),
                entity.display_name(),
                self.display.clone(),
            ))),
            ControlKind::Ignore => {
                trace!("Ignoring entity {}", entity.id());
                return None;
            }
        };

        match self.controls.entry(entity.id().to_string()) {
            Entry::Occupied(_) => {
                debug!("Entity {} already registered, skipping", entity.id());
                None
            }
            Entry::Vacant(slot) => {
                debug!("Registered {} '{}' as {}", entity.id(), entity.display_name(), kind);
                slot.insert(handle.clone());
                Some(handle)
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Option<ControlHandle> {
        self.controls.get(id).map(|entry| entry.value().clone())
    }

    pub fn lookup_fader(&self, id: &str) -> Option<Arc<FaderControl>> {
        match self.controls.get(id)?.value() {
            ControlHandle::Fader(fader) => Some(Arc::clone(fader)),
            ControlHandle::Button(_) => None,
        }
    }

    pub fn lookup_button(&self, id: &str) -> Option<Arc<ButtonControl>> {
        match self.controls.get(id)?.value() {
            ControlHandle::Button(button) => Some(Arc::clone(button)),
            ControlHandle::Fader(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// All handles, sorted by entity id
    pub fn handles(&self) -> Vec<ControlHandle> {
        let mut handles: Vec<ControlHandle> =
            self.controls.iter().map(|entry| entry.value().clone()).collect();
        handles.sort_by(|a, b| a.id().cmp(b.id()));
        handles
    }
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::new()
    }
}
