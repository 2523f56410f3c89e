//! Reconciler - Home Assistant → surface
//!
//! Overwrites the cached display state of registered controls from a freshly
//! fetched snapshot. Read-and-display only: it never calls back into the hub,
//! which is what keeps polling free of feedback loops.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::entity::RemoteEntity;
use crate::registry::ControlRegistry;
use crate::surface::ControlHandle;

/// Result of applying one snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Snapshot entities that resolved to a registered control
    pub matched: usize,
    /// Controls whose displayed state actually changed
    pub changed: usize,
}

pub struct Reconciler {
    registry: Arc<ControlRegistry>,
}

impl Reconciler {
    pub fn new(registry: Arc<ControlRegistry>) -> Self {
        Self { registry }
    }

    /// Sync every registered control present in `snapshot`
    ///
    /// Entities that are not registered are skipped.
    pub fn apply(&self, snapshot: &[RemoteEntity]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for entity in snapshot {
            let Some(handle) = self.registry.lookup(entity.id()) else {
                continue;
            };
            report.matched += 1;

            let changed = match handle {
                ControlHandle::Fader(fader) => fader.set_muted(!entity.is_on()),
                ControlHandle::Button(button) => button.set_active(entity.is_on()),
            };
            if changed {
                trace!("{} reconciled from hub state '{}'", entity.id(), entity.state);
                report.changed += 1;
            }
        }

        if report.changed > 0 {
            debug!(
                "Reconciled {} controls ({} changed)",
                report.matched, report.changed
            );
        }
        report
    }
}
