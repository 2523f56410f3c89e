//! Per-fader write coalescing
//!
//! Fader moves arrive far faster than a light can follow. The first move on a
//! fader opens a window; later moves inside the window replace the pending
//! value (last-write-wins); when the window expires only the latest value is
//! written. Earlier values are discarded, never queued.
//!
//! The throttle only tracks pending values. Whoever gets `true` back from
//! [`VolumeThrottle::offer`] owns the window and must call
//! [`VolumeThrottle::take`] once it expires.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    percent: u8,
    /// Values replaced inside the current window
    coalesced: u32,
}

/// Pending brightness writes keyed by fader id
#[derive(Debug, Default)]
pub struct VolumeThrottle {
    pending: DashMap<String, PendingWrite>,
}

impl VolumeThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest value for a fader
    ///
    /// Returns `true` if this opened a new window (caller schedules the flush),
    /// `false` if it replaced the value of an already open window.
    pub fn offer(&self, id: &str, percent: u8) -> bool {
        match self.pending.entry(id.to_string()) {
            Entry::Occupied(mut slot) => {
                let pending = slot.get_mut();
                pending.percent = percent;
                pending.coalesced += 1;
                trace!("Coalesced {}% for {} ({} replaced)", percent, id, pending.coalesced);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingWrite {
                    percent,
                    coalesced: 0,
                });
                true
            }
        }
    }

    /// Close the window and return the value to write
    pub fn take(&self, id: &str) -> Option<u8> {
        self.pending.remove(id).map(|(_, pending)| {
            if pending.coalesced > 0 {
                trace!("Flushing {} for {} ({} values dropped)", pending.percent, id, pending.coalesced);
            }
            pending.percent
        })
    }

    /// Whether a window is open for the fader
    #[cfg(test)]
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_offer_opens_window() {
        let throttle = VolumeThrottle::new();
        assert!(throttle.offer("light.a", 10));
        assert!(!throttle.offer("light.a", 20));
        assert!(!throttle.offer("light.a", 30));
        assert!(throttle.is_pending("light.a"));

        assert_eq!(throttle.take("light.a"), Some(30));
        assert!(!throttle.is_pending("light.a"));
        assert_eq!(throttle.take("light.a"), None);
    }

    #[test]
    fn test_windows_are_per_fader() {
        let throttle = VolumeThrottle::new();
        assert!(throttle.offer("light.a", 10));
        assert!(throttle.offer("light.b", 50));

        assert_eq!(throttle.take("light.b"), Some(50));
        assert_eq!(throttle.take("light.a"), Some(10));
    }

    #[test]
    fn test_new_window_after_take() {
        let throttle = VolumeThrottle::new();
        assert!(throttle.offer("light.a", 10));
        throttle.take("light.a");
        assert!(throttle.offer("light.a", 90));
    }
}
