//! Per-zone irrigation fault latch.
//!
//! A zone is latched when its soil is still dry after an irrigation pulse:
//! either the probe is broken or the pump is not delivering water.  Running
//! the pump again would only flood or dry-run it, so the latch holds until
//! a full device restart.
//!
//! ## Lifecycle
//!
//! 1. Boot: every zone unlatched.
//! 2. The actuation policy latches a zone after a failed confirmation.
//! 3. A latched zone's pump is never commanded on again.
//!
//! There is no way to clear a latch short of a restart.

use log::error;
use serde::Serialize;

use crate::sensors::Zone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct FaultState(u8);

impl FaultState {
    pub const fn new() -> Self {
        Self(0)
    }

    const fn bit(zone: Zone) -> u8 {
        1 << zone.index()
    }

    pub const fn is_latched(self, zone: Zone) -> bool {
        self.0 & Self::bit(zone) != 0
    }

    /// Latch `zone`.  Idempotent; returns `true` if it was newly latched.
    pub fn latch(&mut self, zone: Zone) -> bool {
        if self.is_latched(zone) {
            return false;
        }
        self.0 |= Self::bit(zone);
        error!(
            "SAFETY: {} latched, soil still dry after irrigation; restart required",
            zone
        );
        true
    }

    pub const fn any(self) -> bool {
        self.0 != 0
    }

    /// Bitmask, bit `n` = zone `n + 1`.
    pub const fn mask(self) -> u8 {
        self.0
    }

    /// Latch flags in zone order, as reported upstream.
    pub fn flags(self) -> [bool; 3] {
        Zone::ALL.map(|z| self.is_latched(z))
    }
}
