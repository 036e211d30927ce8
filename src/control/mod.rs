//! Actuation decisions: what the pumps, fan and lamp should be doing.

pub mod policy;

use serde::Serialize;

use crate::sensors::Zone;

/// Desired actuator state, derived purely from a snapshot and the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActuatorCommand {
    pub pumps: [bool; 3],
    pub fan: bool,
    pub lamp: bool,
}

impl ActuatorCommand {
    /// Everything off; the state applied at boot.
    pub const OFF: Self = Self {
        pumps: [false; 3],
        fan: false,
        lamp: false,
    };

    pub fn pump(&self, zone: Zone) -> bool {
        self.pumps[zone.index()]
    }

    pub fn set_pump(&mut self, zone: Zone, on: bool) {
        self.pumps[zone.index()] = on;
    }

    pub fn any_pump(&self) -> bool {
        self.pumps.iter().any(|p| *p)
    }

    /// Zones whose pump is commanded on.
    pub fn irrigated_zones(&self) -> impl Iterator<Item = Zone> + '_ {
        Zone::ALL.into_iter().filter(|z| self.pump(*z))
    }

    /// Same command with every pump off.
    pub fn without_pumps(self) -> Self {
        Self {
            pumps: [false; 3],
            ..self
        }
    }
}
