//! Fault-latching threshold controller.
//!
//! Irrigation is act-then-confirm: [`ActuationPolicy::decide`] picks the
//! zones to water, the control loop runs their pumps for one pulse and
//! re-reads the soil after a settle delay, then
//! [`ActuationPolicy::confirm`] latches every zone that is still dry.
//! Fan and lamp follow plain thresholds with no latch.

use log::warn;

use crate::config::SystemConfig;
use crate::control::ActuatorCommand;
use crate::safety::FaultState;
use crate::sensors::{SensorSnapshot, Zone};

/// Pure decision interface; no I/O, no hidden state beyond the latch.
pub trait ActuationPolicy {
    /// Derive the command for a fresh snapshot.
    fn decide(&self, snapshot: &SensorSnapshot, faults: FaultState) -> (ActuatorCommand, FaultState);

    /// Judge an irrigation pulse against the post-settle soil readings.
    ///
    /// The returned command always has every pump off.
    fn confirm(
        &self,
        issued: &ActuatorCommand,
        post: &SensorSnapshot,
        faults: FaultState,
    ) -> (ActuatorCommand, FaultState);
}

/// Threshold rules with configurable limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub soil_threshold_percent: u8,
    pub fan_temperature_c: f32,
    pub fan_humidity_percent: f32,
    pub lamp_min_distance_cm: f32,
}

impl ThresholdPolicy {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            soil_threshold_percent: config.soil_threshold_percent,
            fan_temperature_c: config.fan_temperature_c,
            fan_humidity_percent: config.fan_humidity_percent,
            lamp_min_distance_cm: config.lamp_min_distance_cm,
        }
    }

    fn is_dry(&self, snapshot: &SensorSnapshot, zone: Zone) -> bool {
        snapshot
            .soil(zone)
            .percent()
            .is_some_and(|pct| pct < self.soil_threshold_percent)
    }

    fn fan_on(&self, snapshot: &SensorSnapshot) -> bool {
        snapshot.temperature.is_some_and(|t| t > self.fan_temperature_c)
            || snapshot.humidity.is_some_and(|h| h > self.fan_humidity_percent)
    }

    fn lamp_on(&self, snapshot: &SensorSnapshot) -> bool {
        // Only a measured, too-short distance switches the lamp off.
        !snapshot.distance.is_some_and(|d| d < self.lamp_min_distance_cm)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

impl ActuationPolicy for ThresholdPolicy {
    fn decide(&self, snapshot: &SensorSnapshot, faults: FaultState) -> (ActuatorCommand, FaultState) {
        let mut cmd = ActuatorCommand {
            pumps: [false; 3],
            fan: self.fan_on(snapshot),
            lamp: self.lamp_on(snapshot),
        };

        if snapshot.is_water_empty {
            if Zone::ALL.iter().any(|z| !faults.is_latched(*z) && self.is_dry(snapshot, *z)) {
                warn!("Reservoir empty, irrigation skipped this cycle");
            }
            return (cmd, faults);
        }

        for zone in Zone::ALL {
            if faults.is_latched(zone) {
                continue;
            }
            cmd.set_pump(zone, self.is_dry(snapshot, zone));
        }

        (cmd, faults)
    }

    fn confirm(
        &self,
        issued: &ActuatorCommand,
        post: &SensorSnapshot,
        mut faults: FaultState,
    ) -> (ActuatorCommand, FaultState) {
        for zone in issued.irrigated_zones() {
            if !post.soil(zone).is_measured() {
                warn!("{}: soil unreadable after irrigation, not latching", zone);
                continue;
            }
            if self.is_dry(post, zone) {
                faults.latch(zone);
            }
        }
        (issued.without_pumps(), faults)
    }
}
