//! Outbound application events and the telemetry record.
//!
//! The [`ControlLoop`](super::service::ControlLoop) and the
//! [`Provisioner`](crate::provisioning::Provisioner) emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use serde::Serialize;

use crate::control::ActuatorCommand;
use crate::error::Error;
use crate::provisioning::{ProvisioningOutcome, ProvisioningState};
use crate::safety::FaultState;
use crate::sensors::{Channel, SensorSnapshot, SoilMoisture, Zone};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The control loop has started.
    Started { period_secs: u16 },

    /// A channel could not be read; its reading is unavailable this cycle.
    SensorFault { channel: Channel, error: Error },

    /// Pumps switched on for one irrigation pulse.
    IrrigationStarted { pumps: [bool; 3] },

    /// A zone's pump is now locked out until restart.
    FaultLatched(Zone),

    /// Best-effort upload failed; the cycle carried on.
    TelemetryDropped(Error),

    /// A cycle ran longer than the configured period.
    CycleOverrun { duration_ms: u32 },

    /// A full measure → decide → actuate → report pass finished.
    CycleCompleted(CycleReport),

    /// The provisioning state machine moved.
    Provisioning(ProvisioningState),

    /// Submitted credentials were malformed or failed the live test.
    CredentialsRejected(Error),

    /// Credentials passed the live test but could not be stored.
    PersistenceFailed(Error),

    /// Provisioning handed control back to the caller.
    ProvisioningFinished(ProvisioningOutcome),
}

/// Soil moisture per zone, re-read after an irrigation pulse settled.
pub type SoilConfirmation = [SoilMoisture; 3];

/// Summary of one completed control cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    /// What the cycle's measurement saw, before any pulse.
    pub snapshot: SensorSnapshot,
    /// Post-pulse soil reads; `None` when nothing was irrigated.
    pub confirmation: Option<SoilConfirmation>,
    pub command: ActuatorCommand,
    pub faults: FaultState,
    pub duration_ms: u32,
}

/// JSON body POSTed to the telemetry endpoint each cycle.
///
/// Field names are the upstream API's; soil values keep the `-1`
/// sentinel for unmeasured zones.  `soil_after_irrigation` is `null`
/// unless the cycle ran a pulse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReport {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub is_water_empty: bool,
    pub distance: Option<f32>,
    pub soil_humidity_1: SoilMoisture,
    pub soil_humidity_2: SoilMoisture,
    pub soil_humidity_3: SoilMoisture,
    pub soil_after_irrigation: Option<SoilConfirmation>,
    pub emg_stop_pump1: bool,
    pub emg_stop_pump2: bool,
    pub emg_stop_pump3: bool,
    pub ip_address: Option<heapless::String<16>>,
}

impl TelemetryReport {
    pub fn new(
        snapshot: &SensorSnapshot,
        confirmation: Option<SoilConfirmation>,
        faults: FaultState,
        ip_address: Option<heapless::String<16>>,
    ) -> Self {
        let [emg_stop_pump1, emg_stop_pump2, emg_stop_pump3] = faults.flags();
        Self {
            temperature: snapshot.temperature,
            humidity: snapshot.humidity,
            is_water_empty: snapshot.is_water_empty,
            distance: snapshot.distance,
            soil_humidity_1: snapshot.soil_humidity_1,
            soil_humidity_2: snapshot.soil_humidity_2,
            soil_humidity_3: snapshot.soil_humidity_3,
            soil_after_irrigation: confirmation,
            emg_stop_pump1,
            emg_stop_pump2,
            emg_stop_pump3,
            ip_address,
        }
    }
}
