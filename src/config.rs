//! System configuration parameters
//!
//! All tunable parameters for the greenhouse controller.
//! Values can be overridden via the NVS config blob.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, ConfigPort};

/// Raw ADC endpoints (16-bit scale) of the capacitive soil probes.
///
/// `wet_raw` reads as 100 %, `dry_raw` as 0 %; everything in between is
/// linear and everything outside is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilCalibration {
    pub wet_raw: u16,
    pub dry_raw: u16,
}

impl Default for SoilCalibration {
    fn default() -> Self {
        Self {
            wet_raw: 18_500,
            dry_raw: 50_000,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Irrigation ---
    /// Soil moisture (%) below which a zone is irrigated
    pub soil_threshold_percent: u8,
    /// Probe calibration shared by all three zones
    pub soil_calibration: SoilCalibration,
    /// How long a pump runs per irrigation pulse (seconds)
    pub pump_run_secs: u16,
    /// Wait between pump stop and the confirming soil read (seconds)
    pub settle_delay_secs: u16,

    // --- Climate ---
    /// Fan switches on above this air temperature (Celsius)
    pub fan_temperature_c: f32,
    /// Fan switches on above this relative humidity (%)
    pub fan_humidity_percent: f32,
    /// Lamp switches off when the plant canopy is closer than this (cm)
    pub lamp_min_distance_cm: f32,

    // --- Sensing ---
    /// Deadline for the ultrasonic echo edges (milliseconds)
    pub echo_timeout_ms: u16,

    // --- Timing ---
    /// Control cycle period (seconds)
    pub cycle_period_secs: u16,
    /// Task watchdog timeout; must exceed the worst-case cycle (seconds)
    pub watchdog_timeout_secs: u16,

    // --- Networking ---
    /// Station connect attempts with stored credentials (1 s apart)
    pub station_connect_attempts: u8,
    /// Live credential test budget (seconds, polled once per second)
    pub credential_test_timeout_secs: u16,
    /// Provisioning access point SSID
    pub ap_ssid: heapless::String<32>,
    /// Provisioning access point password
    pub ap_password: heapless::String<64>,
    /// Provisioning gives up and runs offline after this long (seconds)
    pub ap_session_timeout_secs: u32,
    /// TCP port for the provisioning form and the status page
    pub http_port: u16,

    // --- Telemetry ---
    /// Plain-HTTP endpoint receiving one JSON POST per cycle
    pub telemetry_endpoint: heapless::String<128>,
    /// Request timeout for the telemetry POST (milliseconds)
    pub telemetry_timeout_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Irrigation
            soil_threshold_percent: 50,
            soil_calibration: SoilCalibration::default(),
            pump_run_secs: 6,
            settle_delay_secs: 10,

            // Climate
            fan_temperature_c: 30.0,
            fan_humidity_percent: 50.0,
            lamp_min_distance_cm: 15.0,

            // Sensing
            echo_timeout_ms: 30,

            // Timing
            cycle_period_secs: 30,
            watchdog_timeout_secs: 60,

            // Networking
            station_connect_attempts: 5,
            credential_test_timeout_secs: 10,
            ap_ssid: heapless::String::try_from("Smart-GH").unwrap_or_default(),
            ap_password: heapless::String::try_from("12345678").unwrap_or_default(),
            ap_session_timeout_secs: 900,
            http_port: 80,

            // Telemetry
            telemetry_endpoint: heapless::String::try_from("http://192.168.178.49:3000/api/data")
                .unwrap_or_default(),
            telemetry_timeout_ms: 5_000,
        }
    }
}

impl SystemConfig {
    /// Worst-case wall-clock length of one control cycle, excluding the
    /// idle wait for the next period.
    pub fn worst_case_cycle_secs(&self) -> u32 {
        let sensing_ms = 2 * u32::from(self.echo_timeout_ms) + 100;
        u32::from(self.pump_run_secs)
            + u32::from(self.settle_delay_secs)
            + (2 * sensing_ms + self.telemetry_timeout_ms).div_ceil(1000)
    }
}

/// Boot-time config: the stored record, or the defaults.  On first boot
/// the defaults are written back so the record exists for later tuning.
pub fn load_or_seed(store: &impl ConfigPort) -> SystemConfig {
    match store.load() {
        Ok(cfg) => cfg,
        Err(ConfigError::NotFound) => {
            let cfg = SystemConfig::default();
            match store.save(&cfg) {
                Ok(()) => info!("Config: first boot, defaults stored"),
                Err(e) => warn!("Config: could not store defaults ({})", e),
            }
            cfg
        }
        Err(e) => {
            warn!("Config: load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}
