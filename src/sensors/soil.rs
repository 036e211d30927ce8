//! Capacitive soil moisture probes, one per irrigation zone.
//!
//! The probes output a voltage that *falls* as the soil gets wetter.  The
//! ESP32 ADC is 12-bit; samples are scaled to the 16-bit range the
//! calibration constants are expressed in.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: oneshot ADC1 reads via hw_init helpers.
//! On host/test: raw values injected with [`sim_set_soil_raw`].

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

use crate::config::SoilCalibration;
use crate::error::SensorError;
use crate::sensors::Zone;

#[cfg(not(target_os = "espidf"))]
static SIM_SOIL_RAW: [AtomicU16; 3] = [
    AtomicU16::new(40_000),
    AtomicU16::new(40_000),
    AtomicU16::new(40_000),
];

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_soil_raw(zone: Zone, raw: u16) {
    SIM_SOIL_RAW[zone.index()].store(raw, Ordering::Relaxed);
}

/// Map a 16-bit raw probe sample to moisture percent.
///
/// `clamp(round(100 * (1 - (raw - wet) / (dry - wet))), 0, 100)`; the result
/// never increases as `raw` increases.
pub fn soil_percent(raw: u16, cal: &SoilCalibration) -> u8 {
    if cal.dry_raw <= cal.wet_raw {
        return 0;
    }
    let span = f32::from(cal.dry_raw - cal.wet_raw);
    let fraction = (f32::from(raw) - f32::from(cal.wet_raw)) / span;
    (100.0 * (1.0 - fraction)).round().clamp(0.0, 100.0) as u8
}

/// Scale a 12-bit ADC sample to the 16-bit calibration range.
pub fn scale_adc12(raw12: u16) -> u16 {
    raw12.min(0x0FFF) << 4
}

pub struct SoilProbe {
    zone: Zone,
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    adc_channel: u32,
}

impl SoilProbe {
    pub fn new(zone: Zone, adc_channel: u32) -> Self {
        Self { zone, adc_channel }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    #[cfg(target_os = "espidf")]
    pub fn read_raw(&self) -> Result<u16, SensorError> {
        crate::drivers::hw_init::adc1_read(self.adc_channel)
            .map(scale_adc12)
            .ok_or(SensorError::ReadFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn read_raw(&self) -> Result<u16, SensorError> {
        Ok(SIM_SOIL_RAW[self.zone.index()].load(Ordering::Relaxed))
    }
}
