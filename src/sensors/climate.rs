//! DHT22 (AM2302) air temperature / humidity transducer.
//!
//! The single-wire exchange is done by `dht_sensor`, whose edge waits
//! are bounded, so a disconnected sensor fails with a timeout instead of
//! hanging the cycle.  This module releases the line, maps the driver's
//! errors onto [`SensorError`] and rejects physically implausible values.
//!
//! ## Dual-target design
//!
//! [`Dht22`] is generic over embedded-hal pins and runs on both targets.
//! The hardware adapter only builds it on ESP-IDF; host simulation injects
//! readings with [`sim_set_climate`].

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};

use dht_sensor::{DhtError, dht22};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::debug;

use crate::error::SensorError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_percent: f32,
}

impl ClimateReading {
    /// Accept a reading only inside the DHT22's rated range.
    pub fn checked(temperature_c: f32, humidity_percent: f32) -> Result<Self, SensorError> {
        if !(0.0..=100.0).contains(&humidity_percent) || !(-40.0..=80.0).contains(&temperature_c)
        {
            return Err(SensorError::OutOfRange);
        }
        Ok(Self {
            temperature_c,
            humidity_percent,
        })
    }
}

pub fn map_error<E: core::fmt::Debug>(e: DhtError<E>) -> SensorError {
    match e {
        DhtError::Timeout => SensorError::Timeout,
        DhtError::ChecksumMismatch => SensorError::ChecksumMismatch,
        other => {
            debug!("DHT22: {:?}", other);
            SensorError::ReadFailed
        }
    }
}

pub struct Dht22<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    /// Run one start/response/40-bit exchange.
    pub fn read(&mut self) -> Result<ClimateReading, SensorError> {
        self.pin.set_high().map_err(|_| SensorError::ReadFailed)?;
        let result = dht22::blocking::read(&mut self.delay, &mut self.pin);
        // Leave the line released whatever happened.
        let _ = self.pin.set_high();
        let reading = result.map_err(map_error)?;
        ClimateReading::checked(reading.temperature, reading.relative_humidity)
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
const SIM_NONE: u32 = u32::MAX;

#[cfg(not(target_os = "espidf"))]
static SIM_TEMP_BITS: AtomicU32 = AtomicU32::new(0x41B4_0000); // 22.5
#[cfg(not(target_os = "espidf"))]
static SIM_HUM_BITS: AtomicU32 = AtomicU32::new(0x4220_0000); // 40.0

/// Inject the simulated reading; `None` simulates an unresponsive sensor.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_climate(reading: Option<ClimateReading>) {
    match reading {
        Some(r) => {
            SIM_TEMP_BITS.store(r.temperature_c.to_bits(), Ordering::Relaxed);
            SIM_HUM_BITS.store(r.humidity_percent.to_bits(), Ordering::Relaxed);
        }
        None => {
            SIM_TEMP_BITS.store(SIM_NONE, Ordering::Relaxed);
            SIM_HUM_BITS.store(SIM_NONE, Ordering::Relaxed);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_read_climate() -> Result<ClimateReading, SensorError> {
    let t = SIM_TEMP_BITS.load(Ordering::Relaxed);
    let h = SIM_HUM_BITS.load(Ordering::Relaxed);
    if t == SIM_NONE || h == SIM_NONE {
        return Err(SensorError::Timeout);
    }
    Ok(ClimateReading {
        temperature_c: f32::from_bits(t),
        humidity_percent: f32::from_bits(h),
    })
}
