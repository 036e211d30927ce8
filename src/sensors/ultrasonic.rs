//! HC-SR04 ultrasonic ranger measuring lamp-to-canopy distance.
//!
//! A 10 µs trigger pulse starts a burst; the echo line then stays high for
//! the round-trip time.  Both echo edges are awaited with a deadline so a
//! disconnected or stuck echo line yields [`SensorError::Timeout`] instead
//! of hanging the control loop.
//!
//! ## Dual-target design
//!
//! [`UltrasonicRanger`] is generic over embedded-hal pins.  The hardware
//! adapter only builds it on ESP-IDF; host simulation injects distances
//! with [`sim_set_distance`].

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::Clock;
use crate::error::SensorError;
use crate::sensors::wait_for_level;

/// Speed of sound, cm per µs, at roughly 20 °C.
const SOUND_CM_PER_US: f32 = 0.034_32;
/// HC-SR04 datasheet maximum.
const MAX_RANGE_CM: f32 = 400.0;

/// Convert echo pulse width to one-way distance.
pub fn echo_to_cm(width: Duration) -> f32 {
    width.as_micros() as f32 * SOUND_CM_PER_US / 2.0
}

pub struct UltrasonicRanger<T, E, D> {
    trigger: T,
    echo: E,
    delay: D,
    echo_timeout: Duration,
}

impl<T, E, D> UltrasonicRanger<T, E, D>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
{
    pub fn new(trigger: T, echo: E, delay: D, echo_timeout: Duration) -> Self {
        Self {
            trigger,
            echo,
            delay,
            echo_timeout,
        }
    }

    /// Fire one ping and return the distance in centimetres.
    ///
    /// Takes at most about twice the echo timeout.
    pub fn measure_cm<C: Clock + ?Sized>(&mut self, clock: &C) -> Result<f32, SensorError> {
        self.trigger.set_low().map_err(|_| SensorError::ReadFailed)?;
        self.delay.delay_us(2);
        self.trigger.set_high().map_err(|_| SensorError::ReadFailed)?;
        self.delay.delay_us(10);
        self.trigger.set_low().map_err(|_| SensorError::ReadFailed)?;

        wait_for_level(&mut self.echo, true, self.echo_timeout, clock)?;
        let width = wait_for_level(&mut self.echo, false, self.echo_timeout, clock)?;

        let cm = echo_to_cm(width);
        if cm > MAX_RANGE_CM {
            return Err(SensorError::OutOfRange);
        }
        Ok(cm)
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
const SIM_NONE: u32 = u32::MAX;

#[cfg(not(target_os = "espidf"))]
static SIM_DISTANCE_BITS: AtomicU32 = AtomicU32::new(0x41F0_0000); // 30.0

/// Inject the simulated distance; `None` simulates a stuck echo line.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_distance(cm: Option<f32>) {
    let bits = cm.map_or(SIM_NONE, f32::to_bits);
    SIM_DISTANCE_BITS.store(bits, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_read_distance() -> Result<f32, SensorError> {
    match SIM_DISTANCE_BITS.load(Ordering::Relaxed) {
        SIM_NONE => Err(SensorError::Timeout),
        bits => Ok(f32::from_bits(bits)),
    }
}
