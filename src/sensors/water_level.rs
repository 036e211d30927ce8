//! Reservoir float switch.
//!
//! A single digital input: HIGH when the reservoir feeding the pumps is
//! empty.  The pin is configured as a pulled-down input, so a broken wire
//! reads as "water present"; the control policy additionally treats a
//! failed read as empty.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the GPIO level via hw_init helpers.
//! On host/test: defaults to water-present.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::SensorError;

#[cfg(not(target_os = "espidf"))]
static SIM_WATER_EMPTY: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_water_empty(empty: bool) {
    SIM_WATER_EMPTY.store(empty, Ordering::Relaxed);
}

pub struct WaterLevelSensor {
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    gpio: i32,
    last_empty: Option<bool>,
}

impl WaterLevelSensor {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            last_empty: None,
        }
    }

    pub fn read_empty(&mut self) -> Result<bool, SensorError> {
        let empty = self.read_gpio();
        if self.last_empty != Some(empty) {
            log::info!("Reservoir: {}", if empty { "EMPTY" } else { "ok" });
        }
        self.last_empty = Some(empty);
        Ok(empty)
    }

    #[cfg(target_os = "espidf")]
    fn read_gpio(&self) -> bool {
        crate::drivers::hw_init::gpio_read(self.gpio)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_gpio(&self) -> bool {
        SIM_WATER_EMPTY.load(Ordering::Relaxed)
    }
}
