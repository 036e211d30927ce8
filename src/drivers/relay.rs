//! Relay channel driver (pumps, fan, grow lamp).
//!
//! ## Safety contract
//!
//! A pump must never run while the reservoir is empty or its zone is
//! latched.  Both are enforced by the control policy; this driver is a
//! dumb actuator that only knows the wiring polarity.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO via hw_init helpers.
//! On host/test: writes the simulated GPIO bank.

use crate::drivers::hw_init;

#[derive(Debug)]
pub struct Relay {
    gpio: i32,
    active_low: bool,
    on: bool,
}

impl Relay {
    /// Wrap an already-configured output.  The relay is assumed off.
    pub fn new(gpio: i32, active_low: bool) -> Self {
        Self {
            gpio,
            active_low,
            on: false,
        }
    }

    pub fn set(&mut self, on: bool) {
        hw_init::gpio_write(self.gpio, on != self.active_low);
        if on != self.on {
            log::debug!("relay GPIO{} -> {}", self.gpio, if on { "ON" } else { "OFF" });
        }
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}
