//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns every transducer and relay driver, exposing them through
//! [`TransducerPort`] and [`ActuatorPort`].  This is the only module in
//! the system that touches actual hardware.  On non-espidf targets the
//! single-wire and ultrasonic reads come from the drivers' simulation
//! hooks, and relays write the simulated GPIO bank.

use core::time::Duration;

use crate::app::ports::{ActuatorPort, TransducerPort};
use crate::config::SystemConfig;
use crate::drivers::relay::Relay;
use crate::error::SensorError;
use crate::pins;
use crate::sensors::Zone;
use crate::sensors::climate::ClimateReading;
use crate::sensors::soil::SoilProbe;
use crate::sensors::water_level::WaterLevelSensor;

#[cfg(target_os = "espidf")]
use crate::adapters::time::Esp32TimeAdapter;
#[cfg(target_os = "espidf")]
use crate::sensors::climate::Dht22;
#[cfg(target_os = "espidf")]
use crate::sensors::ultrasonic::UltrasonicRanger;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::delay::Ets;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, InputOutput, Output, PinDriver};

/// DHT22 data line, open drain.
#[cfg(target_os = "espidf")]
pub type ClimatePin = PinDriver<'static, AnyIOPin, InputOutput>;
/// HC-SR04 trigger.
#[cfg(target_os = "espidf")]
pub type TriggerPin = PinDriver<'static, AnyOutputPin, Output>;
/// HC-SR04 echo.
#[cfg(target_os = "espidf")]
pub type EchoPin = PinDriver<'static, AnyInputPin, Input>;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    soil: [SoilProbe; 3],
    water: WaterLevelSensor,
    pumps: [Relay; 3],
    fan: Relay,
    lamp: Relay,
    #[cfg(target_os = "espidf")]
    clock: Esp32TimeAdapter,
    #[cfg(target_os = "espidf")]
    dht: Dht22<ClimatePin, Ets>,
    #[cfg(target_os = "espidf")]
    ranger: UltrasonicRanger<TriggerPin, EchoPin, Ets>,
}

/// Drivers that need no HAL pin ownership.
struct Bank {
    soil: [SoilProbe; 3],
    water: WaterLevelSensor,
    pumps: [Relay; 3],
    fan: Relay,
    lamp: Relay,
}

impl Bank {
    fn new() -> Self {
        let [c1, c2, c3] = pins::SOIL_ADC_CHANNELS;
        let [p1, p2, p3] = pins::PUMP_GPIOS;
        Self {
            soil: [
                SoilProbe::new(Zone::One, c1),
                SoilProbe::new(Zone::Two, c2),
                SoilProbe::new(Zone::Three, c3),
            ],
            water: WaterLevelSensor::new(pins::WATER_EMPTY_GPIO),
            pumps: [
                Relay::new(p1, pins::PUMP_ACTIVE_LOW),
                Relay::new(p2, pins::PUMP_ACTIVE_LOW),
                Relay::new(p3, pins::PUMP_ACTIVE_LOW),
            ],
            fan: Relay::new(pins::FAN_GPIO, false),
            lamp: Relay::new(pins::LAMP_GPIO, false),
        }
    }
}

impl HardwareAdapter {
    /// Build the adapter around the HAL-owned single-wire and ranger pins.
    #[cfg(target_os = "espidf")]
    pub fn new(
        config: &SystemConfig,
        dht_pin: ClimatePin,
        trigger: TriggerPin,
        echo: EchoPin,
    ) -> Self {
        let bank = Bank::new();
        Self {
            soil: bank.soil,
            water: bank.water,
            pumps: bank.pumps,
            fan: bank.fan,
            lamp: bank.lamp,
            clock: Esp32TimeAdapter::new(),
            dht: Dht22::new(dht_pin, Ets),
            ranger: UltrasonicRanger::new(
                trigger,
                echo,
                Ets,
                Duration::from_millis(u64::from(config.echo_timeout_ms)),
            ),
        }
    }

    /// Simulation build; transducer values come from the `sim_set_*` hooks.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(config: &SystemConfig) -> Self {
        log::debug!(
            "hardware(sim): echo timeout {:?}",
            Duration::from_millis(u64::from(config.echo_timeout_ms)),
        );
        let bank = Bank::new();
        Self {
            soil: bank.soil,
            water: bank.water,
            pumps: bank.pumps,
            fan: bank.fan,
            lamp: bank.lamp,
        }
    }

    pub fn pump_on(&self, zone: Zone) -> bool {
        self.pumps[zone.index()].is_on()
    }

    pub fn fan_on(&self) -> bool {
        self.fan.is_on()
    }

    pub fn lamp_on(&self) -> bool {
        self.lamp.is_on()
    }
}

// ── TransducerPort implementation ─────────────────────────────

impl TransducerPort for HardwareAdapter {
    fn read_soil_raw(&mut self, zone: Zone) -> Result<u16, SensorError> {
        self.soil[zone.index()].read_raw()
    }

    #[cfg(target_os = "espidf")]
    fn read_climate(&mut self) -> Result<ClimateReading, SensorError> {
        self.dht.read()
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_climate(&mut self) -> Result<ClimateReading, SensorError> {
        crate::sensors::climate::sim_read_climate()
    }

    fn read_water_empty(&mut self) -> Result<bool, SensorError> {
        self.water.read_empty()
    }

    #[cfg(target_os = "espidf")]
    fn read_distance_cm(&mut self) -> Result<f32, SensorError> {
        self.ranger.measure_cm(&self.clock)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_distance_cm(&mut self) -> Result<f32, SensorError> {
        crate::sensors::ultrasonic::sim_read_distance()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_pump(&mut self, zone: Zone, on: bool) {
        self.pumps[zone.index()].set(on);
    }

    fn set_fan(&mut self, on: bool) {
        self.fan.set(on);
    }

    fn set_lamp(&mut self, on: bool) {
        self.lamp.set(on);
    }
}
