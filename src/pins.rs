//! GPIO / peripheral pin assignments for the greenhouse controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Soil moisture probes (capacitive, ADC1)
// ---------------------------------------------------------------------------

/// Zone 1 probe, GPIO 4 = ADC1 channel 3 on ESP32-S3.
pub const SOIL_1_GPIO: i32 = 4;
/// Zone 2 probe, GPIO 5 = ADC1 channel 4.
pub const SOIL_2_GPIO: i32 = 5;
/// Zone 3 probe, GPIO 6 = ADC1 channel 5.
pub const SOIL_3_GPIO: i32 = 6;

pub const SOIL_ADC_CHANNELS: [u32; 3] = [3, 4, 5];

// ---------------------------------------------------------------------------
// Digital sensors
// ---------------------------------------------------------------------------

/// DHT22 single-wire data line (open drain, external pull-up).
pub const DHT_GPIO: i32 = 14;

/// Reservoir float switch. HIGH = reservoir empty.
pub const WATER_EMPTY_GPIO: i32 = 15;

/// HC-SR04 trigger output.
pub const ULTRASONIC_TRIG_GPIO: i32 = 16;
/// HC-SR04 echo input (through a 5 V → 3.3 V divider).
pub const ULTRASONIC_ECHO_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// Relay board
// ---------------------------------------------------------------------------

/// Pump relays, one per zone. The relay board is active LOW.
pub const PUMP_GPIOS: [i32; 3] = [38, 39, 40];
pub const PUMP_ACTIVE_LOW: bool = true;

/// Grow lamp relay (active HIGH).
pub const LAMP_GPIO: i32 = 41;
/// Ventilation fan relay (active HIGH).
pub const FAN_GPIO: i32 = 42;
