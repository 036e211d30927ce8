//! Sensor subsystem: individual drivers and the aggregating [`SensorReader`].
//!
//! The reader pulls raw samples through the
//! [`TransducerPort`](crate::app::ports::TransducerPort), normalises them
//! into calibrated physical values and produces one immutable
//! [`SensorSnapshot`] per call.  A channel that fails never aborts the
//! measurement: it is reported and substituted with its "unavailable" value.

pub mod climate;
pub mod soil;
pub mod ultrasonic;
pub mod water_level;

use core::fmt;
use core::time::Duration;

use embedded_hal::digital::InputPin;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::{Clock, TransducerPort};
use crate::config::SoilCalibration;
use crate::error::SensorError;

// ───────────────────────────────────────────────────────────────
// Zones and channels
// ───────────────────────────────────────────────────────────────

/// Irrigation zone; each has one soil probe and one pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    One,
    Two,
    Three,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::One, Zone::Two, Zone::Three];

    pub const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
        }
    }

    /// 1-based zone number, as printed on the relay board.
    pub const fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone{}", self.number())
    }
}

/// One measurable quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Temperature,
    Humidity,
    WaterEmpty,
    Distance,
    Soil(Zone),
}

impl Channel {
    const fn mask(self) -> u8 {
        match self {
            Self::Temperature => 0b0000_0001,
            Self::Humidity => 0b0000_0010,
            Self::WaterEmpty => 0b0000_0100,
            Self::Distance => 0b0000_1000,
            Self::Soil(zone) => 0b0001_0000 << zone.index(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temperature => write!(f, "temperature"),
            Self::Humidity => write!(f, "humidity"),
            Self::WaterEmpty => write!(f, "is_water_empty"),
            Self::Distance => write!(f, "distance"),
            Self::Soil(zone) => write!(f, "soil_humidity_{}", zone.number()),
        }
    }
}

/// Set of channels selected for one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSet(u8);

impl ChannelSet {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b0111_1111);
    pub const SOIL: Self = Self(0b0111_0000);

    pub const fn with(self, channel: Channel) -> Self {
        Self(self.0 | channel.mask())
    }

    pub const fn contains(self, channel: Channel) -> bool {
        self.0 & channel.mask() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// ───────────────────────────────────────────────────────────────
// Values
// ───────────────────────────────────────────────────────────────

/// Soil moisture in percent, or the `-1` sentinel when not measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoilMoisture(i8);

impl SoilMoisture {
    pub const UNMEASURED: Self = Self(-1);

    pub fn from_percent(percent: u8) -> Self {
        Self(percent.min(100) as i8)
    }

    pub fn percent(self) -> Option<u8> {
        u8::try_from(self.0).ok()
    }

    pub fn is_measured(self) -> bool {
        self.0 >= 0
    }

    /// Raw wire value (`-1..=100`).
    pub fn raw(self) -> i8 {
        self.0
    }
}

impl Default for SoilMoisture {
    fn default() -> Self {
        Self::UNMEASURED
    }
}

/// Result of one measurement pass.  Immutable once produced.
///
/// Unselected or failed channels carry their "unavailable" value:
/// `None` for the optional readings, [`SoilMoisture::UNMEASURED`] for soil
/// and `true` for `is_water_empty` so an unknown reservoir never irrigates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub is_water_empty: bool,
    pub distance: Option<f32>,
    pub soil_humidity_1: SoilMoisture,
    pub soil_humidity_2: SoilMoisture,
    pub soil_humidity_3: SoilMoisture,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            temperature: None,
            humidity: None,
            is_water_empty: true,
            distance: None,
            soil_humidity_1: SoilMoisture::UNMEASURED,
            soil_humidity_2: SoilMoisture::UNMEASURED,
            soil_humidity_3: SoilMoisture::UNMEASURED,
        }
    }
}

impl SensorSnapshot {
    pub fn soil(&self, zone: Zone) -> SoilMoisture {
        match zone {
            Zone::One => self.soil_humidity_1,
            Zone::Two => self.soil_humidity_2,
            Zone::Three => self.soil_humidity_3,
        }
    }

    pub fn set_soil(&mut self, zone: Zone, value: SoilMoisture) {
        match zone {
            Zone::One => self.soil_humidity_1 = value,
            Zone::Two => self.soil_humidity_2 = value,
            Zone::Three => self.soil_humidity_3 = value,
        }
    }
}

/// A channel that could not be read during a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFailure {
    pub channel: Channel,
    pub error: SensorError,
}

/// Snapshot plus the list of channels that failed while producing it.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub snapshot: SensorSnapshot,
    pub failures: heapless::Vec<ChannelFailure, 7>,
}

// ───────────────────────────────────────────────────────────────
// SensorReader
// ───────────────────────────────────────────────────────────────

/// Turns raw transducer samples into a calibrated [`SensorSnapshot`].
pub struct SensorReader {
    calibration: SoilCalibration,
}

impl SensorReader {
    pub fn new(calibration: SoilCalibration) -> Self {
        Self { calibration }
    }

    /// Measure the selected channels and return the snapshot.
    pub fn measure(&self, hw: &mut impl TransducerPort, selected: ChannelSet) -> SensorSnapshot {
        self.measure_detailed(hw, selected).snapshot
    }

    /// Measure the selected channels, also reporting which ones failed.
    pub fn measure_detailed(
        &self,
        hw: &mut impl TransducerPort,
        selected: ChannelSet,
    ) -> Measurement {
        let mut snapshot = SensorSnapshot::default();
        let mut failures = heapless::Vec::new();
        let mut fail = |channel: Channel, error: SensorError| {
            warn!("sensor {}: {}, reading unavailable", channel, error);
            // Capacity equals the channel count, so the push cannot overflow.
            let _ = failures.push(ChannelFailure { channel, error });
        };

        // One DHT22 frame carries both climate channels.
        let want_temp = selected.contains(Channel::Temperature);
        let want_hum = selected.contains(Channel::Humidity);
        if want_temp || want_hum {
            match hw.read_climate() {
                Ok(reading) => {
                    if want_temp {
                        snapshot.temperature = Some(reading.temperature_c);
                    }
                    if want_hum {
                        snapshot.humidity = Some(reading.humidity_percent);
                    }
                }
                Err(e) => {
                    if want_temp {
                        fail(Channel::Temperature, e);
                    }
                    if want_hum {
                        fail(Channel::Humidity, e);
                    }
                }
            }
        }

        if selected.contains(Channel::WaterEmpty) {
            match hw.read_water_empty() {
                Ok(empty) => snapshot.is_water_empty = empty,
                Err(e) => fail(Channel::WaterEmpty, e),
            }
        }

        if selected.contains(Channel::Distance) {
            match hw.read_distance_cm() {
                Ok(cm) => snapshot.distance = Some(cm),
                Err(e) => fail(Channel::Distance, e),
            }
        }

        for zone in Zone::ALL {
            if !selected.contains(Channel::Soil(zone)) {
                continue;
            }
            match hw.read_soil_raw(zone) {
                Ok(raw) => {
                    let pct = soil::soil_percent(raw, &self.calibration);
                    snapshot.set_soil(zone, SoilMoisture::from_percent(pct));
                }
                Err(e) => fail(Channel::Soil(zone), e),
            }
        }

        Measurement { snapshot, failures }
    }
}

// ───────────────────────────────────────────────────────────────
// Bounded edge wait
// ───────────────────────────────────────────────────────────────

/// Poll `pin` until it reads `high`, or fail with [`SensorError::Timeout`]
/// once `timeout` has elapsed on `clock`.
///
/// Returns the time spent waiting.  The clock must be monotonic; the pin is
/// sampled at least once even with a zero timeout.
pub fn wait_for_level<P, C>(
    pin: &mut P,
    high: bool,
    timeout: Duration,
    clock: &C,
) -> Result<Duration, SensorError>
where
    P: InputPin,
    C: Clock + ?Sized,
{
    let start = clock.now();
    loop {
        let level = pin.is_high().map_err(|_| SensorError::ReadFailed)?;
        let elapsed = clock.now().saturating_sub(start);
        if level == high {
            return Ok(elapsed);
        }
        if elapsed >= timeout {
            return Err(SensorError::Timeout);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted pin and fake clock shared by the driver unit tests.

    use core::cell::Cell;
    use core::convert::Infallible;
    use core::time::Duration;
    use std::rc::Rc;

    use embedded_hal::delay::DelayNs;
    use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

    use crate::app::ports::Clock;

    /// Virtual microsecond clock shared between pins, delays and drivers.
    #[derive(Clone, Default)]
    pub struct FakeClock(pub Rc<Cell<u64>>);

    impl FakeClock {
        pub fn advance_us(&self, us: u64) {
            self.0.set(self.0.get() + us);
        }

        pub fn micros(&self) -> u64 {
            self.0.get()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Duration {
            Duration::from_micros(self.0.get())
        }

        fn sleep(&mut self, d: Duration) {
            self.advance_us(d.as_micros() as u64);
        }
    }

    impl DelayNs for FakeClock {
        fn delay_ns(&mut self, ns: u32) {
            self.advance_us(u64::from(ns).div_ceil(1000));
        }
    }

    /// Input pin that replays `(level, duration_us)` segments against the
    /// fake clock.  Each sample costs one microsecond; after the script ends
    /// the last level is held forever.
    pub struct ScriptedPin {
        clock: FakeClock,
        segments: Vec<(bool, u64)>,
        origin: Option<u64>,
        pub writes: Vec<bool>,
    }

    impl ScriptedPin {
        pub fn new(clock: FakeClock, segments: Vec<(bool, u64)>) -> Self {
            Self {
                clock,
                segments,
                origin: None,
                writes: Vec::new(),
            }
        }

        /// Holds one level forever.
        pub fn stuck(clock: FakeClock, high: bool) -> Self {
            Self::new(clock, vec![(high, u64::MAX / 2)])
        }

        fn level(&mut self) -> bool {
            let origin = *self.origin.get_or_insert(self.clock.micros());
            let mut t = self.clock.micros() - origin;
            for &(level, len) in &self.segments {
                if t < len {
                    return level;
                }
                t -= len;
            }
            self.segments.last().is_some_and(|s| s.0)
        }
    }

    impl ErrorType for ScriptedPin {
        type Error = Infallible;
    }

    impl InputPin for ScriptedPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            let level = self.level();
            self.clock.advance_us(1);
            Ok(level)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|h| !h)
        }
    }

    impl OutputPin for ScriptedPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.writes.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.writes.push(true);
            // The script starts when the host releases the line.
            self.origin = Some(self.clock.micros());
            Ok(())
        }
    }
}
