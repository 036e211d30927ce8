//! Integration tests for `ControlLoop`.
//!
//! Drive full measure → decide → actuate → confirm → report cycles against
//! the mock adapters and the virtual clock.

use std::time::Duration;

use greenhouse::app::events::AppEvent;
use greenhouse::app::ports::Clock;
use greenhouse::app::service::{ControlLoop, CyclePhase};
use greenhouse::config::SystemConfig;
use greenhouse::error::{Error, SensorError, TelemetryError};
use greenhouse::sensors::{ChannelSet, SensorReader, SoilMoisture, Zone};

use crate::mock_hw::*;

struct Rig {
    clock: FakeClock,
    hw: MockHardware,
    uplink: MockTelemetry,
    sink: RecordingSink,
    control: ControlLoop,
}

impl Rig {
    fn new() -> Self {
        Self::with_config(&SystemConfig::default())
    }

    fn with_config(config: &SystemConfig) -> Self {
        let clock = FakeClock::new();
        let mut hw = MockHardware::new(clock.clone());
        let mut sink = RecordingSink::default();
        let mut control = ControlLoop::new(config);
        control.start(&mut hw, &mut sink);
        Self {
            clock,
            hw,
            uplink: MockTelemetry::default(),
            sink,
            control,
        }
    }

    fn cycle(&mut self) -> Duration {
        self.control
            .run_cycle(&mut self.hw, &mut self.clock, &mut self.uplink, &mut self.sink)
    }
}

// ── Irrigation and the fault latch ────────────────────────────

#[test]
fn start_parks_every_relay() {
    let rig = Rig::new();
    assert_eq!(rig.hw.calls.len(), 5);
    assert!(rig.hw.calls.iter().all(|c| !matches!(
        c,
        ActuatorCall::Pump(_, true) | ActuatorCall::Fan(true) | ActuatorCall::Lamp(true)
    )));
    assert!(matches!(rig.sink.events[0], AppEvent::Started { period_secs: 30 }));
}

#[test]
fn moist_soil_runs_no_pump() {
    let mut rig = Rig::new();
    let took = rig.cycle();

    for zone in Zone::ALL {
        assert!(!rig.hw.pump_switched_on_since(zone, 0));
    }
    assert!(!rig.control.faults().any());
    assert_eq!(took, Duration::ZERO);
    assert_eq!(rig.control.phase(), CyclePhase::Reporting);
}

#[test]
fn soil_still_dry_after_pulse_latches_zone() {
    let mut rig = Rig::new();
    rig.hw.script_soil(Zone::One, &[SOIL_30_PCT, SOIL_30_PCT]);

    let took = rig.cycle();

    assert!(rig.hw.pump_switched_on_since(Zone::One, 0));
    assert!(!rig.hw.pump_on(Zone::One));
    assert!(rig.control.faults().is_latched(Zone::One));
    assert!(!rig.control.faults().is_latched(Zone::Two));
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::FaultLatched(Zone::One))), 1);
    // Pump pulse plus settle delay.
    assert_eq!(took, Duration::from_secs(16));

    let report = &rig.uplink.posts[0];
    assert!(report.emg_stop_pump1);
    assert!(!report.emg_stop_pump2);
    assert_eq!(report.soil_humidity_1, SoilMoisture::from_percent(30));
    assert_eq!(
        report.soil_after_irrigation.map(|after| after[0]),
        Some(SoilMoisture::from_percent(30))
    );
}

#[test]
fn soil_recovering_after_pulse_does_not_latch() {
    let mut rig = Rig::new();
    rig.hw.script_soil(Zone::Two, &[SOIL_30_PCT, SOIL_60_PCT]);

    rig.cycle();

    assert!(rig.hw.pump_switched_on_since(Zone::Two, 0));
    assert!(!rig.hw.pump_on(Zone::Two));
    assert!(!rig.control.faults().any());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::FaultLatched(_))), 0);
}

#[test]
fn post_pulse_reads_are_reported_apart_from_the_snapshot() {
    let mut rig = Rig::new();
    rig.hw.script_soil(Zone::Two, &[SOIL_30_PCT, SOIL_60_PCT]);

    rig.cycle();

    // The cycle's snapshot keeps what the measurement saw.
    assert_eq!(rig.control.snapshot().soil(Zone::Two).percent(), Some(30));
    let after = rig.control.confirmation().unwrap();
    assert_eq!(after[Zone::Two.index()].percent(), Some(60));

    let report = &rig.uplink.posts[0];
    assert_eq!(report.soil_humidity_2, SoilMoisture::from_percent(30));
    assert_eq!(report.soil_after_irrigation, Some(after));

    let Some(AppEvent::CycleCompleted(cycle)) = rig.sink.events.last() else {
        panic!("cycle report missing");
    };
    assert_eq!(cycle.snapshot.soil(Zone::Two).percent(), Some(30));
    assert_eq!(cycle.confirmation, Some(after));

    // A cycle without a pulse carries no confirmation.
    rig.cycle();
    assert_eq!(rig.control.confirmation(), None);
    assert_eq!(rig.uplink.posts[1].soil_after_irrigation, None);
}

#[test]
fn latched_zone_is_never_irrigated_again() {
    let mut rig = Rig::new();
    rig.hw.script_soil(Zone::Three, &[SOIL_30_PCT, SOIL_30_PCT]);
    rig.cycle();
    assert!(rig.control.faults().is_latched(Zone::Three));

    for _ in 0..5 {
        let mark = rig.hw.calls.len();
        rig.hw.script_soil(Zone::Three, &[SOIL_30_PCT]);
        rig.cycle();
        assert!(!rig.hw.pump_switched_on_since(Zone::Three, mark));
        assert!(rig.control.faults().is_latched(Zone::Three));
    }
    // Latching is reported once, not every cycle.
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::FaultLatched(_))), 1);
}

#[test]
fn threshold_is_strictly_below() {
    let mut rig = Rig::new();
    rig.hw.script_soil(Zone::One, &[SOIL_50_PCT]);
    rig.cycle();
    assert!(!rig.hw.pump_switched_on_since(Zone::One, 0));
}

#[test]
fn empty_reservoir_blocks_irrigation_without_latching() {
    let mut rig = Rig::new();
    rig.hw.water_empty = Ok(true);
    for zone in Zone::ALL {
        rig.hw.script_soil(zone, &[SOIL_30_PCT]);
    }

    let took = rig.cycle();

    for zone in Zone::ALL {
        assert!(!rig.hw.pump_switched_on_since(zone, 0));
    }
    assert!(!rig.control.faults().any());
    assert_eq!(took, Duration::ZERO);
    assert!(rig.uplink.posts[0].is_water_empty);
}

#[test]
fn unreadable_post_pulse_soil_does_not_latch() {
    let mut rig = Rig::new();
    rig.hw.script_soil(Zone::One, &[SOIL_30_PCT]);
    rig.cycle_with_post_failure();

    assert!(!rig.control.faults().is_latched(Zone::One));
    assert!(!rig.hw.pump_on(Zone::One));
}

impl Rig {
    /// Run one cycle where zone one's probe dies right after the first read.
    fn cycle_with_post_failure(&mut self) {
        struct DyingProbe<'a>(&'a mut MockHardware, usize);
        impl greenhouse::app::ports::TransducerPort for DyingProbe<'_> {
            fn read_soil_raw(&mut self, zone: Zone) -> Result<u16, SensorError> {
                if zone == Zone::One {
                    self.1 += 1;
                    if self.1 > 1 {
                        return Err(SensorError::ReadFailed);
                    }
                }
                self.0.read_soil_raw(zone)
            }
            fn read_climate(
                &mut self,
            ) -> Result<greenhouse::sensors::climate::ClimateReading, SensorError> {
                self.0.read_climate()
            }
            fn read_water_empty(&mut self) -> Result<bool, SensorError> {
                self.0.read_water_empty()
            }
            fn read_distance_cm(&mut self) -> Result<f32, SensorError> {
                self.0.read_distance_cm()
            }
        }
        impl greenhouse::app::ports::ActuatorPort for DyingProbe<'_> {
            fn set_pump(&mut self, zone: Zone, on: bool) {
                self.0.set_pump(zone, on);
            }
            fn set_fan(&mut self, on: bool) {
                self.0.set_fan(on);
            }
            fn set_lamp(&mut self, on: bool) {
                self.0.set_lamp(on);
            }
        }

        let mut hw = DyingProbe(&mut self.hw, 0);
        self.control
            .run_cycle(&mut hw, &mut self.clock, &mut self.uplink, &mut self.sink);
    }
}

// ── Climate rules ─────────────────────────────────────────────

#[test]
fn hot_air_runs_fan_and_close_canopy_kills_lamp() {
    let mut rig = Rig::new();
    rig.hw.climate = Ok(greenhouse::sensors::climate::ClimateReading {
        temperature_c: 31.0,
        humidity_percent: 40.0,
    });
    rig.hw.distance = Ok(10.0);

    rig.cycle();

    assert!(rig.hw.fan_on());
    assert!(!rig.hw.lamp_on());
}

#[test]
fn mild_air_and_clear_canopy() {
    let mut rig = Rig::new();
    rig.cycle();
    assert!(!rig.hw.fan_on());
    assert!(rig.hw.lamp_on());
}

// ── Degraded operation ────────────────────────────────────────

#[test]
fn telemetry_failure_is_swallowed() {
    let mut rig = Rig::new();
    rig.uplink.fail_with = Some(TelemetryError::Transport);

    rig.cycle();
    rig.cycle();

    assert_eq!(rig.control.cycle_count(), 2);
    assert_eq!(rig.uplink.posts.len(), 2);
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::TelemetryDropped(Error::TelemetryUnreachable(TelemetryError::Transport))
        )),
        2
    );
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::CycleCompleted(_))), 2);
}

#[test]
fn all_sensors_timing_out_is_bounded_and_safe() {
    let mut rig = Rig::new();
    rig.hw.all_timing_out();

    let took = rig.cycle();

    // Each of the six reads costs at most one timeout.
    assert_eq!(rig.hw.reads, 6);
    assert!(took <= rig.hw.timeout_cost * 6);

    let snap = rig.control.snapshot();
    assert_eq!(snap.temperature, None);
    assert_eq!(snap.distance, None);
    assert!(snap.is_water_empty);
    for zone in Zone::ALL {
        assert!(!snap.soil(zone).is_measured());
        assert!(!rig.hw.pump_switched_on_since(zone, 0));
    }
    assert!(!rig.hw.fan_on());
    assert!(rig.hw.lamp_on());
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::SensorFault {
                error: Error::TransducerTimeout,
                ..
            }
        )),
        7
    );
}

#[test]
fn overrun_is_counted() {
    let config = SystemConfig {
        cycle_period_secs: 10,
        ..SystemConfig::default()
    };
    let mut rig = Rig::with_config(&config);
    rig.hw.script_soil(Zone::One, &[SOIL_30_PCT, SOIL_60_PCT]);

    rig.cycle();

    assert_eq!(rig.control.overruns(), 1);
    assert_eq!(rig.control.worst_case(), Duration::from_secs(16));
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::CycleOverrun { .. })), 1);
}

#[test]
fn measure_is_idempotent_on_unchanged_inputs() {
    let clock = FakeClock::new();
    let mut hw = MockHardware::new(clock);
    let reader = SensorReader::new(SystemConfig::default().soil_calibration);

    let first = reader.measure(&mut hw, ChannelSet::ALL);
    let second = reader.measure(&mut hw, ChannelSet::ALL);

    assert_eq!(first, second);
    assert!(hw.calls.is_empty());
}

// ── Status endpoint ───────────────────────────────────────────

#[test]
fn status_api_reports_latch_and_readings() {
    let mut rig = Rig::new();
    rig.hw.script_soil(Zone::One, &[SOIL_30_PCT, SOIL_30_PCT]);
    rig.cycle();

    let mut listener = MockListener::new(rig.clock.clone());
    listener.push("GET /api");
    listener.push("GET /");
    listener.push("GET /nope");
    listener.push("POST /api");

    let started = Duration::ZERO;
    rig.control
        .serve_until_next_cycle(started, &mut listener, &mut rig.clock);

    assert_eq!(listener.responses.len(), 4);
    let api: serde_json::Value = serde_json::from_str(listener.body(0)).unwrap();
    assert_eq!(listener.responses[0].content_type, "application/json");
    assert_eq!(api["cycle"], 1);
    assert_eq!(api["emergency_stop"][0], true);
    assert_eq!(api["emergency_stop"][1], false);
    assert_eq!(api["phase"], "reporting");
    assert_eq!(api["soil_after_irrigation"][0], 30);

    assert_eq!(listener.responses[1].status, 200);
    assert!(listener.body(1).contains("LOCKED OUT"));
    assert_eq!(listener.responses[2].status, 404);
    assert_eq!(listener.responses[3].status, 400);

    // Idles until one period after the cycle began.
    assert_eq!(rig.clock.now(), Duration::from_secs(30));
}

#[test]
fn overrunning_cycle_skips_the_idle_wait() {
    let config = SystemConfig {
        cycle_period_secs: 10,
        ..SystemConfig::default()
    };
    let mut rig = Rig::with_config(&config);
    rig.hw.script_soil(Zone::One, &[SOIL_30_PCT, SOIL_60_PCT]);
    let started = rig.clock.now();
    rig.cycle();
    let after_cycle = rig.clock.now();

    let mut listener = MockListener::new(rig.clock.clone());
    rig.control
        .serve_until_next_cycle(started, &mut listener, &mut rig.clock);

    assert_eq!(rig.clock.now(), after_cycle);
}
