//! Control loop, the hexagonal core of the running greenhouse.
//!
//! [`ControlLoop`] owns the latest snapshot, the fault latch and the cycle
//! metrics.  All I/O flows through port traits injected at call sites,
//! making the whole cycle testable with mock adapters and a fake clock.
//!
//! ```text
//!  TransducerPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                     │       ControlLoop        │ ──▶ TelemetryPort
//!   ActuatorPort ◀────│  Reader · Policy · Latch │ ◀─▶ HttpListener
//!                     └──────────────────────────┘
//! ```
//!
//! One cycle: MEASURING → DECIDING → ACTUATING (pulse, settle, confirm)
//! → REPORTING.  Strictly sequential; the only concurrency is the status
//! page served while waiting for the next period.

use core::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::SystemConfig;
use crate::control::ActuatorCommand;
use crate::control::policy::{ActuationPolicy, ThresholdPolicy};
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse, Method};
use crate::safety::FaultState;
use crate::sensors::{ChannelSet, Measurement, SensorReader, SensorSnapshot, Zone};

use super::events::{AppEvent, CycleReport, SoilConfirmation, TelemetryReport};
use super::ports::{ActuatorPort, Clock, EventSink, HttpListener, TelemetryPort, TransducerPort};

/// Longest single wait on the listener while idling, so the deadline is
/// re-checked regularly.
const LISTEN_SLICE: Duration = Duration::from_millis(500);

/// Phase of the cycle currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Measuring,
    Deciding,
    Actuating,
    Reporting,
}

// ───────────────────────────────────────────────────────────────
// ControlLoop
// ───────────────────────────────────────────────────────────────

pub struct ControlLoop<P: ActuationPolicy = ThresholdPolicy> {
    reader: SensorReader,
    policy: P,
    faults: FaultState,
    snapshot: SensorSnapshot,
    confirmation: Option<SoilConfirmation>,
    command: ActuatorCommand,
    phase: CyclePhase,
    pump_run: Duration,
    settle_delay: Duration,
    period: Duration,
    ip_address: Option<heapless::String<16>>,
    cycle_count: u64,
    overruns: u32,
    worst_case: Duration,
}

impl ControlLoop<ThresholdPolicy> {
    pub fn new(config: &SystemConfig) -> Self {
        Self::with_policy(config, ThresholdPolicy::from_config(config))
    }
}

impl<P: ActuationPolicy> ControlLoop<P> {
    pub fn with_policy(config: &SystemConfig, policy: P) -> Self {
        Self {
            reader: SensorReader::new(config.soil_calibration),
            policy,
            faults: FaultState::new(),
            snapshot: SensorSnapshot::default(),
            confirmation: None,
            command: ActuatorCommand::OFF,
            phase: CyclePhase::Reporting,
            pump_run: Duration::from_secs(u64::from(config.pump_run_secs)),
            settle_delay: Duration::from_secs(u64::from(config.settle_delay_secs)),
            period: Duration::from_secs(u64::from(config.cycle_period_secs)),
            ip_address: None,
            cycle_count: 0,
            overruns: 0,
            worst_case: Duration::ZERO,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Put every relay into its safe state and announce the loop.
    pub fn start(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        hw.all_off();
        self.command = ActuatorCommand::OFF;
        sink.emit(&AppEvent::Started {
            period_secs: self.period.as_secs() as u16,
        });
        info!("ControlLoop started (period {}s)", self.period.as_secs());
    }

    /// Station address reported with telemetry; `None` while offline.
    pub fn set_ip_address(&mut self, ip: Option<heapless::String<16>>) {
        self.ip_address = ip;
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full cycle: measure → decide → actuate (+ confirm) → report.
    ///
    /// Never fails: sensor faults degrade readings, telemetry faults are
    /// dropped.  Returns the cycle's wall-clock duration.
    pub fn run_cycle(
        &mut self,
        hw: &mut (impl TransducerPort + ActuatorPort),
        clock: &mut impl Clock,
        uplink: &mut impl TelemetryPort,
        sink: &mut impl EventSink,
    ) -> Duration {
        let started = clock.now();
        self.cycle_count += 1;

        // 1. Measure every channel
        self.phase = CyclePhase::Measuring;
        let measurement = self.reader.measure_detailed(hw, ChannelSet::ALL);
        report_failures(&measurement, sink);
        let snapshot = measurement.snapshot;
        let mut confirmation = None;

        // 2. Decide
        self.phase = CyclePhase::Deciding;
        let (command, faults) = self.policy.decide(&snapshot, self.faults);
        self.faults = faults;

        // 3. Actuate, then confirm any irrigation pulse
        self.phase = CyclePhase::Actuating;
        apply(hw, &command);
        self.command = command;

        if command.any_pump() {
            sink.emit(&AppEvent::IrrigationStarted {
                pumps: command.pumps,
            });
            clock.sleep(self.pump_run);
            for zone in command.irrigated_zones() {
                hw.set_pump(zone, false);
            }
            clock.sleep(self.settle_delay);

            let post = self.reader.measure_detailed(hw, ChannelSet::SOIL);
            report_failures(&post, sink);

            let before = self.faults;
            let (settled, faults) = self.policy.confirm(&command, &post.snapshot, self.faults);
            self.faults = faults;
            apply(hw, &settled);
            self.command = settled;

            for zone in Zone::ALL {
                if faults.is_latched(zone) && !before.is_latched(zone) {
                    sink.emit(&AppEvent::FaultLatched(zone));
                }
            }
            confirmation = Some(Zone::ALL.map(|zone| post.snapshot.soil(zone)));
        }
        self.snapshot = snapshot;
        self.confirmation = confirmation;

        // 4. Report
        self.phase = CyclePhase::Reporting;
        let report = TelemetryReport::new(
            &self.snapshot,
            self.confirmation,
            self.faults,
            self.ip_address.clone(),
        );
        if let Err(e) = uplink.post(&report) {
            let err = Error::from(e);
            debug!("telemetry dropped: {}", err);
            sink.emit(&AppEvent::TelemetryDropped(err));
        }

        let duration = clock.now().saturating_sub(started);
        self.worst_case = self.worst_case.max(duration);
        if duration > self.period {
            self.overruns += 1;
            warn!(
                "cycle {} overran: {}ms > {}ms",
                self.cycle_count,
                duration.as_millis(),
                self.period.as_millis()
            );
            sink.emit(&AppEvent::CycleOverrun {
                duration_ms: duration.as_millis() as u32,
            });
        }

        sink.emit(&AppEvent::CycleCompleted(CycleReport {
            cycle: self.cycle_count,
            snapshot: self.snapshot,
            confirmation: self.confirmation,
            command: self.command,
            faults: self.faults,
            duration_ms: duration.as_millis() as u32,
        }));
        duration
    }

    /// Serve status requests until one period after `cycle_started`.
    ///
    /// Returns immediately if the cycle already overran.  Listener errors
    /// are logged and the remaining time is slept away.
    pub fn serve_until_next_cycle(
        &mut self,
        cycle_started: Duration,
        listener: &mut impl HttpListener,
        clock: &mut impl Clock,
    ) {
        let deadline = cycle_started + self.period;
        loop {
            let now = clock.now();
            if now >= deadline {
                return;
            }
            let slice = (deadline - now).min(LISTEN_SLICE);
            match listener.next_request(slice) {
                Ok(Some(req)) => {
                    let resp = self.handle_request(&req);
                    if let Err(e) = listener.respond(&resp) {
                        warn!("status: response failed: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("status: listener failed ({}), idling", e);
                    let remaining = deadline.saturating_sub(clock.now());
                    clock.sleep(remaining);
                    return;
                }
            }
        }
    }

    /// Route a status-page request.
    pub fn handle_request(&self, req: &HttpRequest) -> HttpResponse {
        if req.method != Method::Get {
            return HttpResponse::bad_request();
        }
        match req.path.as_str() {
            "/api" => match serde_json::to_string(&self.status()) {
                Ok(body) => HttpResponse::json(body),
                Err(_) => HttpResponse::html(500, String::from("<h1>500</h1>")),
            },
            "/" => HttpResponse::html(200, self.status_page()),
            _ => HttpResponse::not_found(),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> StatusReport {
        StatusReport {
            cycle: self.cycle_count,
            phase: self.phase,
            snapshot: self.snapshot,
            soil_after_irrigation: self.confirmation,
            command: self.command,
            emergency_stop: self.faults.flags(),
            overruns: self.overruns,
            worst_cycle_ms: self.worst_case.as_millis() as u32,
            ip_address: self.ip_address.clone(),
        }
    }

    pub fn faults(&self) -> FaultState {
        self.faults
    }

    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    /// Soil re-read after the last cycle's pulse, if it ran one.
    pub fn confirmation(&self) -> Option<SoilConfirmation> {
        self.confirmation
    }

    pub fn command(&self) -> ActuatorCommand {
        self.command
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    pub fn worst_case(&self) -> Duration {
        self.worst_case
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    // ── Internal ──────────────────────────────────────────────

    fn status_page(&self) -> String {
        let s = &self.snapshot;
        let fmt_opt = |v: Option<f32>, unit: &str| {
            v.map_or_else(|| String::from("n/a"), |x| format!("{x:.1} {unit}"))
        };
        let mut rows = format!(
            "<tr><td>Temperature</td><td>{}</td></tr>\
             <tr><td>Humidity</td><td>{}</td></tr>\
             <tr><td>Reservoir</td><td>{}</td></tr>\
             <tr><td>Lamp distance</td><td>{}</td></tr>",
            fmt_opt(s.temperature, "&deg;C"),
            fmt_opt(s.humidity, "%"),
            if s.is_water_empty { "EMPTY" } else { "ok" },
            fmt_opt(s.distance, "cm"),
        );
        for zone in Zone::ALL {
            let soil = s
                .soil(zone)
                .percent()
                .map_or_else(|| String::from("n/a"), |p| format!("{p} %"));
            let state = if self.faults.is_latched(zone) {
                "LOCKED OUT"
            } else if self.command.pump(zone) {
                "watering"
            } else {
                "idle"
            };
            rows.push_str(&format!("<tr><td>{}</td><td>{} ({})</td></tr>", zone, soil, state));
        }
        format!(
            "<!DOCTYPE html><html><head><title>Greenhouse</title></head><body>\
             <h1>Greenhouse</h1><p>Cycle {}</p><table>{}</table></body></html>",
            self.cycle_count, rows
        )
    }
}

/// Payload of `GET /api`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub cycle: u64,
    pub phase: CyclePhase,
    pub snapshot: SensorSnapshot,
    pub soil_after_irrigation: Option<SoilConfirmation>,
    pub command: ActuatorCommand,
    pub emergency_stop: [bool; 3],
    pub overruns: u32,
    pub worst_cycle_ms: u32,
    pub ip_address: Option<heapless::String<16>>,
}

/// Translate a command into relay writes.
fn apply(hw: &mut impl ActuatorPort, cmd: &ActuatorCommand) {
    for zone in Zone::ALL {
        hw.set_pump(zone, cmd.pump(zone));
    }
    hw.set_fan(cmd.fan);
    hw.set_lamp(cmd.lamp);
}

fn report_failures(m: &Measurement, sink: &mut impl EventSink) {
    for f in &m.failures {
        sink.emit(&AppEvent::SensorFault {
            channel: f.channel,
            error: Error::from(f.error),
        });
    }
}
