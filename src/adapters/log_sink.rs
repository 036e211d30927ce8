//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::sensors::SoilMoisture;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn opt(v: Option<f32>) -> String {
    v.map_or_else(|| String::from("--"), |x| format!("{x:.1}"))
}

fn soil(v: SoilMoisture) -> String {
    v.percent()
        .map_or_else(|| String::from("--"), |p| format!("{p}%"))
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { period_secs } => {
                info!("START | control loop, period={}s", period_secs);
            }
            AppEvent::SensorFault { channel, error } => {
                warn!("SENSE | {} unavailable: {}", channel, error);
            }
            AppEvent::IrrigationStarted { pumps } => {
                info!(
                    "PUMP  | pulse on zones [{}{}{}]",
                    if pumps[0] { '1' } else { '-' },
                    if pumps[1] { '2' } else { '-' },
                    if pumps[2] { '3' } else { '-' },
                );
            }
            AppEvent::FaultLatched(zone) => {
                warn!("FAULT | {} pump locked out until restart", zone);
            }
            AppEvent::TelemetryDropped(e) => {
                info!("TELEM | dropped: {}", e);
            }
            AppEvent::CycleOverrun { duration_ms } => {
                warn!("CYCLE | overrun, took {}ms", duration_ms);
            }
            AppEvent::CycleCompleted(r) => {
                let s = &r.snapshot;
                info!(
                    "CYCLE | #{} {}ms | T={}\u{00b0}C RH={}% dist={}cm water={} | \
                     soil={}/{}/{} | pumps={:?} fan={} lamp={} | latch=0b{:03b}",
                    r.cycle,
                    r.duration_ms,
                    opt(s.temperature),
                    opt(s.humidity),
                    opt(s.distance),
                    if s.is_water_empty { "EMPTY" } else { "ok" },
                    soil(s.soil_humidity_1),
                    soil(s.soil_humidity_2),
                    soil(s.soil_humidity_3),
                    r.command.pumps,
                    r.command.fan,
                    r.command.lamp,
                    r.faults.mask(),
                );
                if let Some([a, b, c]) = r.confirmation {
                    info!("CYCLE | soil after pulse={}/{}/{}", soil(a), soil(b), soil(c));
                }
            }
            AppEvent::Provisioning(state) => {
                info!("PROV  | -> {:?}", state);
            }
            AppEvent::CredentialsRejected(e) => {
                warn!("PROV  | credentials rejected: {}", e);
            }
            AppEvent::PersistenceFailed(e) => {
                warn!("PROV  | credentials not stored: {}", e);
            }
            AppEvent::ProvisioningFinished(outcome) => {
                info!("PROV  | finished: {:?}", outcome);
            }
        }
    }
}
