//! Mock adapters for integration tests.
//!
//! Every port the control loop and the provisioner consume has an
//! in-memory stand-in here.  Time is virtual: [`FakeClock`] only moves
//! when something sleeps or a mock simulates a bounded wait, so the
//! multi-second irrigation and provisioning flows run instantly.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use greenhouse::app::events::{AppEvent, TelemetryReport};
use greenhouse::app::ports::{
    ActuatorPort, Clock, CredentialStore, EventSink, HttpListener, TelemetryPort, TransducerPort,
    WifiPort,
};
use greenhouse::error::{ConnectivityError, SensorError, StorageError, TelemetryError};
use greenhouse::http::{HttpRequest, HttpResponse, Method};
use greenhouse::provisioning::WifiCredentials;
use greenhouse::sensors::Zone;
use greenhouse::sensors::climate::ClimateReading;

/// Soil raw values (16-bit scale) for the default calibration.
pub const SOIL_30_PCT: u16 = 40_550;
pub const SOIL_50_PCT: u16 = 34_250;
pub const SOIL_60_PCT: u16 = 31_100;

// ── FakeClock ─────────────────────────────────────────────────

/// Shared virtual clock; clones observe the same time.
#[derive(Clone, Default)]
pub struct FakeClock {
    now: Rc<Cell<Duration>>,
}

#[allow(dead_code)]
impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get() + d);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&mut self, d: Duration) {
        self.advance(d);
    }
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    Pump(Zone, bool),
    Fan(bool),
    Lamp(bool),
}

/// Scripted transducers plus a relay call log.
///
/// Each soil zone replays its queue one read at a time and then repeats
/// the last value.  A failing read advances the clock by `timeout_cost`
/// to stand in for the bounded wait a real driver spends.
pub struct MockHardware {
    pub clock: FakeClock,
    pub timeout_cost: Duration,
    soil: [VecDeque<Result<u16, SensorError>>; 3],
    soil_last: [Result<u16, SensorError>; 3],
    pub climate: Result<ClimateReading, SensorError>,
    pub water_empty: Result<bool, SensorError>,
    pub distance: Result<f32, SensorError>,
    pub calls: Vec<ActuatorCall>,
    pub reads: usize,
}

#[allow(dead_code)]
impl MockHardware {
    /// Healthy greenhouse: moist soil, mild air, full reservoir, lamp clear.
    pub fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            timeout_cost: Duration::from_millis(30),
            soil: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            soil_last: [Ok(SOIL_60_PCT); 3],
            climate: Ok(ClimateReading {
                temperature_c: 22.0,
                humidity_percent: 40.0,
            }),
            water_empty: Ok(false),
            distance: Ok(40.0),
            calls: Vec::new(),
            reads: 0,
        }
    }

    /// Queue soil reads for `zone`; the last one repeats afterwards.
    pub fn script_soil(&mut self, zone: Zone, raws: &[u16]) {
        self.soil[zone.index()].extend(raws.iter().copied().map(Ok));
    }

    pub fn fail_soil(&mut self, zone: Zone, error: SensorError) {
        self.soil[zone.index()].clear();
        self.soil_last[zone.index()] = Err(error);
    }

    /// Every channel times out.
    pub fn all_timing_out(&mut self) {
        for zone in Zone::ALL {
            self.fail_soil(zone, SensorError::Timeout);
        }
        self.climate = Err(SensorError::Timeout);
        self.water_empty = Err(SensorError::Timeout);
        self.distance = Err(SensorError::Timeout);
    }

    /// Relay state after the last write (all relays start off).
    pub fn pump_on(&self, zone: Zone) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Pump(z, on) if *z == zone => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn fan_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Fan(on) => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn lamp_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Lamp(on) => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Whether `zone`'s pump was switched on at or after call index `from`.
    pub fn pump_switched_on_since(&self, zone: Zone, from: usize) -> bool {
        self.calls[from..]
            .iter()
            .any(|c| *c == ActuatorCall::Pump(zone, true))
    }

    fn settle<T>(&self, r: Result<T, SensorError>) -> Result<T, SensorError> {
        if r.is_err() {
            self.clock.advance(self.timeout_cost);
        }
        r
    }
}

impl TransducerPort for MockHardware {
    fn read_soil_raw(&mut self, zone: Zone) -> Result<u16, SensorError> {
        self.reads += 1;
        let i = zone.index();
        if let Some(next) = self.soil[i].pop_front() {
            self.soil_last[i] = next;
        }
        self.settle(self.soil_last[i])
    }

    fn read_climate(&mut self) -> Result<ClimateReading, SensorError> {
        self.reads += 1;
        self.settle(self.climate)
    }

    fn read_water_empty(&mut self) -> Result<bool, SensorError> {
        self.reads += 1;
        self.settle(self.water_empty)
    }

    fn read_distance_cm(&mut self) -> Result<f32, SensorError> {
        self.reads += 1;
        self.settle(self.distance)
    }
}

impl ActuatorPort for MockHardware {
    fn set_pump(&mut self, zone: Zone, on: bool) {
        self.calls.push(ActuatorCall::Pump(zone, on));
    }

    fn set_fan(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Fan(on));
    }

    fn set_lamp(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Lamp(on));
    }
}

// ── MockTelemetry ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockTelemetry {
    pub posts: Vec<TelemetryReport>,
    pub fail_with: Option<TelemetryError>,
}

impl TelemetryPort for MockTelemetry {
    fn post(&mut self, report: &TelemetryReport) -> Result<(), TelemetryError> {
        self.posts.push(report.clone());
        match self.fail_with {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockListener ──────────────────────────────────────────────

/// Serves queued requests, then idles out each wait on the fake clock.
pub struct MockListener {
    clock: FakeClock,
    requests: VecDeque<HttpRequest>,
    pub responses: Vec<HttpResponse>,
    pending: bool,
}

#[allow(dead_code)]
impl MockListener {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            requests: VecDeque::new(),
            responses: Vec::new(),
            pending: false,
        }
    }

    /// Queue `"METHOD /target"`.
    pub fn push(&mut self, line: &str) {
        let (method, target) = line.split_once(' ').expect("test request needs a method");
        let req = HttpRequest::new(Method::from_name(method), target)
            .expect("test request must parse");
        self.requests.push_back(req);
    }

    pub fn body(&self, i: usize) -> &str {
        &self.responses[i].body
    }
}

impl HttpListener for MockListener {
    fn next_request(&mut self, timeout: Duration) -> Result<Option<HttpRequest>, ConnectivityError> {
        self.pending = false;
        match self.requests.pop_front() {
            Some(req) => {
                self.pending = true;
                Ok(Some(req))
            }
            None => {
                self.clock.advance(timeout);
                Ok(None)
            }
        }
    }

    fn respond(&mut self, response: &HttpResponse) -> Result<(), ConnectivityError> {
        if !std::mem::take(&mut self.pending) {
            return Err(ConnectivityError::ListenerFailed);
        }
        self.responses.push(response.clone());
        Ok(())
    }
}

// ── MockWifi ──────────────────────────────────────────────────

/// Radio that associates only with listed networks and matching passwords.
///
/// Association completes `association_delay` after `begin_connect` on
/// the shared clock; calling `begin_connect` again restarts it, as the
/// real driver does.
#[derive(Default)]
pub struct MockWifi {
    pub networks: Vec<(String, String)>,
    pub clock: FakeClock,
    pub association_delay: Duration,
    associated_at: Option<Duration>,
    pub ap_up: bool,
    pub ap_started: usize,
    pub ap_fails: bool,
    pub connect_calls: usize,
}

#[allow(dead_code)]
impl MockWifi {
    pub fn with_network(ssid: &str, password: &str) -> Self {
        Self {
            networks: vec![(ssid.into(), password.into())],
            ..Self::default()
        }
    }
}

impl WifiPort for MockWifi {
    fn begin_connect(&mut self, credentials: &WifiCredentials) -> Result<(), ConnectivityError> {
        self.connect_calls += 1;
        let known = self.networks.iter().any(|(s, p)| {
            s.as_str() == credentials.ssid.as_str() && p.as_str() == credentials.password.as_str()
        });
        self.associated_at = known.then(|| self.clock.now() + self.association_delay);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.associated_at.is_some_and(|at| self.clock.now() >= at)
    }

    fn disconnect(&mut self) {
        self.associated_at = None;
    }

    fn start_access_point(&mut self, _ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        if self.ap_fails {
            return Err(ConnectivityError::AccessPointFailed);
        }
        self.ap_up = true;
        self.ap_started += 1;
        Ok(())
    }

    fn stop_access_point(&mut self) {
        self.ap_up = false;
    }

    fn scan(&mut self) -> heapless::Vec<heapless::String<32>, 16> {
        self.networks
            .iter()
            .filter_map(|(s, _)| heapless::String::try_from(s.as_str()).ok())
            .take(16)
            .collect()
    }

    fn ip_address(&self) -> Option<heapless::String<16>> {
        if self.is_connected() {
            heapless::String::try_from("192.168.1.50").ok()
        } else {
            None
        }
    }
}

// ── MockStore ─────────────────────────────────────────────────

/// Credential record that can refuse the next `failing_writes` saves.
#[derive(Default)]
pub struct MockStore {
    pub record: Option<WifiCredentials>,
    pub failing_writes: u32,
    pub write_attempts: u32,
}

#[allow(dead_code)]
impl MockStore {
    pub fn holding(ssid: &str, password: &str) -> Self {
        Self {
            record: Some(WifiCredentials::new(ssid, password).expect("valid test credentials")),
            ..Self::default()
        }
    }
}

impl CredentialStore for MockStore {
    fn load_credentials(&self) -> Result<Option<WifiCredentials>, StorageError> {
        Ok(self.record.clone())
    }

    fn save_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), StorageError> {
        self.write_attempts += 1;
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(StorageError::IoError);
        }
        self.record = Some(credentials.clone());
        Ok(())
    }
}
