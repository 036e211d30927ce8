//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop / Provisioner (domain)
//! ```
//!
//! Driven adapters (transducers, relays, radio, storage, HTTP) implement
//! these traits.  The domain consumes them via generics, so the control
//! loop and the provisioning flow never touch hardware directly.
//!
//! ## Timeouts
//!
//! Every blocking port call is bounded: transducer reads by their edge
//! deadlines, [`HttpListener::next_request`] by its `timeout` argument,
//! [`TelemetryPort::post`] by the configured request timeout.

use core::time::Duration;

use crate::config::SystemConfig;
use crate::error::{ConnectivityError, SensorError, StorageError, TelemetryError};
use crate::http::{HttpRequest, HttpResponse};
use crate::provisioning::WifiCredentials;
use crate::sensors::Zone;
use crate::sensors::climate::ClimateReading;

use super::events::{AppEvent, TelemetryReport};

// ───────────────────────────────────────────────────────────────
// Transducer port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw, uncalibrated transducer access.
pub trait TransducerPort {
    /// 16-bit-scaled soil probe sample for `zone`.
    fn read_soil_raw(&mut self, zone: Zone) -> Result<u16, SensorError>;

    /// One DHT22 exchange.
    fn read_climate(&mut self) -> Result<ClimateReading, SensorError>;

    /// Reservoir float switch; `true` = empty.
    fn read_water_empty(&mut self) -> Result<bool, SensorError>;

    /// One ultrasonic ping, lamp to canopy.
    fn read_distance_cm(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to switch relays.
pub trait ActuatorPort {
    fn set_pump(&mut self, zone: Zone, on: bool);

    fn set_fan(&mut self, on: bool);

    fn set_lamp(&mut self, on: bool);

    /// Kill every relay (safe state).
    fn all_off(&mut self) {
        for zone in Zone::ALL {
            self.set_pump(zone, false);
        }
        self.set_fan(false);
        self.set_lamp(false);
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source and blocking delay.
pub trait Clock {
    /// Time since an arbitrary fixed origin (boot on the device).
    fn now(&self) -> Duration;

    fn sleep(&mut self, d: Duration);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Network ports
// ───────────────────────────────────────────────────────────────

/// Station + access-point radio control.
///
/// `begin_connect` only starts association; callers poll
/// [`is_connected`](WifiPort::is_connected) against their own deadline.
/// Starting the station while the access point is up keeps the AP running.
pub trait WifiPort {
    fn begin_connect(&mut self, credentials: &WifiCredentials) -> Result<(), ConnectivityError>;

    fn is_connected(&self) -> bool;

    /// Drop the station link (the AP, if any, stays up).
    fn disconnect(&mut self);

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;

    fn stop_access_point(&mut self);

    /// SSIDs currently visible, strongest first.
    fn scan(&mut self) -> heapless::Vec<heapless::String<32>, 16>;

    /// Station IPv4 address in dotted form, when associated.
    fn ip_address(&self) -> Option<heapless::String<16>>;
}

/// Single-connection HTTP server: accept → handle → close.
pub trait HttpListener {
    /// Wait up to `timeout` for the next request.
    ///
    /// `Ok(None)` means nothing arrived in time.  After `Ok(Some(_))` the
    /// connection is held open until [`respond`](HttpListener::respond).
    fn next_request(&mut self, timeout: Duration) -> Result<Option<HttpRequest>, ConnectivityError>;

    /// Answer the pending request and close its connection.
    fn respond(&mut self, response: &HttpResponse) -> Result<(), ConnectivityError>;
}

/// Fire-and-forget telemetry upload.
pub trait TelemetryPort {
    fn post(&mut self, report: &TelemetryReport) -> Result<(), TelemetryError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    ///
    /// [`ConfigError::NotFound`] on first boot.  A stored record that is
    /// corrupted or out of range yields [`SystemConfig::default()`].
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage ports (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic; no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// The single Wi-Fi credentials record.
pub trait CredentialStore {
    /// `Ok(None)` when nothing has been provisioned yet.
    fn load_credentials(&self) -> Result<Option<WifiCredentials>, StorageError>;

    /// Overwrite the record.
    fn save_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
