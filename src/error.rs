//! Unified error types for the greenhouse firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's and the provisioning flow's error handling uniform.
//! All variants are `Copy` so they travel through events and cycle
//! reports without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transducer did not answer within its deadline.
    TransducerTimeout,
    /// A transducer answered with unusable data.
    Sensor(SensorError),
    /// The station link could not be brought up.
    NetworkUnavailable(ConnectivityError),
    /// Submitted Wi-Fi credentials were malformed or rejected by the AP.
    CredentialInvalid(CredentialError),
    /// The credentials or config record could not be written.
    PersistenceFailure(StorageError),
    /// The telemetry endpoint could not be reached.
    TelemetryUnreachable(TelemetryError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransducerTimeout => write!(f, "transducer timeout"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::NetworkUnavailable(e) => write!(f, "network unavailable: {e}"),
            Self::CredentialInvalid(e) => write!(f, "credential invalid: {e}"),
            Self::PersistenceFailure(e) => write!(f, "persistence failure: {e}"),
            Self::TelemetryUnreachable(e) => write!(f, "telemetry unreachable: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// An edge or level never arrived before the deadline.
    Timeout,
    /// ADC or GPIO access returned an error.
    ReadFailed,
    /// DHT22 frame checksum did not match.
    ChecksumMismatch,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::Timeout => Self::TransducerTimeout,
            other => Self::Sensor(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// No credentials stored yet.
    NoCredentials,
    /// The station did not associate within the retry budget.
    ConnectionFailed,
    /// The provisioning access point could not be started.
    AccessPointFailed,
    /// The HTTP listener socket failed.
    ListenerFailed,
    /// The radio driver rejected the configuration.
    DriverError,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AccessPointFailed => write!(f, "access point start failed"),
            Self::ListenerFailed => write!(f, "HTTP listener failed"),
            Self::DriverError => write!(f, "WiFi driver error"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::NetworkUnavailable(e)
    }
}

// ---------------------------------------------------------------------------
// Credential errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    InvalidSsid,
    InvalidPassword,
    /// Well-formed, but the live connection test did not succeed.
    Rejected,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::Rejected => write!(f, "network did not accept the credentials"),
        }
    }
}

impl From<CredentialError> for Error {
    fn from(e: CredentialError) -> Self {
        Self::CredentialInvalid(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from [`StoragePort`](crate::app::ports::StoragePort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored bytes failed to decode.
    Corrupted,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored record corrupted"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::PersistenceFailure(e)
    }
}

// ---------------------------------------------------------------------------
// Telemetry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// Payload could not be serialised.
    Encode,
    /// Connection could not be opened or the request could not be sent.
    Transport,
    /// Endpoint answered with a non-2xx status.
    Status(u16),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "payload encode failed"),
            Self::Transport => write!(f, "transport failed"),
            Self::Status(code) => write!(f, "HTTP {code}"),
        }
    }
}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::TelemetryUnreachable(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
