//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements       | Connects to                   |
//! |---------------|------------------|-------------------------------|
//! | `hardware`    | TransducerPort   | ESP32 ADC, GPIO, DHT22, HC-SR04 |
//! |               | ActuatorPort     | Relay board GPIO              |
//! | `http_server` | HttpListener     | EspHttpServer, request queue  |
//! | `log_sink`    | EventSink        | Serial log output             |
//! | `nvs`         | ConfigPort       | NVS / in-memory store         |
//! |               | StoragePort      |                               |
//! |               | CredentialStore  | "auth" namespace, JSON record |
//! | `telemetry`   | TelemetryPort    | ESP-IDF HTTP client           |
//! | `time`        | Clock            | ESP32 system timer            |
//! | `wifi`        | WifiPort         | ESP-IDF Wi-Fi STA + AP        |

pub mod device_id;
pub mod hardware;
pub mod http_server;
pub mod log_sink;
pub mod nvs;
pub mod telemetry;
pub mod time;
pub mod wifi;
