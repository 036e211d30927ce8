//! Telemetry uplink adapter.
//!
//! Implements [`TelemetryPort`]: one JSON `POST` per control cycle to the
//! configured plain-HTTP endpoint, authenticated with an `apiKey` header
//! carrying the device id.  Uploads are fire-and-forget; the caller only
//! logs failures.
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` wrapped in the
//!   blocking `embedded_svc` client, one connection per upload, bounded by
//!   the configured request timeout.
//! - **all other targets**: the payload is encoded and logged, and the last
//!   one kept for inspection.

use core::time::Duration;

use crate::adapters::device_id::DeviceIdString;
use crate::app::events::TelemetryReport;
use crate::app::ports::TelemetryPort;
use crate::config::SystemConfig;
use crate::error::TelemetryError;

#[cfg(target_os = "espidf")]
use embedded_svc::http::client::Client as HttpClient;
#[cfg(target_os = "espidf")]
use embedded_svc::http::{Method, Status};
#[cfg(target_os = "espidf")]
use embedded_svc::io::Write;
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};

pub struct TelemetryClient {
    endpoint: heapless::String<128>,
    api_key: DeviceIdString,
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    timeout: Duration,
    #[cfg(not(target_os = "espidf"))]
    last_payload: Option<Vec<u8>>,
}

impl TelemetryClient {
    pub fn new(config: &SystemConfig, api_key: DeviceIdString) -> Self {
        Self {
            endpoint: config.telemetry_endpoint.clone(),
            api_key,
            timeout: Duration::from_millis(u64::from(config.telemetry_timeout_ms)),
            #[cfg(not(target_os = "espidf"))]
            last_payload: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Body of the most recent upload (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn last_payload(&self) -> Option<&[u8]> {
        self.last_payload.as_deref()
    }

    #[cfg(target_os = "espidf")]
    fn send(&mut self, body: &[u8]) -> Result<u16, TelemetryError> {
        let conn = EspHttpConnection::new(&HttpClientConfiguration {
            timeout: Some(self.timeout),
            ..Default::default()
        })
        .map_err(transport)?;
        let mut client = HttpClient::wrap(conn);

        let content_length = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("Content-Length", content_length.as_str()),
            ("apiKey", self.api_key.as_str()),
        ];
        let mut request = client
            .request(Method::Post, &self.endpoint, &headers)
            .map_err(transport)?;
        request.write_all(body).map_err(transport)?;
        request.flush().map_err(transport)?;
        let response = request.submit().map_err(transport)?;
        Ok(response.status())
    }

    #[cfg(not(target_os = "espidf"))]
    fn send(&mut self, body: &[u8]) -> Result<u16, TelemetryError> {
        log::debug!(
            "telemetry(sim): POST {} apiKey={} {}",
            self.endpoint,
            self.api_key,
            String::from_utf8_lossy(body)
        );
        self.last_payload = Some(body.to_vec());
        Ok(200)
    }
}

#[cfg(target_os = "espidf")]
fn transport<E: core::fmt::Debug>(e: E) -> TelemetryError {
    log::debug!("telemetry: {:?}", e);
    TelemetryError::Transport
}

impl TelemetryPort for TelemetryClient {
    fn post(&mut self, report: &TelemetryReport) -> Result<(), TelemetryError> {
        let body = serde_json::to_vec(report).map_err(|_| TelemetryError::Encode)?;
        let status = self.send(&body)?;
        if !(200..300).contains(&status) {
            return Err(TelemetryError::Status(status));
        }
        Ok(())
    }
}
