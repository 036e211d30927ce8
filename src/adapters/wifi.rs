//! Wi-Fi station + access-point adapter.
//!
//! Implements [`WifiPort`], the hexagonal boundary for the radio.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF Wi-Fi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: an in-memory radio with a fixed set of visible
//!   networks, for host-side runs.
//!
//! ## Modes
//!
//! While the provisioning AP is up the driver runs in mixed (AP + STA)
//! mode, so the scan for the form and the live credential test both work
//! without dropping clients off the AP.

#[cfg(not(target_os = "espidf"))]
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use crate::app::ports::WifiPort;
#[cfg(not(target_os = "espidf"))]
use crate::error::ConnectivityError;
#[cfg(not(target_os = "espidf"))]
use crate::provisioning::WifiCredentials;

/// Maximum networks offered on the provisioning form.
const MAX_SCAN_RESULTS: usize = 16;

pub type SsidList = heapless::Vec<heapless::String<32>, MAX_SCAN_RESULTS>;

// ───────────────────────────────────────────────────────────────
// ESP-IDF adapter
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use core::fmt::Write;

    use esp_idf_svc::sys::EspError;
    use esp_idf_svc::wifi::{
        AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
    };
    use log::{info, warn};

    use super::{MAX_SCAN_RESULTS, SsidList};
    use crate::app::ports::WifiPort;
    use crate::error::ConnectivityError;
    use crate::provisioning::WifiCredentials;

    pub struct WifiAdapter {
        wifi: EspWifi<'static>,
        client: Option<ClientConfiguration>,
        ap: Option<AccessPointConfiguration>,
    }

    fn driver_error(op: &str, e: EspError) -> ConnectivityError {
        warn!("WiFi: {} failed: {}", op, e);
        ConnectivityError::DriverError
    }

    impl WifiAdapter {
        pub fn new(wifi: EspWifi<'static>) -> Self {
            Self {
                wifi,
                client: None,
                ap: None,
            }
        }

        /// Push the current STA/AP combination to the driver and make sure
        /// it is started.
        fn apply(&mut self) -> Result<(), EspError> {
            let conf = match (&self.client, &self.ap) {
                (Some(c), Some(a)) => Configuration::Mixed(c.clone(), a.clone()),
                (None, Some(a)) => Configuration::Mixed(ClientConfiguration::default(), a.clone()),
                (Some(c), None) => Configuration::Client(c.clone()),
                (None, None) => Configuration::Client(ClientConfiguration::default()),
            };
            self.wifi.set_configuration(&conf)?;
            if !self.wifi.is_started()? {
                self.wifi.start()?;
            }
            Ok(())
        }
    }

    impl WifiPort for WifiAdapter {
        fn begin_connect(&mut self, credentials: &WifiCredentials) -> Result<(), ConnectivityError> {
            let auth_method = if credentials.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            self.client = Some(ClientConfiguration {
                ssid: credentials
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| ConnectivityError::DriverError)?,
                password: credentials
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| ConnectivityError::DriverError)?,
                auth_method,
                ..Default::default()
            });
            self.apply().map_err(|e| driver_error("configure", e))?;
            self.wifi
                .connect()
                .map_err(|e| driver_error("connect", e))?;
            info!("WiFi: associating with '{}'", credentials.ssid);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.wifi.is_up().unwrap_or(false)
        }

        fn disconnect(&mut self) {
            if let Err(e) = self.wifi.disconnect() {
                warn!("WiFi: disconnect failed: {}", e);
            }
        }

        fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
            self.ap = Some(AccessPointConfiguration {
                ssid: ssid
                    .try_into()
                    .map_err(|_| ConnectivityError::AccessPointFailed)?,
                password: password
                    .try_into()
                    .map_err(|_| ConnectivityError::AccessPointFailed)?,
                auth_method: AuthMethod::WPAWPA2Personal,
                channel: 1,
                ..Default::default()
            });
            self.apply().map_err(|e| {
                warn!("WiFi: access point start failed: {}", e);
                ConnectivityError::AccessPointFailed
            })?;
            info!("WiFi: provisioning AP '{}' started", ssid);
            Ok(())
        }

        fn stop_access_point(&mut self) {
            if self.ap.take().is_some() {
                if let Err(e) = self.apply() {
                    warn!("WiFi: leaving AP mode failed: {}", e);
                }
            }
        }

        fn scan(&mut self) -> SsidList {
            let mut found = match self.wifi.scan() {
                Ok(found) => found,
                Err(e) => {
                    warn!("WiFi: scan failed: {}", e);
                    return SsidList::new();
                }
            };
            found.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));

            let mut ssids = SsidList::new();
            for ap in found {
                if ap.ssid.is_empty() || ssids.iter().any(|s| s.as_str() == ap.ssid.as_str()) {
                    continue;
                }
                let Ok(ssid) = heapless::String::try_from(ap.ssid.as_str()) else {
                    continue;
                };
                if ssids.push(ssid).is_err() {
                    break;
                }
            }
            info!("WiFi: scan found {} networks (max {})", ssids.len(), MAX_SCAN_RESULTS);
            ssids
        }

        fn ip_address(&self) -> Option<heapless::String<16>> {
            if !self.is_connected() {
                return None;
            }
            let info = self.wifi.sta_netif().get_ip_info().ok()?;
            let mut ip = heapless::String::new();
            write!(ip, "{}", info.ip).ok()?;
            Some(ip)
        }
    }
}

#[cfg(target_os = "espidf")]
pub use platform::WifiAdapter;

// ───────────────────────────────────────────────────────────────
// Simulation adapter
// ───────────────────────────────────────────────────────────────

/// In-memory radio: a station connect succeeds only against one of the
/// configured networks with the matching password.
#[cfg(not(target_os = "espidf"))]
pub struct WifiAdapter {
    networks: Vec<(String, String)>,
    connected_to: Option<heapless::String<32>>,
    ap_up: bool,
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            networks: Vec::new(),
            connected_to: None,
            ap_up: false,
        }
    }

    /// Make a network visible to scans and joinable with `password`.
    pub fn with_network(mut self, ssid: &str, password: &str) -> Self {
        self.networks.push((ssid.into(), password.into()));
        self
    }

    pub fn is_ap_up(&self) -> bool {
        self.ap_up
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiPort for WifiAdapter {
    fn begin_connect(&mut self, credentials: &WifiCredentials) -> Result<(), ConnectivityError> {
        let accepted = self.networks.iter().any(|(ssid, pw)| {
            ssid.as_str() == credentials.ssid.as_str() && pw.as_str() == credentials.password.as_str()
        });
        if accepted {
            info!("WiFi(sim): associated with '{}'", credentials.ssid);
            self.connected_to = Some(credentials.ssid.clone());
        } else {
            warn!("WiFi(sim): '{}' rejected the credentials", credentials.ssid);
            self.connected_to = None;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected_to.is_some()
    }

    fn disconnect(&mut self) {
        self.connected_to = None;
    }

    fn start_access_point(&mut self, ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        info!("WiFi(sim): AP '{}' up", ssid);
        self.ap_up = true;
        Ok(())
    }

    fn stop_access_point(&mut self) {
        self.ap_up = false;
    }

    fn scan(&mut self) -> SsidList {
        self.networks
            .iter()
            .filter_map(|(ssid, _)| heapless::String::try_from(ssid.as_str()).ok())
            .take(MAX_SCAN_RESULTS)
            .collect()
    }

    fn ip_address(&self) -> Option<heapless::String<16>> {
        self.connected_to
            .as_ref()
            .and_then(|_| heapless::String::try_from("192.168.4.20").ok())
    }
}
