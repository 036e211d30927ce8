//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`], [`StoragePort`] and [`CredentialStore`] for
//! the greenhouse controller.
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Wi-Fi credentials live in the "auth" namespace as one JSON record,
//!   `{"ssid": .., "password": ..}`.  On ESP32 that namespace sits on the
//!   encrypted NVS partition; the simulation backend is plaintext.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().

use crate::app::ports::{ConfigError, ConfigPort, CredentialStore, StoragePort};
use crate::config::SystemConfig;
use crate::error::StorageError;
use crate::provisioning::WifiCredentials;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "greenhouse";
#[cfg(not(target_os = "espidf"))]
const CONFIG_KEY: &str = "syscfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 4000;
const CRED_NAMESPACE: &str = "auth";
const CRED_KEY: &str = "wifi_config";
/// Upper bound of the serialized credential record.
const MAX_CRED_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                let ret2 = unsafe { nvs_flash_erase() };
                if ret2 != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                let ret3 = unsafe { nvs_flash_init() };
                if ret3 != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = c_name(namespace);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// NUL-terminated copy of an NVS name (15 significant bytes max).
#[cfg(target_os = "espidf")]
fn c_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !(1..=99).contains(&cfg.soil_threshold_percent) {
        return Err(ConfigError::ValidationFailed(
            "soil_threshold_percent must be 1-99",
        ));
    }
    if cfg.soil_calibration.dry_raw <= cfg.soil_calibration.wet_raw {
        return Err(ConfigError::ValidationFailed(
            "soil_calibration.dry_raw must be above wet_raw",
        ));
    }
    if !(1..=120).contains(&cfg.pump_run_secs) {
        return Err(ConfigError::ValidationFailed("pump_run_secs must be 1-120"));
    }
    if cfg.settle_delay_secs > 300 {
        return Err(ConfigError::ValidationFailed(
            "settle_delay_secs must be 0-300",
        ));
    }
    if !(0.0..=60.0).contains(&cfg.fan_temperature_c) {
        return Err(ConfigError::ValidationFailed(
            "fan_temperature_c must be 0.0-60.0",
        ));
    }
    if !(0.0..=100.0).contains(&cfg.fan_humidity_percent) {
        return Err(ConfigError::ValidationFailed(
            "fan_humidity_percent must be 0.0-100.0",
        ));
    }
    if !(2.0..=400.0).contains(&cfg.lamp_min_distance_cm) {
        return Err(ConfigError::ValidationFailed(
            "lamp_min_distance_cm must be 2.0-400.0",
        ));
    }
    if !(5..=100).contains(&cfg.echo_timeout_ms) {
        return Err(ConfigError::ValidationFailed("echo_timeout_ms must be 5-100"));
    }
    if !(5..=3600).contains(&cfg.cycle_period_secs) {
        return Err(ConfigError::ValidationFailed(
            "cycle_period_secs must be 5-3600",
        ));
    }
    if u32::from(cfg.watchdog_timeout_secs) <= cfg.worst_case_cycle_secs() {
        return Err(ConfigError::ValidationFailed(
            "watchdog_timeout_secs must exceed the worst-case cycle",
        ));
    }
    if cfg.station_connect_attempts == 0 {
        return Err(ConfigError::ValidationFailed(
            "station_connect_attempts must be at least 1",
        ));
    }
    if !(1..=120).contains(&cfg.credential_test_timeout_secs) {
        return Err(ConfigError::ValidationFailed(
            "credential_test_timeout_secs must be 1-120",
        ));
    }
    if WifiCredentials::new(&cfg.ap_ssid, &cfg.ap_password).is_err() {
        return Err(ConfigError::ValidationFailed(
            "ap_ssid / ap_password are not valid Wi-Fi credentials",
        ));
    }
    if cfg.ap_session_timeout_secs < 60 {
        return Err(ConfigError::ValidationFailed(
            "ap_session_timeout_secs must be at least 60",
        ));
    }
    if cfg.http_port == 0 {
        return Err(ConfigError::ValidationFailed("http_port must be non-zero"));
    }
    if !cfg.telemetry_endpoint.starts_with("http://") {
        return Err(ConfigError::ValidationFailed(
            "telemetry_endpoint must be a plain http:// URL",
        ));
    }
    if !(100..=30_000).contains(&cfg.telemetry_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "telemetry_timeout_ms must be 100-30000",
        ));
    }
    Ok(())
}

/// Decode a stored config blob; anything unreadable or out of range falls
/// back to defaults.
fn decode_config(bytes: &[u8]) -> SystemConfig {
    let cfg: SystemConfig = match postcard::from_bytes(bytes) {
        Ok(cfg) => cfg,
        Err(_) => {
            warn!("NvsAdapter: {}, using defaults", ConfigError::Corrupted);
            return SystemConfig::default();
        }
    };
    match validate_config(&cfg) {
        Ok(()) => cfg,
        Err(e) => {
            warn!("NvsAdapter: stored config rejected ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            if let Some(bytes) = self.store.borrow().get(&key) {
                info!("NvsAdapter: loaded config from store");
                Ok(decode_config(bytes))
            } else {
                Err(ConfigError::NotFound)
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
                let key_cstr = b"syscfg\0";
                let mut size: usize = 0;

                // First call: get size
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret == ESP_ERR_NVS_NOT_FOUND {
                    return Err(ESP_ERR_NVS_NOT_FOUND);
                }
                if ret != ESP_OK || size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ret);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }

                Ok(buf)
            });

            match result {
                Ok(bytes) => {
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(decode_config(&bytes))
                }
                // A missing namespace is reported as NOT_FOUND by nvs_open.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(ConfigError::NotFound),
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
                let key_cstr = b"syscfg\0";
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(ConfigError::StorageFull),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = c_name(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = c_name(key);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                Err(e) => {
                    warn!("NvsAdapter: write {}::{} failed ({})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }
}

// ── Wi-Fi credential record ────────────────────────────────────────
//
// On ESP32, NVS encryption is enabled partition-wide via the nvs_key
// partition.  With CONFIG_NVS_ENCRYPTION set, the "auth" namespace is
// transparently AES-XTS encrypted; the code path is identical.
impl CredentialStore for NvsAdapter {
    fn load_credentials(&self) -> Result<Option<WifiCredentials>, StorageError> {
        let mut buf = [0u8; MAX_CRED_SIZE];
        let len = match self.read(CRED_NAMESPACE, CRED_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let creds: WifiCredentials =
            serde_json::from_slice(&buf[..len]).map_err(|_| StorageError::Corrupted)?;
        Ok(Some(creds))
    }

    fn save_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), StorageError> {
        let json = serde_json::to_vec(credentials).map_err(|_| StorageError::IoError)?;
        if json.len() > MAX_CRED_SIZE {
            return Err(StorageError::Full);
        }
        self.write(CRED_NAMESPACE, CRED_KEY, &json)?;
        info!("NvsAdapter: credentials for '{}' saved", credentials.ssid);
        Ok(())
    }
}
