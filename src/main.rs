//! Greenhouse Firmware: Main Entry Point
//!
//! Hexagonal architecture with a strictly sequential control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter     LogEventSink   NvsAdapter    Esp32Time    │
//! │  (Transducer+Relay)  (EventSink)    (Config+Cred) (Clock)      │
//! │  WifiAdapter       HttpServerAdapter TelemetryClient           │
//! │  (STA + AP)          (HttpListener)  (TelemetryPort)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Provisioner (boot)  ──▶  ControlLoop (forever)        │    │
//! │  │  SensorReader · ThresholdPolicy · FaultState           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{IOPin, InputPin as _, OutputPin as _, PinDriver};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::wifi::EspWifi;

use greenhouse::adapters::device_id;
use greenhouse::adapters::hardware::HardwareAdapter;
use greenhouse::adapters::http_server::HttpServerAdapter;
use greenhouse::adapters::log_sink::LogEventSink;
use greenhouse::adapters::nvs::NvsAdapter;
use greenhouse::adapters::telemetry::TelemetryClient;
use greenhouse::adapters::time::Esp32TimeAdapter;
use greenhouse::adapters::wifi::WifiAdapter;
use greenhouse::app::ports::{Clock, WifiPort};
use greenhouse::app::service::ControlLoop;
use greenhouse::config;
use greenhouse::drivers::hw_init;
use greenhouse::drivers::watchdog::Watchdog;
use greenhouse::error::Error;
use greenhouse::provisioning::Provisioner;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    let mac = device_id::read_mac();
    let id = device_id::device_id(&mac);
    info!("╔══════════════════════════════════════╗");
    info!("║  Greenhouse v{}  {}          ║", env!("CARGO_PKG_VERSION"), id);
    info!("╚══════════════════════════════════════╝");

    // ── 2. Relays to OFF, ADC and float switch ────────────────
    hw_init::init_peripherals().map_err(|e| anyhow!("{}: {}", Error::Init("peripherals"), e))?;

    // ── 3. Config from NVS (or defaults) ──────────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let config = config::load_or_seed(&nvs);

    // ── 4. HAL-owned pins (see pins.rs: DHT 14, TRIG 16, ECHO 17) ──
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let mut dht = PinDriver::input_output_od(peripherals.pins.gpio14.downgrade())?;
    dht.set_high()?;
    let trigger = PinDriver::output(peripherals.pins.gpio16.downgrade_output())?;
    let echo = PinDriver::input(peripherals.pins.gpio17.downgrade_input())?;
    let mut hw = HardwareAdapter::new(&config, dht, trigger, echo);

    // ── 5. Radio and the shared HTTP listener ─────────────────
    let mut esp_wifi = EspWifi::new(peripherals.modem, sysloop, None)?;
    let hostname = device_id::hostname(&mac);
    if let Err(e) = esp_wifi.sta_netif_mut().set_hostname(&hostname) {
        warn!("WiFi: hostname '{}' not set ({})", hostname, e);
    }
    let mut wifi = WifiAdapter::new(esp_wifi);
    let mut listener = HttpServerAdapter::start(config.http_port)
        .map_err(|e| anyhow!("HTTP server: {}", e))?;

    let mut clock = Esp32TimeAdapter::new();
    let mut sink = LogEventSink::new();

    // ── 6. Provisioning ───────────────────────────────────────
    let mut provisioner = Provisioner::new(&config);
    match provisioner.run(&mut wifi, &mut nvs, &mut listener, &mut clock, &mut sink) {
        Ok(outcome) => info!("Provisioning finished: {:?}", outcome),
        Err(e) => warn!("Provisioning aborted ({}), running offline", e),
    }

    // ── 7. Control loop ───────────────────────────────────────
    let mut uplink = TelemetryClient::new(&config, id);
    let mut control = ControlLoop::new(&config);
    control.start(&mut hw, &mut sink);

    let watchdog = Watchdog::new(u32::from(config.watchdog_timeout_secs) * 1000);
    info!(
        "Worst-case cycle {}s, watchdog {}s",
        config.worst_case_cycle_secs(),
        watchdog.timeout_ms() / 1000
    );

    loop {
        let started = clock.now();
        control.set_ip_address(wifi.ip_address());
        control.run_cycle(&mut hw, &mut clock, &mut uplink, &mut sink);
        watchdog.feed();

        control.serve_until_next_cycle(started, &mut listener, &mut clock);
        watchdog.feed();
    }
}
