//! One-shot hardware peripheral initialization.
//!
//! Configures the soil ADC channels and the relay/float-switch GPIOs using
//! raw ESP-IDF sys calls.  Called once from `main()` before provisioning
//! starts.  The DHT22 and HC-SR04 pins are owned by HAL
//! `PinDriver`s instead and are not touched here.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU64, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

/// Every relay output, in the order they are driven to OFF at boot.
const RELAY_GPIOS: [i32; 5] = [
    pins::PUMP_GPIOS[0],
    pins::PUMP_GPIOS[1],
    pins::PUMP_GPIOS[2],
    pins::FAN_GPIO,
    pins::LAMP_GPIO,
];

/// Electrical level that switches a relay off.
pub fn relay_off_level(gpio: i32) -> bool {
    pins::PUMP_ACTIVE_LOW && pins::PUMP_GPIOS.contains(&gpio)
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any driver runs; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_adc()?;
        init_gpio_inputs()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    for gpio in RELAY_GPIOS {
        gpio_write(gpio, relay_off_level(gpio));
    }
    log::info!("hw_init(sim): relays parked, peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// control-loop read path.  `init_adc()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for channel in pins::SOIL_ADC_CHANNELS {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!(
        "hw_init: ADC1 configured (soil CH{:?})",
        pins::SOIL_ADC_CHANNELS
    );
    Ok(())
}

/// One 12-bit sample, or `None` if the driver reported an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; single-threaded control-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.max(0) as u16)
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::WATER_EMPTY_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: float switch input configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for gpio in RELAY_GPIOS {
        // Latch the OFF level before the pin becomes an output so an
        // active-low relay never clicks during boot.
        unsafe { gpio_set_level(gpio, u32::from(relay_off_level(gpio))) };
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << gpio,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    info!("hw_init: relay outputs configured (all off)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an output pin configured in
    // init_gpio_outputs(). Control-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

// ── Simulation ────────────────────────────────────────────────

/// Output levels of the simulated GPIO bank, one bit per pin.
#[cfg(not(target_os = "espidf"))]
static SIM_GPIO_LEVELS: AtomicU64 = AtomicU64::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    let bit = 1u64 << pin;
    if high {
        SIM_GPIO_LEVELS.fetch_or(bit, Ordering::Relaxed);
    } else {
        SIM_GPIO_LEVELS.fetch_and(!bit, Ordering::Relaxed);
    }
}

/// Last level written to `pin` on the simulated bank.
#[cfg(not(target_os = "espidf"))]
pub fn sim_gpio_level(pin: i32) -> bool {
    SIM_GPIO_LEVELS.load(Ordering::Relaxed) & (1u64 << pin) != 0
}
