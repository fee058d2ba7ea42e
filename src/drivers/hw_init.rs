//! One-shot GPIO initialisation and the ISR service.
//!
//! Configures the plain digital pins (button, relay, vibration motor)
//! with raw ESP-IDF sys calls and installs the GPIO interrupt handlers.
//! Called once from `main()` before the event loop starts. The radio's
//! SPI bus and control pins are owned by the transport adapter, not
//! configured here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

/// Errors during one-shot peripheral initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={rc})"),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_gpio() -> Result<(), HwInitError> {
    // SAFETY: called once from main() before the event loop; single-threaded.
    unsafe {
        // Button: active-low with pull-up, interrupt on the falling edge.
        let btn_cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pins::BUTTON_GPIO,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
        };
        let ret = gpio_config(&btn_cfg);
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }

        // Relay: INPUT_OUTPUT so the driven level reads back for status
        // replies. Board is active-low; boot with the coil released.
        let relay_cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pins::RELAY_GPIO,
            mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = gpio_config(&relay_cfg);
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        gpio_set_level(pins::RELAY_GPIO, 1);

        // Vibration motor: plain output, off.
        let vibro_cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pins::VIBRO_GPIO,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = gpio_config(&vibro_cfg);
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        gpio_set_level(pins::VIBRO_GPIO, 0);
    }

    info!("hw_init: GPIO configured (button, relay, vibro)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_gpio() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): GPIO init skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on an already-configured pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    false
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: writes to an already-configured output pin; main loop only.
    unsafe {
        gpio_set_level(pin, if high { 1 } else { 0 });
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── GPIO ISR service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: esp_timer_get_time is a counter read; safe in ISR context.
    let now_ms = (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u32;
    crate::drivers::button::button_isr_handler(now_ms);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn radio_dio1_isr(_arg: *mut core::ffi::c_void) {
    crate::adapters::sx126x::radio_irq_handler();
    crate::events::push_event(crate::events::Event::RadioFrameReady);
}

/// Install the per-pin GPIO ISR service and register interrupt handlers.
/// Call after [`init_gpio`] and before the event loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed (acceptable). Registered handlers are
    // static functions that only touch atomics and the lock-free queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_isr_handler_add(
            pins::BUTTON_GPIO,
            Some(button_gpio_isr),
            core::ptr::null_mut(),
        );
        gpio_intr_enable(pins::BUTTON_GPIO);

        // Radio DIO1: rising edge on TxDone / RxDone.
        gpio_set_intr_type(pins::RADIO_DIO1_GPIO, gpio_int_type_t_GPIO_INTR_POSEDGE);
        gpio_isr_handler_add(
            pins::RADIO_DIO1_GPIO,
            Some(radio_dio1_isr),
            core::ptr::null_mut(),
        );
        gpio_intr_enable(pins::RADIO_DIO1_GPIO);

        info!("hw_init: ISR service installed (button, radio DIO1)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
