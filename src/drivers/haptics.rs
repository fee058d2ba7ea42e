//! Vibration motor driver (transmitter role).
//!
//! Short confirmation buzz after a successful exchange. Active high,
//! direct GPIO drive. The pulse blocks for its duration — 60ms is well
//! under a retry pause, and haptics only fire after an exchange ends.

use crate::pins;

const PULSE_MS: u32 = 60;

pub struct Vibro;

impl Vibro {
    pub fn new() -> Self {
        Self
    }

    pub fn pulse(&mut self) {
        crate::drivers::hw_init::gpio_write(pins::VIBRO_GPIO, true);
        #[cfg(target_os = "espidf")]
        unsafe {
            esp_idf_svc::sys::esp_rom_delay_us(PULSE_MS * 1000);
        }
        #[cfg(not(target_os = "espidf"))]
        log::debug!("vibro(sim): {PULSE_MS}ms pulse");
        crate::drivers::hw_init::gpio_write(pins::VIBRO_GPIO, false);
    }
}

impl Default for Vibro {
    fn default() -> Self {
        Self::new()
    }
}
