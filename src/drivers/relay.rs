//! Relay output driver (receiver role).
//!
//! The board drives the relay coil through an inverting transistor
//! stage: electrical LOW energises the coil. That encoding lives only
//! here; everything above this file speaks logical on/off.

use log::info;

use crate::app::ports::RelayPort;
use crate::pins;

pub struct RelayDriver {
    #[cfg(not(target_os = "espidf"))]
    on: bool,
}

impl RelayDriver {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            on: false,
        }
    }

    fn write(&mut self, on: bool) {
        // Active low: energised = LOW.
        crate::drivers::hw_init::gpio_write(pins::RELAY_GPIO, !on);
        #[cfg(not(target_os = "espidf"))]
        {
            self.on = on;
        }
        info!("relay: {}", if on { "ON" } else { "OFF" });
    }
}

impl Default for RelayDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayPort for RelayDriver {
    fn set_on(&mut self) {
        self.write(true);
    }

    fn set_off(&mut self) {
        self.write(false);
    }

    #[cfg(target_os = "espidf")]
    fn is_on(&self) -> bool {
        // Pin is configured INPUT_OUTPUT so the driven level reads back.
        !crate::drivers::hw_init::gpio_read(pins::RELAY_GPIO)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_on(&self) -> bool {
        self.on
    }
}
