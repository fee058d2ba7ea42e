//! Peripheral drivers and one-shot hardware initialisation.

pub mod button;
pub mod haptics;
pub mod hw_init;
pub mod relay;
pub mod status_led;
