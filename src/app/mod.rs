//! Application layer: port traits, typed settings, the BLE text console,
//! and the per-role orchestrators that tie ports to the link core.

pub mod console;
pub mod ports;
pub mod receiver;
pub mod settings;
pub mod transmitter;
