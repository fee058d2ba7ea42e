//! GPIO / peripheral pin assignments for the Mesh-Zero carrier boards.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers. The active revision is v2 (E22-400M30S module,
//! SX1268 die); the v1 map (E32-400M33S, SX1278) is kept for boards still
//! in the field.

// ---------------------------------------------------------------------------
// Mesh-Zero v2 — E22-400M30S (SX1268), the current build target
// ---------------------------------------------------------------------------

/// SPI clock to the radio module.
pub const RADIO_SCK_GPIO: i32 = 7;
/// SPI MOSI to the radio module.
pub const RADIO_MOSI_GPIO: i32 = 8;
/// SPI MISO from the radio module.
pub const RADIO_MISO_GPIO: i32 = 9;
/// Radio chip select (active LOW).
pub const RADIO_NSS_GPIO: i32 = 13;
/// Radio hard reset (active LOW).
pub const RADIO_NRST_GPIO: i32 = 12;
/// SX1268 BUSY line — HIGH while the chip processes a command.
pub const RADIO_BUSY_GPIO: i32 = 11;
/// DIO1 interrupt line — raised on TxDone / RxDone.
pub const RADIO_DIO1_GPIO: i32 = 10;
/// RF switch: transmit-enable.
pub const RADIO_TX_EN_GPIO: i32 = 2;
/// RF switch: receive-enable.
pub const RADIO_RX_EN_GPIO: i32 = 1;

/// On-board WS2812 status LED.
pub const LED_GPIO: i32 = 21;
/// User button (active LOW, boot strap pin).
pub const BUTTON_GPIO: i32 = 0;

/// Relay output (receiver role). Board encoding: LOW = relay energised.
pub const RELAY_GPIO: i32 = 4;
/// Vibration motor (transmitter role, active HIGH).
pub const VIBRO_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Mesh-Zero v1 — E32-400M33S (SX1278), legacy field units
// ---------------------------------------------------------------------------

#[allow(dead_code)]
pub mod mesh_zero_v1 {
    pub const RADIO_SCK_GPIO: i32 = 8;
    pub const RADIO_MOSI_GPIO: i32 = 9;
    pub const RADIO_MISO_GPIO: i32 = 11;
    pub const RADIO_NSS_GPIO: i32 = 7;
    pub const RADIO_NRST_GPIO: i32 = 3;
    /// DIO0 doubles as the receive-complete interrupt on the SX1278.
    pub const RADIO_DIO0_GPIO: i32 = 2;
    pub const RADIO_DIO1_GPIO: i32 = 1;
    pub const RADIO_TX_EN_GPIO: i32 = 6;
    pub const RADIO_RX_EN_GPIO: i32 = 10;

    pub const LED_GPIO: i32 = 21;
    pub const BUTTON_GPIO: i32 = 0;
    pub const RELAY_GPIO: i32 = 4;
    pub const VIBRO_GPIO: i32 = 4;
}
