//! System configuration parameters.
//!
//! Radio profile, protocol timing, and persisted settings for both link
//! roles. Two devices sharing a [`RadioProfile`] and the token vocabulary
//! interoperate; everything here is data, not code paths — the old
//! firmware's per-variant `send/ack` flavours collapse into one engine
//! parameterised by [`ProtocolConfig`].

use serde::{Deserialize, Serialize};

/// Maximum passphrase length accepted by the console.
pub const MAX_PASSPHRASE_LEN: usize = 32;

/// Factory default console passphrase (changeable via `setpass`).
pub const DEFAULT_PASSPHRASE: &str = "1234";

/// LoRa modem configuration shared by both nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioProfile {
    /// Carrier frequency in MHz.
    pub frequency_mhz: u32,
    /// Bandwidth in kHz.
    pub bandwidth_khz: u32,
    /// Spreading factor (7–12).
    pub spreading_factor: u8,
    /// Coding rate denominator (5 → 4/5).
    pub coding_rate: u8,
    /// Sync word — both nodes must match.
    pub sync_word: u8,
    /// TX output power in dBm.
    pub output_power_dbm: i8,
    /// PA overcurrent limit in mA.
    pub current_limit_ma: u16,
    /// Preamble length in symbols.
    pub preamble_symbols: u16,
}

impl Default for RadioProfile {
    fn default() -> Self {
        Self {
            frequency_mhz: 460,
            bandwidth_khz: 125,
            spreading_factor: 9,
            coding_rate: 5,
            sync_word: 0x12,
            output_power_dbm: 5,
            current_limit_ma: 140,
            preamble_symbols: 8,
        }
    }
}

/// Command/acknowledgement exchange timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Attempts per exchange before the link is reported offline.
    pub attempts: u8,
    /// How long each attempt waits for an acknowledgement (ms).
    pub ack_window_ms: u32,
    /// Pause between attempts (ms).
    pub retry_pause_ms: u32,
    /// Receiver-side delay before replying, so the half-duplex peer has
    /// time to switch from transmit to receive (ms).
    pub settle_delay_ms: u32,
    /// Duplicate RELAY_ON inside this window is acknowledged but not
    /// re-executed (ms).
    pub anti_repeat_window_ms: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            ack_window_ms: 200,
            retry_pause_ms: 100,
            settle_delay_ms: 50,
            anti_repeat_window_ms: 3000,
        }
    }
}

/// Settings persisted in non-volatile storage.
///
/// The relay boolean is the receiver's boot-restore hint; the passphrase
/// gates the transmitter's BLE console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Last committed relay state (receiver-authoritative).
    pub relay_on: bool,
    /// Console passphrase.
    pub passphrase: heapless::String<MAX_PASSPHRASE_LEN>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut passphrase = heapless::String::new();
        let _ = passphrase.push_str(DEFAULT_PASSPHRASE);
        Self {
            relay_on: false,
            passphrase,
        }
    }
}
