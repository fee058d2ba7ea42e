//! Adapters — concrete implementations of the port traits.
//!
//! | Adapter     | Implements       | Connects to                    |
//! |-------------|------------------|--------------------------------|
//! | `sx126x`    | LinkTransport    | SX1268 radio over SPI          |
//! | `ble`       | CommandMailbox   | Bluedroid NUS GATT server      |
//! | `nvs`       | StoragePort      | NVS flash / in-memory store    |
//! | `indicator` | IndicatorPort    | WS2812 LED + vibration motor   |
//! | `panel`     | StatusPanel      | Serial log output              |
//! | `time`      | Clock            | ESP32 system timer             |

pub mod ble;
pub mod indicator;
pub mod nvs;
pub mod panel;
pub mod sx126x;
pub mod time;
