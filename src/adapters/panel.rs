//! Log-backed status panel.
//!
//! Implements [`StatusPanel`] by writing the two-line status output to
//! the ESP-IDF logger (UART / USB-CDC in production). A display adapter
//! for an attached OLED would implement the same trait.

use log::info;

use crate::app::ports::StatusPanel;

pub struct LogPanel;

impl LogPanel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPanel for LogPanel {
    fn show(&mut self, status: &str, message: &str) {
        info!("PANEL | {status} | {message}");
    }
}
