//! Indicator adapter: status LED plus optional vibration motor.

use crate::app::ports::{IndicatorPort, StatusColour};
use crate::drivers::haptics::Vibro;
use crate::drivers::status_led::StatusLed;

pub struct LedIndicator {
    led: StatusLed,
    /// Transmitter boards carry the motor; the receiver does not.
    vibro: Option<Vibro>,
}

impl LedIndicator {
    pub fn new(led: StatusLed, vibro: Option<Vibro>) -> Self {
        Self { led, vibro }
    }

    pub fn current(&self) -> StatusColour {
        self.led.current()
    }
}

impl IndicatorPort for LedIndicator {
    fn set_colour(&mut self, colour: StatusColour) {
        self.led.set(colour);
    }

    fn haptic_pulse(&mut self) {
        if let Some(vibro) = self.vibro.as_mut() {
            vibro.pulse();
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn colour_passes_through_to_led() {
        let mut ind = LedIndicator::new(StatusLed::new(), None);
        ind.set_colour(StatusColour::Busy);
        assert_eq!(ind.current(), StatusColour::Busy);
        // No motor fitted: pulse is a no-op, not a panic.
        ind.haptic_pulse();
    }
}
