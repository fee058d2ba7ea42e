//! WS2812 status LED driver.
//!
//! One NeoPixel on the board, driven over RMT. Brightness is capped low
//! — the LED is a status glance, not a torch.
//!
//! On the host the driver only records the last colour so tests can
//! assert on the signalling sequence.

use crate::app::ports::StatusColour;

/// Duty applied to the active channel(s) of each colour (max 255).
const BRIGHTNESS: u8 = 10;

fn rgb_of(colour: StatusColour) -> (u8, u8, u8) {
    match colour {
        StatusColour::Idle => (0, 0, BRIGHTNESS),  // blue
        StatusColour::Busy => (BRIGHTNESS, 0, 0),  // red
        StatusColour::Ok => (0, BRIGHTNESS, 0),    // green
        StatusColour::Black => (0, 0, 0),
    }
}

#[cfg(target_os = "espidf")]
pub use espidf::StatusLed;

#[cfg(target_os = "espidf")]
mod espidf {
    use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse, TxRmtDriver};
    use log::warn;

    use super::{rgb_of, StatusColour};

    pub struct StatusLed {
        tx: TxRmtDriver<'static>,
        current: StatusColour,
    }

    impl StatusLed {
        pub fn new(tx: TxRmtDriver<'static>) -> Self {
            Self {
                tx,
                current: StatusColour::Black,
            }
        }

        pub fn current(&self) -> StatusColour {
            self.current
        }

        pub fn set(&mut self, colour: StatusColour) {
            let (r, g, b) = rgb_of(colour);
            if let Err(e) = self.write_pixel(r, g, b) {
                warn!("status_led: RMT write failed ({e})");
            }
            self.current = colour;
        }

        /// Shift one GRB pixel. WS2812 timing: 0-bit = 350ns/800ns,
        /// 1-bit = 700ns/600ns, at the RMT tick rate of the channel.
        fn write_pixel(&mut self, r: u8, g: u8, b: u8) -> Result<(), esp_idf_hal::sys::EspError> {
            let ticks_hz = self.tx.counter_clock()?;
            let t0h = Pulse::new_with_duration(
                ticks_hz,
                PinState::High,
                &core::time::Duration::from_nanos(350),
            )?;
            let t0l = Pulse::new_with_duration(
                ticks_hz,
                PinState::Low,
                &core::time::Duration::from_nanos(800),
            )?;
            let t1h = Pulse::new_with_duration(
                ticks_hz,
                PinState::High,
                &core::time::Duration::from_nanos(700),
            )?;
            let t1l = Pulse::new_with_duration(
                ticks_hz,
                PinState::Low,
                &core::time::Duration::from_nanos(600),
            )?;

            let grb = (u32::from(g) << 16) | (u32::from(r) << 8) | u32::from(b);
            let mut signal = FixedLengthSignal::<24>::new();
            for (idx, bit) in (0..24u32).rev().enumerate() {
                let one = (grb >> bit) & 1 != 0;
                let (high, low) = if one { (t1h, t1l) } else { (t0h, t0l) };
                signal.set(idx, &(high, low))?;
            }
            self.tx.start_blocking(&signal)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub use sim::StatusLed;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use super::{rgb_of, StatusColour};
    use log::debug;

    #[derive(Default)]
    pub struct StatusLed {
        current: Option<StatusColour>,
    }

    impl StatusLed {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn current(&self) -> StatusColour {
            self.current.unwrap_or(StatusColour::Black)
        }

        pub fn set(&mut self, colour: StatusColour) {
            debug!("status_led(sim): {colour:?} {:?}", rgb_of(colour));
            self.current = Some(colour);
        }
    }
}
