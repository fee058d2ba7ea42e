//! ISR-debounced user button with short, long, and double click detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch on the boot strap pin, external pull-up.
//! The GPIO interrupt fires on the falling edge and records a raw
//! timestamp into an atomic; [`Button::tick`] runs the debounce and
//! gesture machine from the main loop. `tick` is cheap and is also
//! called from the idle hook while the transmitter blocks on an ack
//! wait, so a gesture started just before an exchange still classifies
//! correctly.
//!
//! ## Gestures
//!
//! | Gesture      | Condition                                  |
//! |--------------|--------------------------------------------|
//! | Short click  | released before 5 s, no second press 300 ms |
//! | Long click   | held for 5 s                               |
//! | Double click | second press within 300 ms of release      |

use core::sync::atomic::{AtomicU32, Ordering};

const DEBOUNCE_MS: u32 = 50;
const LONG_CLICK_MS: u32 = 5000;
const DOUBLE_CLICK_GAP_MS: u32 = 300;

/// Falling-edge timestamp written by the ISR, consumed by `tick`.
static PRESS_ISR_MS: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonGesture {
    ShortClick,
    LongClick,
    DoubleClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Debounce { pressed_ms: u32 },
    Held { pressed_ms: u32 },
    /// Released after a short hold; a second press inside the gap
    /// upgrades to a double click.
    ReleaseGap { released_ms: u32 },
}

/// Gesture classifier. `level` samples the pin (true = pressed) so the
/// machine can see releases, which the falling-edge ISR cannot report.
pub struct Button<F: FnMut() -> bool> {
    level: F,
    phase: Phase,
    last_isr_ms: u32,
}

impl<F: FnMut() -> bool> Button<F> {
    pub fn new(level: F) -> Self {
        Self {
            level,
            phase: Phase::Idle,
            last_isr_ms: 0,
        }
    }

    /// Advance the gesture machine. Call every main-loop iteration and
    /// from the ack-wait idle hook.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonGesture> {
        let isr_ms = PRESS_ISR_MS.load(Ordering::Acquire);
        let new_press = isr_ms != self.last_isr_ms && isr_ms != 0;

        match self.phase {
            Phase::Idle => {
                if new_press {
                    self.last_isr_ms = isr_ms;
                    self.phase = Phase::Debounce { pressed_ms: now_ms };
                }
                None
            }

            Phase::Debounce { pressed_ms } => {
                if now_ms.wrapping_sub(pressed_ms) < DEBOUNCE_MS {
                    return None;
                }
                if (self.level)() {
                    self.phase = Phase::Held { pressed_ms };
                } else {
                    // Bounce or spike shorter than the debounce window.
                    self.phase = Phase::Idle;
                }
                None
            }

            Phase::Held { pressed_ms } => {
                if now_ms.wrapping_sub(pressed_ms) >= LONG_CLICK_MS {
                    self.phase = Phase::Idle;
                    return Some(ButtonGesture::LongClick);
                }
                if !(self.level)() {
                    self.phase = Phase::ReleaseGap { released_ms: now_ms };
                }
                None
            }

            Phase::ReleaseGap { released_ms } => {
                if new_press {
                    self.last_isr_ms = isr_ms;
                    self.phase = Phase::Idle;
                    return Some(ButtonGesture::DoubleClick);
                }
                if now_ms.wrapping_sub(released_ms) > DOUBLE_CLICK_GAP_MS {
                    self.phase = Phase::Idle;
                    return Some(ButtonGesture::ShortClick);
                }
                None
            }
        }
    }
}

/// Register on the button GPIO falling edge. Lock-free; ISR-safe.
#[allow(unused)]
pub fn button_isr_handler(now_ms: u32) {
    PRESS_ISR_MS.store(now_ms, Ordering::Release);
}
