//! Interrupt-to-main-loop event queue.
//!
//! Events are produced by:
//! - the radio DIO1 ISR (frame received)
//! - the button GPIO ISR via gesture classification
//! - the Bluedroid callback task (console line / connect / disconnect)
//! - the main loop itself (gesture classification)
//!
//! Events are consumed by the single cooperative main loop. The radio
//! ready flag itself lives in the transport adapter; the queue carries
//! the *notification* so the loop can stay event-driven.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ DIO1 ISR    │────▶│              │     │              │
//! │ Button ISR  │────▶│  Event Queue │────▶│  Main Loop   │
//! │ BLE callback│────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 16;

/// System event types. Lower discriminant = higher priority when several
/// are pending simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// The radio reported a received frame (receiver role: dispatch the
    /// responder; transmitter role: unsolicited traffic, drained and logged).
    RadioFrameReady = 0,

    /// Debounced short button press (transmitter: RELAY_ON).
    ButtonShortPress = 10,
    /// Long button press, >= 5 s hold (transmitter: RELAY_OFF).
    ButtonLongPress = 11,
    /// Double button press (transmitter: GET_STATUS reconciliation).
    ButtonDoublePress = 12,

    /// A console command line is waiting in the BLE mailbox.
    ConsoleLine = 20,
    /// A phone connected to the console channel (session reset point).
    ConsoleConnected = 21,
    /// The phone disconnected.
    ConsoleDisconnected = 22,
}

// ── Lock-free MPSC ring buffer ────────────────────────────────
//
// Multiple producer contexts (GPIO ISRs, the Bluedroid callback task,
// the main loop itself) and one consumer (the main loop). A producer
// claims a slot index with a CAS on EVENT_HEAD, then commits the event
// with a Release store into that slot; slots are atomics holding
// `discriminant + 1`, with 0 meaning "claimed but not yet committed"
// or "empty". The consumer skips a claimed-but-uncommitted slot and
// picks it up on the next poll, so a preempted producer can never make
// the queue publish garbage or lose a neighbour's event.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
static EVENT_SLOTS: [AtomicU8; EVENT_QUEUE_CAP] =
    [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from ISR and callback-task context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let mut head = EVENT_HEAD.load(Ordering::Relaxed);
    loop {
        let tail = EVENT_TAIL.load(Ordering::Acquire);
        let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;
        if next_head == tail {
            return false; // Queue full — drop event.
        }
        match EVENT_HEAD.compare_exchange_weak(
            head,
            next_head,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                // Slot claimed exclusively; commit publishes it.
                EVENT_SLOTS[head as usize].store(event as u8 + 1, Ordering::Release);
                return true;
            }
            Err(current) => head = current,
        }
    }
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty, or if the slot at the tail is
/// claimed but its producer has not committed yet.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = EVENT_SLOTS[tail as usize].swap(0, Ordering::Acquire);
    if raw == 0 {
        return None; // Claimed, not yet committed — retry next poll.
    }

    // The slot is cleared before the tail advance, so a producer
    // reclaiming this index can never race the read above.
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);
    event_from_u8(raw - 1)
}

/// Drain all pending events into a callback, FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0 => Some(Event::RadioFrameReady),
        10 => Some(Event::ButtonShortPress),
        11 => Some(Event::ButtonLongPress),
        12 => Some(Event::ButtonDoublePress),
        20 => Some(Event::ConsoleLine),
        21 => Some(Event::ConsoleConnected),
        22 => Some(Event::ConsoleDisconnected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The queue is a process-wide static; serialise tests on a lock so
    // parallel test threads don't interleave on it.
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn fifo_order_and_overflow() {
        let _g = LOCK.lock().unwrap();
        while pop_event().is_some() {}

        assert!(push_event(Event::RadioFrameReady));
        assert!(push_event(Event::ButtonShortPress));
        assert!(push_event(Event::ConsoleLine));
        assert_eq!(queue_len(), 3);

        assert_eq!(pop_event(), Some(Event::RadioFrameReady));
        assert_eq!(pop_event(), Some(Event::ButtonShortPress));
        assert_eq!(pop_event(), Some(Event::ConsoleLine));
        assert_eq!(pop_event(), None);

        // Fill to capacity - 1 (one slot is the full/empty sentinel).
        for _ in 0..EVENT_QUEUE_CAP - 1 {
            assert!(push_event(Event::ButtonLongPress));
        }
        assert!(!push_event(Event::ButtonLongPress));
        while pop_event().is_some() {}
    }

    #[test]
    fn concurrent_producers_lose_no_committed_event() {
        let _g = LOCK.lock().unwrap();
        while pop_event().is_some() {}

        const PER_PRODUCER: usize = 20_000;

        let producers: Vec<_> = [Event::ConsoleLine, Event::RadioFrameReady]
            .into_iter()
            .map(|event| {
                std::thread::spawn(move || {
                    let mut accepted = 0usize;
                    for _ in 0..PER_PRODUCER {
                        if push_event(event) {
                            accepted += 1;
                        }
                    }
                    accepted
                })
            })
            .collect();

        // Drain concurrently, then once more after both producers stop.
        let mut popped = 0usize;
        while producers.iter().any(|p| !p.is_finished()) {
            while let Some(event) = pop_event() {
                assert!(matches!(
                    event,
                    Event::ConsoleLine | Event::RadioFrameReady
                ));
                popped += 1;
            }
        }
        let accepted: usize = producers
            .into_iter()
            .map(|p| p.join().expect("producer thread panicked"))
            .sum();
        while pop_event().is_some() {
            popped += 1;
        }

        // Every accepted push comes out exactly once; rejected pushes
        // (queue momentarily full) are the only losses.
        assert_eq!(popped, accepted);
    }
}
