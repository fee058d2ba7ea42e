//! Port traits — the boundary between the link core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ link core (session / responder)
//! ```
//!
//! Driven adapters (relay pin, LED, display, NVS, clock) implement these
//! traits. The core consumes them via generics, so the protocol logic
//! never touches hardware directly and runs unchanged on the host.

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: core → output pin)
// ───────────────────────────────────────────────────────────────

/// The receiver's relay output. The board-level pin encoding ("on" may
/// be an electrically low level) is the adapter's business; the core
/// speaks only in logical on/off.
pub trait RelayPort {
    /// Energise the relay.
    fn set_on(&mut self);

    /// De-energise the relay.
    fn set_off(&mut self);

    /// Live logical state read back from the pin — the source of truth
    /// for status replies, never a cached belief.
    fn is_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Presentation ports (side-effect sinks)
// ───────────────────────────────────────────────────────────────

/// The four-colour status indication both roles use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColour {
    /// Blue — powered and waiting.
    Idle,
    /// Red — exchange in flight, or failure.
    Busy,
    /// Green — last exchange acknowledged / relay on.
    Ok,
    /// Off.
    Black,
}

/// Status LED (and optional haptic) sink.
pub trait IndicatorPort {
    fn set_colour(&mut self, colour: StatusColour);

    /// Short vibration pulse; no-op on boards without the motor.
    fn haptic_pulse(&mut self) {}
}

/// Display / log sink for two-line status output.
pub trait StatusPanel {
    fn show(&mut self, status: &str, message: &str);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: core ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced to prevent collisions between subsystems.
/// Write operations MUST be atomic — no partial writes on power loss.
/// The ESP-IDF NVS API guarantees this natively; the in-memory
/// simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Stored blob failed deserialization.
    Corrupted,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::Corrupted => write!(f, "stored blob corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Time and cooperative idle servicing
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock. Wraps at `u32::MAX`; all comparisons in
/// the core use wrapping subtraction.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Collaborators serviced on every iteration of a blocking wait.
///
/// The transmitter's ack wait is a tight poll loop; without this hook
/// the button debounce state machine would starve for the whole window
/// and misclassify the next gesture. This is the explicit-callback-list
/// replacement for the old raw `onTick` function pointer.
pub trait IdleService {
    fn service(&mut self, now_ms: u32);
}

/// No-op idle service for callers with nothing to keep alive.
pub struct NoIdle;

impl IdleService for NoIdle {
    fn service(&mut self, _now_ms: u32) {}
}

/// Adapter turning a closure into an [`IdleService`].
pub struct IdleFn<F: FnMut(u32)>(pub F);

impl<F: FnMut(u32)> IdleService for IdleFn<F> {
    fn service(&mut self, now_ms: u32) {
        (self.0)(now_ms);
    }
}
