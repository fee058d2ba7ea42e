//! Top-level firmware error type.
//!
//! Subsystems keep their own typed errors at the port seams
//! ([`SendError`](crate::link::SendError),
//! [`ReceiveError`](crate::link::ReceiveError),
//! [`StorageError`](crate::app::ports::StorageError)); this type covers
//! the boot path, where a failure is terminal and the only consumer is
//! the fatal-blink handler in `main`.

use core::fmt;

/// Boot-path failure. `Copy`, no allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
