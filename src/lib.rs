//! RelayLink firmware library.
//!
//! Exposes the pure-logic modules (link protocol, console, drivers) for
//! integration testing and external inspection. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod pins;

// Hardware-facing modules; the ESP-IDF implementations are guarded by
// cfg attributes inside, so the crate compiles on host targets too.
pub mod adapters;
pub mod drivers;
