//! HomeNode firmware library.
//!
//! Exposes the message bus, workers, and bring-up sequencer for
//! integration testing and external inspection. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each
//! module, so the full logic builds and tests on the host.

#![deny(unused_must_use)]

pub mod bus;
pub mod config;
pub mod error;
pub mod indicator;
pub mod jsonpath;
pub mod sequencer;
pub mod store;
pub mod util;
pub mod workers;
