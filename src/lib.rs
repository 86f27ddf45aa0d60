//! Fieldnode base station control library.
//!
//! Exposes the control layer for integration testing and for the firmware
//! binary. ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod backpacks;
pub mod config;
pub mod cycle;
pub mod error;
pub mod fsm;
pub mod intents;
pub mod outbound;
pub mod prefs;
pub mod remote;
pub mod scheduler;
pub mod types;
