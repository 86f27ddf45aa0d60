//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the orchestration rules of the base station:
//! startup sequencing, the control cycle, command handling and engine
//! notifications. All interaction with the mesh engine and the front panel
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
