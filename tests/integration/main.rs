//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the in-memory engine and recording UI adapters. All tests run
//! on the host with no radio or display required.

mod cycle_tests;
mod mock_ports;
mod startup_tests;
