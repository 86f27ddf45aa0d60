//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements               | Connects to                |
//! |-----------------|--------------------------|----------------------------|
//! | `log_ui`        | UiPort, ControlSurface   | Serial log output          |
//! | `memory_engine` | MeshEngine (all ports)   | In-memory collections      |
//! | `time`          | clock                    | ESP32 system timer         |

pub mod log_ui;
pub mod memory_engine;
pub mod time;
