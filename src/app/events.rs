//! Events flowing out of, and notices flowing into, the control service.
//!
//! [`ControlEffect`] is what a tick asks the firmware to do next; the
//! binary owns the actual reset and idle loop. [`EngineNotice`]s are raised
//! by the engine adapter and forwarded to the UI port.

use crate::types::DeviceId;

/// Why a restart was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    FactoryReset,
    MeshReset,
    /// Explicit restart, or a preference that needs one.
    Requested,
    PasswordChanged,
    /// A new identity was created and needs a fresh boot.
    DeviceInitialized,
}

/// Why the device stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    StartupFailed,
    Unlicensed,
    /// The store is password protected and no password can be entered.
    PasswordRejected,
}

/// Result of one service tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEffect {
    Continue,
    Restart(RestartReason),
    Halt(HaltReason),
}

/// Notifications originating in the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    ChannelHopped(u8),
    PingReceived(DeviceId),
    /// Progress of a long engine operation in `0.0..=1.0`.
    Progress(f32),
    CacheUsed(u8),
    Status(heapless::String<32>),
}
