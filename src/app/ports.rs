//! Port traits: the hexagonal boundary between the control layer and the
//! mesh engine / user-facing I/O.
//!
//! ```text
//!   MeshEngine adapter ──▶ Port traits ──▶ ControlService (domain)
//!   UiPort / ControlSurface ◀──────────────┘
//! ```
//!
//! The engine owns encryption, storage, routing and radios. The control
//! layer only sequences it, so every engine capability is a narrow trait
//! and [`MeshEngine`] is their union. Components take the smallest trait
//! they need, which keeps each one testable against a tiny mock.
//!
//! ## Storage bracketing
//!
//! Every [`StoragePort`] mutation must happen between a successful
//! `open_storage` and the matching `close_storage`. A failed open means
//! the store is busy; callers defer and retry on a later tick.

use crate::error::{EngineError, StorageError};
use crate::prefs::{EngineSettings, Preference};
use crate::types::{
    Alias, DeviceId, InboundMessage, MAX_NEIGHBORS, MAX_PATH_HOPS, MessageFlags, MessageKind,
    StorageZone,
};

// ───────────────────────────────────────────────────────────────
// Startup port
// ───────────────────────────────────────────────────────────────

/// State of the device store after opening it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStoreStatus {
    Open,
    /// The store is password protected and needs user input.
    PasswordRequired,
}

/// State of the local identity after device init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStatus {
    Initialized,
    /// No identity exists yet; a genesis form must be submitted.
    NeedsGenesis,
}

/// First-boot identity parameters submitted to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInitForm {
    pub device_alias: Alias,
    pub cluster_alias: Alias,
    pub password: heapless::String<32>,
    pub channel_count: u8,
    pub hop_schedule: heapless::String<8>,
    pub center_frequency_mhz: f32,
    pub daylight_saving: bool,
    pub time_zone: heapless::String<24>,
}

/// Boot-time engine bring-up, one call per startup phase.
///
/// Any call may answer [`EngineError::NotReady`] to be retried later.
pub trait StartupPort {
    fn init_encrypted_storage(&mut self) -> Result<(), EngineError>;

    /// `Ok(false)` means the license is present but invalid.
    fn validate_license(&mut self) -> Result<bool, EngineError>;

    fn open_device_store(&mut self) -> Result<DeviceStoreStatus, EngineError>;

    fn finish_device_init(&mut self) -> Result<IdentityStatus, EngineError>;

    fn start(&mut self, settings: &EngineSettings) -> Result<(), EngineError>;

    /// Create the local identity. Takes effect after a restart.
    fn genesis(&mut self, form: &DeviceInitForm) -> Result<(), EngineError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port
// ───────────────────────────────────────────────────────────────

/// Zoned persistent store of the engine.
pub trait StoragePort {
    fn open_storage(&mut self) -> Result<(), StorageError>;

    fn close_storage(&mut self);

    /// The zone has in-memory changes not yet written out.
    fn is_dirty(&self, zone: StorageZone) -> bool;

    fn flush_zone(&mut self, zone: StorageZone) -> Result<(), StorageError>;

    /// Drop every record held in the zone.
    fn clear_zone(&mut self, zone: StorageZone) -> Result<(), StorageError>;

    fn is_prune_due(&self) -> bool;

    /// Remove expired records; `force` ignores the prune schedule.
    fn prune(&mut self, force: bool) -> Result<(), StorageError>;

    /// Erase everything, including the identity.
    fn wipe(&mut self) -> Result<(), StorageError>;

    /// Forget learned mesh topology and queued mesh traffic.
    fn reset_mesh(&mut self) -> Result<(), StorageError>;

    fn change_password(&mut self, password: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Messaging port
// ───────────────────────────────────────────────────────────────

/// Radio-facing send and receive operations.
pub trait MessagingPort {
    fn device_id(&self) -> DeviceId;

    fn broadcast_id(&self) -> DeviceId;

    fn mesh_enabled(&self) -> bool;

    fn broadcast(&mut self, payload: &[u8], kind: MessageKind) -> Result<(), EngineError>;

    /// Single-hop send to a device in range.
    fn send_direct(
        &mut self,
        payload: &[u8],
        recipient: &DeviceId,
        flags: MessageFlags,
    ) -> Result<(), EngineError>;

    /// Hand the message to the mesh for multi-hop delivery.
    fn send_via_mesh(
        &mut self,
        payload: &[u8],
        recipient: &DeviceId,
        flags: MessageFlags,
    ) -> Result<(), EngineError>;

    fn send_ack(&mut self, message: &InboundMessage) -> Result<(), EngineError>;

    fn send_ack_via_mesh(&mut self, message: &InboundMessage) -> Result<(), EngineError>;

    /// Poll the radios up to `poll_count` times for an inbound message.
    fn has_message(&mut self, poll_count: u8) -> bool;

    fn retrieve_message(&mut self) -> Option<InboundMessage>;

    /// Run one mesh synchronisation round. `true` if anything was exchanged.
    fn sync_mesh(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Query port
// ───────────────────────────────────────────────────────────────

/// Read-only status queries answered by the engine.
pub trait QueryPort {
    /// `None` when the device runs without a battery.
    fn battery_percent(&self) -> Option<u8>;

    fn nearby_devices(&self, limit: usize) -> heapless::Vec<DeviceId, MAX_NEIGHBORS>;

    fn resolve_alias(&self, id: &DeviceId) -> Option<Alias>;

    /// This device's own alias. `None` until an identity exists.
    fn device_alias(&self) -> Option<Alias>;

    fn cluster_alias(&self) -> Option<Alias>;

    /// Hops from `from` to `to`, both ends included. Empty if unreachable.
    fn find_path(&self, from: &DeviceId, to: &DeviceId) -> heapless::Vec<DeviceId, MAX_PATH_HOPS>;
}

// ───────────────────────────────────────────────────────────────
// Preference port
// ───────────────────────────────────────────────────────────────

pub trait PreferencePort {
    fn is_enabled(&self, pref: Preference) -> bool;

    fn set_enabled(&mut self, pref: Preference, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// Mesh engine (union of the engine-side ports)
// ───────────────────────────────────────────────────────────────

/// Everything the control layer needs from the engine.
pub trait MeshEngine: StartupPort + StoragePort + MessagingPort + QueryPort + PreferencePort {}

impl<T> MeshEngine for T where T: StartupPort + StoragePort + MessagingPort + QueryPort + PreferencePort
{}

// ───────────────────────────────────────────────────────────────
// UI port (driven adapter: domain → display / status LEDs)
// ───────────────────────────────────────────────────────────────

/// Status output and cooperative scheduling hooks of the front panel.
pub trait UiPort {
    fn show_status(&mut self, status: &str);

    /// Progress of the current activity in `0.0..=1.0`.
    fn show_progress(&mut self, fraction: f32);

    fn show_cache_used(&mut self, percent: u8);

    fn channel_hopped(&mut self, channel: u8);

    fn ping_received(&mut self, from: &DeviceId);

    /// A user-facing message arrived and should be surfaced.
    fn message_received(&mut self, message: &InboundMessage);

    /// The user pressed something since the last poll.
    fn user_interrupted(&mut self) -> bool;

    /// Let the display and input tasks run.
    fn yield_now(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Control surface (mode-specific screens)
// ───────────────────────────────────────────────────────────────

/// Screens that differ between control modes.
///
/// A headless base has no keyboard, so its surface can only report a
/// password-protected store; startup then halts.
pub trait ControlSurface {
    fn prompt_password(&mut self);

    fn show_busy(&mut self, title: &str, description: &str, status: &str, cancellable: bool);

    fn update_busy_status(&mut self, status: &str);

    fn show_title(&mut self, title: &str);
}
