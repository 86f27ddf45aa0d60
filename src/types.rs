//! Shared value types crossing the engine boundary.
//!
//! Everything here is fixed-capacity (`heapless`) so the control layer
//! never allocates on the message path.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Width of a device identifier on the wire.
pub const DEVICE_ID_LEN: usize = 8;

/// Capacity of the single outbound payload buffer, and of inbound payloads.
pub const MAX_PAYLOAD: usize = 1024;

/// Upper bound on devices reported by a neighbor query.
pub const MAX_NEIGHBORS: usize = 16;

/// Upper bound on hops in a resolved mesh path.
pub const MAX_PATH_HOPS: usize = 12;

/// Human-readable alias attached to a device id.
pub type Alias = heapless::String<12>;

/// Engine-assigned identifier of a received message.
pub type MessageId = heapless::String<16>;

/// Payload bytes of a single message.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

// ───────────────────────────────────────────────────────────────
// DeviceId
// ───────────────────────────────────────────────────────────────

/// Fixed-width printable identifier of a mesh device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(heapless::String<DEVICE_ID_LEN>);

impl DeviceId {
    /// Accepts exactly [`DEVICE_ID_LEN`] printable ASCII characters.
    pub fn new(id: &str) -> Option<Self> {
        if id.len() != DEVICE_ID_LEN || !id.bytes().all(|b| b.is_ascii_graphic()) {
            return None;
        }
        let mut s = heapless::String::new();
        s.push_str(id).ok()?;
        Some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ───────────────────────────────────────────────────────────────
// Messages
// ───────────────────────────────────────────────────────────────

/// Whether a message carries user content or a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageKind {
    #[default]
    Plain,
    Control,
}

/// Delivery flags passed to the engine with every send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageFlags {
    pub kind: MessageKind,
    pub ack_requested: bool,
}

/// A message pulled from the engine's inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: DeviceId,
    pub recipient: DeviceId,
    pub message_id: MessageId,
    pub flags: MessageFlags,
    /// The message is itself an acknowledgement.
    pub is_ack: bool,
    pub payload: Payload,
}

// ───────────────────────────────────────────────────────────────
// Storage zones
// ───────────────────────────────────────────────────────────────

/// Independently flushable regions of the engine's persistent store.
///
/// Variant order is the scan order of the flush scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StorageZone {
    Messages = 0,
    Packets = 1,
    MeshPackets = 2,
    PingTable = 3,
    MeshGraph = 4,
    Locations = 5,
    Truststore = 6,
}

impl StorageZone {
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Messages,
        Self::Packets,
        Self::MeshPackets,
        Self::PingTable,
        Self::MeshGraph,
        Self::Locations,
        Self::Truststore,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Packets => "packets",
            Self::MeshPackets => "mesh packets",
            Self::PingTable => "ping table",
            Self::MeshGraph => "mesh graph",
            Self::Locations => "locations",
            Self::Truststore => "truststore",
        }
    }
}

impl fmt::Display for StorageZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
