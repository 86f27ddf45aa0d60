//! Backpacks: optional accessories plugged into the base station.
//!
//! Each accessory implements [`Backpack`] and is registered once at boot
//! into a fixed-capacity table. User events and remote `BK:` requests are
//! routed by a linear scan; the table is tiny, so no index is kept.
//!
//! Remote request wire format:
//!
//! ```text
//!   "BK:" <kind tag> [accessory-specific bytes]
//! ```

pub mod relay;

use log::{info, warn};

use crate::app::ports::PreferencePort;
use crate::prefs::Preference;
use crate::types::DeviceId;

/// Capacity of the accessory table.
pub const MAX_BACKPACKS: usize = 2;

const REQUEST_PREFIX: &[u8; 3] = b"BK:";

/// Accessory kind, identified on the wire by a single tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BackpackKind {
    /// Reserved; no thermal accessory ships yet.
    Thermal = b'T',
    Relay = b'R',
}

impl BackpackKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'T' => Some(Self::Thermal),
            b'R' => Some(Self::Relay),
            _ => None,
        }
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// User-originated events an accessory may react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    ActionButton,
    FactoryResetHeld,
}

/// An accessory driver.
pub trait Backpack {
    /// `true` if the event was consumed.
    fn handle_user_event(&mut self, event: UserEvent) -> bool;

    /// Handle a remote `BK:` request. Only called when [`remote_enabled`]
    /// is `true`.
    ///
    /// [`remote_enabled`]: Backpack::remote_enabled
    fn handle_message(&mut self, payload: &[u8], sender: &DeviceId, recipient: &DeviceId) -> bool;

    /// Bring the accessory up. Safe to call more than once; absent or
    /// faulty hardware leaves it not running.
    fn init(&mut self, prefs: &dyn PreferencePort) -> bool;

    fn is_running(&self) -> bool;

    fn name(&self) -> &'static str;

    fn kind(&self) -> BackpackKind;

    /// Remote peers may trigger this accessory.
    fn remote_enabled(&self) -> bool;
}

/// `true` if the payload has the `BK:<tag>` shape.
pub fn is_backpack_request(payload: &[u8]) -> bool {
    payload.len() >= 4 && payload[..3] == REQUEST_PREFIX[..]
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct BackpackDispatcher {
    slots: heapless::Vec<Box<dyn Backpack>, MAX_BACKPACKS>,
}

impl BackpackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an accessory. Hands it back if the table is full.
    pub fn register(&mut self, backpack: Box<dyn Backpack>) -> Result<(), Box<dyn Backpack>> {
        let name = backpack.name();
        self.slots.push(backpack)?;
        info!("Backpacks: registered {name}");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Initialise every registered accessory. Returns how many are running.
    pub fn init_all(&mut self, prefs: &dyn PreferencePort) -> usize {
        if !prefs.is_enabled(Preference::BackpacksEnabled) {
            info!("Backpacks: disabled in preferences");
            return 0;
        }
        let mut running = 0;
        for backpack in &mut self.slots {
            if backpack.init(prefs) {
                running += 1;
            } else {
                warn!("Backpacks: {} not running", backpack.name());
            }
        }
        running
    }

    /// Offer a user event to running accessories; first taker wins.
    pub fn dispatch_event(&mut self, event: UserEvent) -> bool {
        self.slots
            .iter_mut()
            .filter(|b| b.is_running())
            .any(|b| b.handle_user_event(event))
    }

    /// Route a remote `BK:` request to the accessory whose kind matches.
    pub fn dispatch_message(&mut self, payload: &[u8], sender: &DeviceId, recipient: &DeviceId) -> bool {
        if !is_backpack_request(payload) {
            return false;
        }
        let Some(kind) = BackpackKind::from_tag(payload[3]) else {
            warn!("Backpacks: unknown kind tag {:#04x} from {sender}", payload[3]);
            return false;
        };
        let Some(backpack) = self
            .slots
            .iter_mut()
            .find(|b| b.kind() == kind && b.is_running())
        else {
            warn!("Backpacks: no running {kind:?} accessory for request from {sender}");
            return false;
        };
        if !backpack.remote_enabled() {
            warn!(
                "Backpacks: remote {} request from {sender} refused, not enabled",
                backpack.name()
            );
            return false;
        }
        backpack.handle_message(payload, sender, recipient)
    }
}
