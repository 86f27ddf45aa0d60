//! Deferred actions queued by commands and consumed by the control cycle.
//!
//! Intents are set from anywhere (remote commands, buttons, the service
//! API) but only executed at the top of a cycle, where storage can be
//! bracketed safely. An intent survives until it has been carried out.

use crate::app::events::RestartReason;
use crate::types::StorageZone;

/// Longest password accepted by [`PendingIntents::password_change`].
pub const MAX_PASSWORD_LEN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingIntents {
    pub factory_reset: bool,
    pub mesh_reset: bool,
    pub restart: Option<RestartReason>,
    pub password_change: Option<heapless::String<MAX_PASSWORD_LEN>>,
    zone_clears: [bool; StorageZone::COUNT],
}

impl PendingIntents {
    pub fn queue_zone_clear(&mut self, zone: StorageZone) {
        self.zone_clears[zone.index()] = true;
    }

    pub fn is_zone_clear_queued(&self, zone: StorageZone) -> bool {
        self.zone_clears[zone.index()]
    }

    pub fn has_zone_clears(&self) -> bool {
        self.zone_clears.iter().any(|&queued| queued)
    }

    /// Queued zones in scan order; the queue is emptied.
    pub fn take_zone_clears(&mut self) -> heapless::Vec<StorageZone, { StorageZone::COUNT }> {
        let mut zones = heapless::Vec::new();
        for zone in StorageZone::ALL {
            if core::mem::take(&mut self.zone_clears[zone.index()]) {
                // Capacity equals the zone count.
                let _ = zones.push(zone);
            }
        }
        zones
    }

    /// Returns `false` if the password is longer than [`MAX_PASSWORD_LEN`].
    pub fn queue_password_change(&mut self, password: &str) -> bool {
        let mut buf = heapless::String::new();
        if buf.push_str(password).is_err() {
            return false;
        }
        self.password_change = Some(buf);
        true
    }
}
