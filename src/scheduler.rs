//! Storage flush scheduler.
//!
//! Decides when a dirty storage zone is written out. A zone is armed the
//! first time it is seen dirty and flushed once its interval has elapsed,
//! so bursts of changes coalesce into one write.
//!
//! ```text
//!   clean ──[dirty seen, pass 2]──▶ armed(deadline = now + interval)
//!     ▲                                  │
//!     └────────[now > deadline, pass 1: open · flush · close]
//! ```
//!
//! At most one zone is flushed per [`FlushScheduler::maybe_flush`] call,
//! which bounds the time a control cycle spends on flash writes.

use log::{debug, info, warn};

use crate::app::ports::StoragePort;
use crate::config::FlushIntervals;
use crate::types::StorageZone;

// ═══════════════════════════════════════════════════════════════
//  Zone slots
// ═══════════════════════════════════════════════════════════════

/// Flush bookkeeping for one zone.
#[derive(Debug, Clone, Copy, Default)]
struct ZoneSlot {
    next_flush_deadline: Option<u64>,
    flush_interval_ms: u32,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

pub struct FlushScheduler {
    zones: [ZoneSlot; StorageZone::COUNT],
}

impl Default for FlushScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FlushScheduler {
    /// All zones start with the default intervals and no deadline.
    pub fn new() -> Self {
        let mut scheduler = Self {
            zones: [ZoneSlot::default(); StorageZone::COUNT],
        };
        scheduler.configure(&FlushIntervals::default());
        scheduler
    }

    /// Install per-zone intervals and drop any pending deadlines.
    pub fn configure(&mut self, intervals: &FlushIntervals) {
        for zone in StorageZone::ALL {
            self.zones[zone.index()] = ZoneSlot {
                next_flush_deadline: None,
                flush_interval_ms: intervals.interval_for(zone),
            };
        }
    }

    pub fn deadline(&self, zone: StorageZone) -> Option<u64> {
        self.zones[zone.index()].next_flush_deadline
    }

    pub fn interval(&self, zone: StorageZone) -> u32 {
        self.zones[zone.index()].flush_interval_ms
    }

    /// Flush at most one overdue dirty zone, otherwise arm newly dirty ones.
    ///
    /// Returns `true` only if a zone was flushed during this call.
    pub fn maybe_flush(&mut self, now_ms: u64, storage: &mut impl StoragePort) -> bool {
        // Pass 1: first overdue dirty zone, in fixed order.
        for zone in StorageZone::ALL {
            let slot = self.zones[zone.index()];
            let overdue = slot.next_flush_deadline.is_some_and(|deadline| now_ms > deadline);
            if !overdue || !storage.is_dirty(zone) {
                continue;
            }

            if let Err(e) = storage.open_storage() {
                warn!("Flush: storage unavailable for {zone} ({e}), retrying later");
                break;
            }
            let result = storage.flush_zone(zone);
            storage.close_storage();

            match result {
                Ok(()) => {
                    info!("Flush: wrote {zone}");
                    self.zones[zone.index()].next_flush_deadline = None;
                    return true;
                }
                Err(e) => {
                    warn!("Flush: {zone} failed ({e}), keeping deadline");
                    break;
                }
            }
        }

        // Pass 2: arm dirty zones without a deadline.
        for zone in StorageZone::ALL {
            let slot = &mut self.zones[zone.index()];
            if slot.next_flush_deadline.is_none() && storage.is_dirty(zone) {
                let deadline = now_ms + u64::from(slot.flush_interval_ms);
                slot.next_flush_deadline = Some(deadline);
                debug!("Flush: {zone} armed for t={deadline}");
            }
        }

        false
    }

    /// Write every dirty zone inside one storage bracket.
    ///
    /// Used before restarts and resets, where pending changes must not be
    /// lost. The caller owns the open/close bracket. Returns the number of
    /// zones written.
    pub fn flush_all_dirty(&mut self, storage: &mut impl StoragePort) -> usize {
        let mut flushed = 0;
        for zone in StorageZone::ALL {
            if !storage.is_dirty(zone) {
                continue;
            }
            match storage.flush_zone(zone) {
                Ok(()) => {
                    self.zones[zone.index()].next_flush_deadline = None;
                    flushed += 1;
                }
                Err(e) => warn!("Flush: {zone} failed during shutdown flush ({e})"),
            }
        }
        if flushed > 0 {
            info!("Flush: wrote {flushed} dirty zone(s)");
        }
        flushed
    }
}
