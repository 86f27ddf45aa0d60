//! Control layer configuration
//!
//! All tunable timing and budget parameters of the base station.
//! Defaults match the shipped firmware; `config/default.json` can
//! override them at build time.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::StorageZone;

/// Core control configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    // --- Message draining ---
    /// Inbound messages polled per responsive cycle
    pub responsive_poll_count: u8,
    /// Inbound messages polled per full cycle
    pub full_poll_count: u8,
    /// Hard cap on messages read in a single cycle
    pub max_reads_per_cycle: u8,

    // --- Remote commands ---
    /// Delay before a remote-command reply is sent (ms)
    pub reply_delay_ms: u32,
    /// Maximum devices listed in a neighbor report
    pub neighbor_report_limit: u8,

    // --- Pauses ---
    /// Messaging pause after reaching Ready (ms)
    pub ready_settle_ms: u32,
    /// Messaging pause after any user interaction (ms)
    pub user_pause_ms: u32,

    // --- Backpacks ---
    /// How long the relay output is held high (ms)
    pub relay_pulse_ms: u32,

    // --- Timing ---
    /// Main loop tick interval (ms)
    pub tick_interval_ms: u32,
    /// Every Nth tick runs a full cycle instead of a responsive one
    pub full_cycle_every: u8,

    /// Per-zone flush delay after a zone first becomes dirty
    pub flush_intervals: FlushIntervals,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            responsive_poll_count: 2,
            full_poll_count: 10,
            max_reads_per_cycle: 5,

            reply_delay_ms: 500,
            neighbor_report_limit: 10,

            ready_settle_ms: 2000,
            user_pause_ms: 5000,

            relay_pulse_ms: 5000,

            tick_interval_ms: 100,
            full_cycle_every: 10,

            flush_intervals: FlushIntervals::default(),
        }
    }
}

impl ControlConfig {
    /// Reject values that would stall or starve the control loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.responsive_poll_count == 0 {
            return Err(ConfigError::ValidationFailed("responsive_poll_count"));
        }
        if self.full_poll_count < self.responsive_poll_count {
            return Err(ConfigError::ValidationFailed("full_poll_count"));
        }
        if self.max_reads_per_cycle == 0 {
            return Err(ConfigError::ValidationFailed("max_reads_per_cycle"));
        }
        if self.neighbor_report_limit as usize > crate::types::MAX_NEIGHBORS {
            return Err(ConfigError::ValidationFailed("neighbor_report_limit"));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms"));
        }
        if self.full_cycle_every == 0 {
            return Err(ConfigError::ValidationFailed("full_cycle_every"));
        }
        self.flush_intervals.validate()
    }

    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

/// Flush delay per storage zone (ms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushIntervals {
    pub messages_ms: u32,
    pub packets_ms: u32,
    pub mesh_packets_ms: u32,
    pub ping_table_ms: u32,
    pub mesh_graph_ms: u32,
    pub locations_ms: u32,
    /// Any zone without a dedicated interval
    pub default_ms: u32,
}

impl Default for FlushIntervals {
    fn default() -> Self {
        Self {
            messages_ms: 20_000,
            packets_ms: 120_000,
            mesh_packets_ms: 60_000,
            ping_table_ms: 90_000,
            mesh_graph_ms: 300_000,
            locations_ms: 70_000,
            default_ms: 30_000,
        }
    }
}

impl FlushIntervals {
    pub fn interval_for(&self, zone: StorageZone) -> u32 {
        match zone {
            StorageZone::Messages => self.messages_ms,
            StorageZone::Packets => self.packets_ms,
            StorageZone::MeshPackets => self.mesh_packets_ms,
            StorageZone::PingTable => self.ping_table_ms,
            StorageZone::MeshGraph => self.mesh_graph_ms,
            StorageZone::Locations => self.locations_ms,
            StorageZone::Truststore => self.default_ms,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if StorageZone::ALL.iter().any(|&z| self.interval_for(z) == 0) {
            return Err(ConfigError::ValidationFailed("flush_intervals"));
        }
        Ok(())
    }
}
