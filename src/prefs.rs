//! Persistent boolean preferences and the settings derived from them.

use crate::app::ports::PreferencePort;

/// Boolean preferences held by the engine's preference store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preference {
    WifiEnabled,
    MeshEnabled,
    WiredEnabled,
    LoraEnabled,
    MeshLearningEnabled,
    BackpacksEnabled,
    BackpackRelayEnabled,
    BackpackRelayRemoteEnabled,
    TruststoreLocked,
    KeyForwarding,
    LocationSharingEnabled,
}

impl Preference {
    /// Changing one of these only takes effect after a restart.
    pub const fn requires_restart(self) -> bool {
        matches!(
            self,
            Self::WifiEnabled
                | Self::MeshEnabled
                | Self::WiredEnabled
                | Self::LoraEnabled
                | Self::BackpacksEnabled
                | Self::BackpackRelayEnabled
                | Self::BackpackRelayRemoteEnabled
        )
    }
}

/// Transport and trust settings applied when the engine starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineSettings {
    pub lora: bool,
    pub wifi: bool,
    pub wired: bool,
    pub key_forwarding: bool,
    pub truststore_locked: bool,
    pub location_sharing: bool,
}

impl EngineSettings {
    pub fn from_prefs(prefs: &impl PreferencePort) -> Self {
        Self {
            lora: prefs.is_enabled(Preference::LoraEnabled),
            wifi: prefs.is_enabled(Preference::WifiEnabled),
            wired: prefs.is_enabled(Preference::WiredEnabled),
            key_forwarding: prefs.is_enabled(Preference::KeyForwarding),
            truststore_locked: prefs.is_enabled(Preference::TruststoreLocked),
            location_sharing: prefs.is_enabled(Preference::LocationSharingEnabled),
        }
    }

    /// At least one radio or wired channel is enabled.
    pub fn any_channel(&self) -> bool {
        self.lora || self.wifi || self.wired
    }
}
