//! Inbound commands to the control service.
//!
//! These represent actions requested by the outside world (front panel,
//! settings screens, a host shell) that the
//! [`ControlService`](super::service::ControlService) turns into pending
//! intents or immediate state changes.

use crate::intents::MAX_PASSWORD_LEN;
use crate::outbound::Recipient;
use crate::prefs::Preference;
use crate::types::{Payload, StorageZone};

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Wipe all storage and restart.
    FactoryReset,

    /// Forget mesh state and restart.
    ResetMesh,

    /// Flush dirty storage and restart.
    Restart,

    /// Re-key the store, then restart.
    ChangePassword(heapless::String<MAX_PASSWORD_LEN>),

    /// Empty one storage zone on the next idle cycle.
    ClearZone(StorageZone),

    SetListening(bool),

    /// Persist a preference; restart-requiring ones queue a restart.
    SetPreference(Preference, bool),

    /// Hold off message processing for the given duration (ms).
    PauseMessaging(u32),

    /// Replace the outbound message and send it on the next cycle.
    SendMessage { payload: Payload, recipient: Recipient },
}
