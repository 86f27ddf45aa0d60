//! In-memory mesh engine.
//!
//! Implements every engine port against plain collections. Used by the
//! host test-suite and by bench builds that run the control loop without
//! a radio. Calls are recorded in [`MemoryEngine::calls`] unless the log is
//! switched off with [`MemoryEngine::without_call_log`], which long-running
//! bench builds must do. Each fallible operation can be scripted to fail
//! through [`FailureScript`].
//!
//! Storage bracketing is enforced: zone operations outside an
//! `open_storage`/`close_storage` pair fail with `Unavailable`.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::app::ports::{
    DeviceInitForm, DeviceStoreStatus, IdentityStatus, MessagingPort, PreferencePort, QueryPort,
    StartupPort, StoragePort,
};
use crate::error::{EngineError, StorageError};
use crate::prefs::{EngineSettings, Preference};
use crate::types::{
    Alias, DeviceId, InboundMessage, MAX_NEIGHBORS, MAX_PATH_HOPS, MAX_PAYLOAD, MessageFlags,
    MessageId, MessageKind, Payload, StorageZone,
};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    InitEncryptedStorage,
    ValidateLicense,
    OpenDeviceStore,
    FinishDeviceInit,
    Start(EngineSettings),
    Genesis(DeviceInitForm),
    OpenStorage,
    CloseStorage,
    Flush(StorageZone),
    Clear(StorageZone),
    Prune { force: bool },
    Wipe,
    ResetMesh,
    ChangePassword(String),
    Broadcast(Vec<u8>),
    SendDirect { payload: Vec<u8>, to: DeviceId },
    SendViaMesh { payload: Vec<u8>, to: DeviceId },
    SendAck(MessageId),
    SendAckViaMesh(MessageId),
    SyncMesh,
}

/// Errors to inject, per operation. `None` means the call succeeds.
#[derive(Debug, Clone, Default)]
pub struct FailureScript {
    pub init_encrypted_storage: Option<EngineError>,
    pub validate_license: Option<EngineError>,
    pub open_device_store: Option<EngineError>,
    pub finish_device_init: Option<EngineError>,
    pub start: Option<EngineError>,
    pub genesis: Option<EngineError>,
    pub open_storage: Option<StorageError>,
    pub change_password: Option<StorageError>,
    pub broadcast: Option<EngineError>,
    pub send_direct: Option<EngineError>,
    pub send_via_mesh: Option<EngineError>,
    pub send_ack: Option<EngineError>,
    pub send_ack_via_mesh: Option<EngineError>,
}

pub struct MemoryEngine {
    pub device_id: DeviceId,
    pub broadcast_id: DeviceId,

    // -- Startup --
    pub license_valid: bool,
    pub password_protected: bool,
    pub identity_exists: bool,
    pub started: bool,

    // -- Storage --
    pub storage_open: bool,
    pub dirty: [bool; StorageZone::COUNT],
    pub prune_due: bool,
    pub password: String,

    // -- Messaging --
    pub inbox: VecDeque<InboundMessage>,
    /// Poll bound passed to the most recent `has_message`.
    pub last_poll_count: Option<u8>,
    /// Value returned by `sync_mesh`.
    pub mesh_activity: bool,

    // -- Queries --
    pub battery: Option<u8>,
    pub device_alias: Option<Alias>,
    pub cluster_alias: Option<Alias>,
    pub neighbors: Vec<DeviceId>,
    pub aliases: HashMap<DeviceId, Alias>,
    /// Path returned by `find_path`, keyed by destination.
    pub paths: HashMap<DeviceId, Vec<DeviceId>>,

    pub prefs: HashMap<Preference, bool>,

    pub fail: FailureScript,
    pub calls: Vec<EngineCall>,
    record_calls: bool,
    next_message_id: u32,
}

impl MemoryEngine {
    /// A licensed engine with an existing identity and default preferences.
    pub fn new(device_id: DeviceId, broadcast_id: DeviceId) -> Self {
        let prefs = [
            (Preference::LoraEnabled, true),
            (Preference::MeshEnabled, true),
            (Preference::BackpacksEnabled, true),
            (Preference::BackpackRelayEnabled, true),
        ]
        .into_iter()
        .collect();

        Self {
            device_id,
            broadcast_id,
            license_valid: true,
            password_protected: false,
            identity_exists: true,
            started: false,
            storage_open: false,
            dirty: [false; StorageZone::COUNT],
            prune_due: false,
            password: String::new(),
            inbox: VecDeque::new(),
            last_poll_count: None,
            mesh_activity: false,
            battery: None,
            device_alias: None,
            cluster_alias: None,
            neighbors: Vec::new(),
            aliases: HashMap::new(),
            paths: HashMap::new(),
            prefs,
            fail: FailureScript::default(),
            calls: Vec::new(),
            record_calls: true,
            next_message_id: 0,
        }
    }

    /// Queue an inbound message from `sender` addressed to this device.
    ///
    /// Payloads longer than [`MAX_PAYLOAD`] are truncated.
    pub fn push_message(&mut self, sender: DeviceId, kind: MessageKind, payload: &[u8]) {
        let recipient = self.device_id.clone();
        self.push_message_to(sender, recipient, kind, payload);
    }

    pub fn push_message_to(
        &mut self,
        sender: DeviceId,
        recipient: DeviceId,
        kind: MessageKind,
        payload: &[u8],
    ) {
        self.next_message_id += 1;
        let mut message_id = MessageId::new();
        let _ = core::fmt::Write::write_fmt(&mut message_id, format_args!("m{}", self.next_message_id));
        let len = payload.len().min(MAX_PAYLOAD);
        self.inbox.push_back(InboundMessage {
            sender,
            recipient,
            message_id,
            flags: MessageFlags {
                kind,
                ack_requested: true,
            },
            is_ack: false,
            payload: Payload::from_slice(&payload[..len]).unwrap_or_default(),
        });
    }

    /// Stop recording calls. `calls` stays empty from here on.
    pub fn without_call_log(mut self) -> Self {
        self.record_calls = false;
        self.calls = Vec::new();
        self
    }

    pub fn mark_dirty(&mut self, zone: StorageZone) {
        self.dirty[zone.index()] = true;
    }

    /// Recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&mut self, call: EngineCall) {
        if self.record_calls {
            self.calls.push(call);
        }
    }

    fn scripted(&self, err: Option<EngineError>) -> Result<(), EngineError> {
        err.map_or(Ok(()), Err)
    }

    fn require_open(&self) -> Result<(), StorageError> {
        if self.storage_open {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Startup
// ───────────────────────────────────────────────────────────────

impl StartupPort for MemoryEngine {
    fn init_encrypted_storage(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::InitEncryptedStorage);
        self.scripted(self.fail.init_encrypted_storage)
    }

    fn validate_license(&mut self) -> Result<bool, EngineError> {
        self.record(EngineCall::ValidateLicense);
        self.scripted(self.fail.validate_license)?;
        Ok(self.license_valid)
    }

    fn open_device_store(&mut self) -> Result<DeviceStoreStatus, EngineError> {
        self.record(EngineCall::OpenDeviceStore);
        self.scripted(self.fail.open_device_store)?;
        Ok(if self.password_protected {
            DeviceStoreStatus::PasswordRequired
        } else {
            DeviceStoreStatus::Open
        })
    }

    fn finish_device_init(&mut self) -> Result<IdentityStatus, EngineError> {
        self.record(EngineCall::FinishDeviceInit);
        self.scripted(self.fail.finish_device_init)?;
        Ok(if self.identity_exists {
            IdentityStatus::Initialized
        } else {
            IdentityStatus::NeedsGenesis
        })
    }

    fn start(&mut self, settings: &EngineSettings) -> Result<(), EngineError> {
        self.record(EngineCall::Start(*settings));
        self.scripted(self.fail.start)?;
        self.started = true;
        Ok(())
    }

    fn genesis(&mut self, form: &DeviceInitForm) -> Result<(), EngineError> {
        self.record(EngineCall::Genesis(form.clone()));
        self.scripted(self.fail.genesis)?;
        self.identity_exists = true;
        self.device_alias = Some(form.device_alias.clone());
        self.cluster_alias = Some(form.cluster_alias.clone());
        debug!("MemoryEngine: identity created as {}", form.device_alias);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Storage
// ───────────────────────────────────────────────────────────────

impl StoragePort for MemoryEngine {
    fn open_storage(&mut self) -> Result<(), StorageError> {
        if let Some(e) = self.fail.open_storage {
            return Err(e);
        }
        if self.storage_open {
            return Err(StorageError::Unavailable);
        }
        self.record(EngineCall::OpenStorage);
        self.storage_open = true;
        Ok(())
    }

    fn close_storage(&mut self) {
        self.record(EngineCall::CloseStorage);
        self.storage_open = false;
    }

    fn is_dirty(&self, zone: StorageZone) -> bool {
        self.dirty[zone.index()]
    }

    fn flush_zone(&mut self, zone: StorageZone) -> Result<(), StorageError> {
        self.require_open()?;
        self.record(EngineCall::Flush(zone));
        self.dirty[zone.index()] = false;
        Ok(())
    }

    fn clear_zone(&mut self, zone: StorageZone) -> Result<(), StorageError> {
        self.require_open()?;
        self.record(EngineCall::Clear(zone));
        self.dirty[zone.index()] = false;
        Ok(())
    }

    fn is_prune_due(&self) -> bool {
        self.prune_due
    }

    fn prune(&mut self, force: bool) -> Result<(), StorageError> {
        self.require_open()?;
        self.record(EngineCall::Prune { force });
        self.prune_due = false;
        Ok(())
    }

    fn wipe(&mut self) -> Result<(), StorageError> {
        self.require_open()?;
        self.record(EngineCall::Wipe);
        self.identity_exists = false;
        self.dirty = [false; StorageZone::COUNT];
        self.inbox.clear();
        Ok(())
    }

    fn reset_mesh(&mut self) -> Result<(), StorageError> {
        self.require_open()?;
        self.record(EngineCall::ResetMesh);
        self.dirty[StorageZone::MeshPackets.index()] = true;
        self.dirty[StorageZone::MeshGraph.index()] = true;
        Ok(())
    }

    fn change_password(&mut self, password: &str) -> Result<(), StorageError> {
        self.require_open()?;
        self.record(EngineCall::ChangePassword(password.to_owned()));
        if let Some(e) = self.fail.change_password {
            return Err(e);
        }
        password.clone_into(&mut self.password);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Messaging
// ───────────────────────────────────────────────────────────────

impl MessagingPort for MemoryEngine {
    fn device_id(&self) -> DeviceId {
        self.device_id.clone()
    }

    fn broadcast_id(&self) -> DeviceId {
        self.broadcast_id.clone()
    }

    fn mesh_enabled(&self) -> bool {
        self.is_enabled(Preference::MeshEnabled)
    }

    fn broadcast(&mut self, payload: &[u8], _kind: MessageKind) -> Result<(), EngineError> {
        self.record(EngineCall::Broadcast(payload.to_vec()));
        self.scripted(self.fail.broadcast)
    }

    fn send_direct(
        &mut self,
        payload: &[u8],
        recipient: &DeviceId,
        _flags: MessageFlags,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::SendDirect {
            payload: payload.to_vec(),
            to: recipient.clone(),
        });
        self.scripted(self.fail.send_direct)
    }

    fn send_via_mesh(
        &mut self,
        payload: &[u8],
        recipient: &DeviceId,
        _flags: MessageFlags,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::SendViaMesh {
            payload: payload.to_vec(),
            to: recipient.clone(),
        });
        self.scripted(self.fail.send_via_mesh)
    }

    fn send_ack(&mut self, message: &InboundMessage) -> Result<(), EngineError> {
        self.record(EngineCall::SendAck(message.message_id.clone()));
        self.scripted(self.fail.send_ack)
    }

    fn send_ack_via_mesh(&mut self, message: &InboundMessage) -> Result<(), EngineError> {
        self.record(EngineCall::SendAckViaMesh(message.message_id.clone()));
        self.scripted(self.fail.send_ack_via_mesh)
    }

    fn has_message(&mut self, poll_count: u8) -> bool {
        self.last_poll_count = Some(poll_count);
        !self.inbox.is_empty()
    }

    fn retrieve_message(&mut self) -> Option<InboundMessage> {
        self.inbox.pop_front()
    }

    fn sync_mesh(&mut self) -> bool {
        self.record(EngineCall::SyncMesh);
        self.mesh_activity
    }
}

// ───────────────────────────────────────────────────────────────
// Queries and preferences
// ───────────────────────────────────────────────────────────────

impl QueryPort for MemoryEngine {
    fn battery_percent(&self) -> Option<u8> {
        self.battery
    }

    fn nearby_devices(&self, limit: usize) -> heapless::Vec<DeviceId, MAX_NEIGHBORS> {
        self.neighbors.iter().take(limit).take(MAX_NEIGHBORS).cloned().collect()
    }

    fn resolve_alias(&self, id: &DeviceId) -> Option<Alias> {
        self.aliases.get(id).cloned()
    }

    fn device_alias(&self) -> Option<Alias> {
        self.device_alias.clone()
    }

    fn cluster_alias(&self) -> Option<Alias> {
        self.cluster_alias.clone()
    }

    fn find_path(&self, _from: &DeviceId, to: &DeviceId) -> heapless::Vec<DeviceId, MAX_PATH_HOPS> {
        self.paths
            .get(to)
            .map(|hops| hops.iter().take(MAX_PATH_HOPS).cloned().collect())
            .unwrap_or_default()
    }
}

impl PreferencePort for MemoryEngine {
    fn is_enabled(&self, pref: Preference) -> bool {
        self.prefs.get(&pref).copied().unwrap_or(false)
    }

    fn set_enabled(&mut self, pref: Preference, enabled: bool) {
        self.prefs.insert(pref, enabled);
    }
}
