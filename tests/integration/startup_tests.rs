//! Startup sequencer tests: phase order, idempotence and failure targets.

use fieldnode::adapters::memory_engine::{EngineCall, MemoryEngine};
use fieldnode::app::ports::PreferencePort;
use fieldnode::config::ControlConfig;
use fieldnode::error::{EngineError, StorageError};
use fieldnode::fsm::context::StartupContext;
use fieldnode::fsm::{StartupPhase, StartupSequencer};
use fieldnode::prefs::Preference;
use fieldnode::scheduler::FlushScheduler;
use fieldnode::types::StorageZone;

use super::mock_ports::engine;

struct Rig {
    engine: MemoryEngine,
    scheduler: FlushScheduler,
    config: ControlConfig,
    sequencer: StartupSequencer<MemoryEngine>,
}

impl Rig {
    fn new(engine: MemoryEngine) -> Self {
        Self {
            engine,
            scheduler: FlushScheduler::new(),
            config: ControlConfig::default(),
            sequencer: StartupSequencer::new(),
        }
    }

    fn advance(&mut self) -> StartupPhase {
        let mut ctx = StartupContext::new(&mut self.engine, &mut self.scheduler, &self.config);
        self.sequencer.advance(&mut ctx)
    }

    /// Advance until the phase stops changing (at most `limit` calls).
    fn run(&mut self, limit: usize) -> Vec<StartupPhase> {
        let mut seen = vec![self.sequencer.phase()];
        for _ in 0..limit {
            let phase = self.advance();
            if seen.last() == Some(&phase) {
                break;
            }
            seen.push(phase);
        }
        seen
    }
}

#[test]
fn cold_boot_walks_every_phase_to_ready() {
    let mut rig = Rig::new(engine());
    assert_eq!(
        rig.run(10),
        vec![
            StartupPhase::Idle,
            StartupPhase::EncryptedStorageReady,
            StartupPhase::Licensed,
            StartupPhase::DeviceStoreReady,
            StartupPhase::DeviceInitialized,
            StartupPhase::Ready,
        ]
    );
    assert!(rig.engine.started);
}

#[test]
fn each_advance_does_exactly_one_phase() {
    let mut rig = Rig::new(engine());
    assert_eq!(rig.advance(), StartupPhase::EncryptedStorageReady);
    assert_eq!(rig.engine.calls, vec![EngineCall::InitEncryptedStorage]);
    assert_eq!(rig.advance(), StartupPhase::Licensed);
    assert_eq!(rig.engine.calls.len(), 2);
}

#[test]
fn ready_forces_prune_inside_storage_bracket_and_configures_flush() {
    let mut rig = Rig::new(engine());
    rig.config.flush_intervals.messages_ms = 1234;
    rig.run(10);

    let tail: Vec<_> = rig.engine.calls.iter().skip_while(|c| !matches!(c, EngineCall::Start(_))).collect();
    assert_eq!(
        tail[1..],
        [
            &EngineCall::OpenStorage,
            &EngineCall::Prune { force: true },
            &EngineCall::CloseStorage,
        ]
    );
    assert_eq!(rig.scheduler.interval(StorageZone::Messages), 1234);
}

#[test]
fn engine_settings_follow_preferences() {
    let mut e = engine();
    e.set_enabled(Preference::WifiEnabled, true);
    e.set_enabled(Preference::LoraEnabled, false);
    e.set_enabled(Preference::TruststoreLocked, true);
    let mut rig = Rig::new(e);
    rig.run(10);

    let settings = rig
        .engine
        .calls
        .iter()
        .find_map(|c| match c {
            EngineCall::Start(s) => Some(*s),
            _ => None,
        })
        .unwrap();
    assert!(settings.wifi);
    assert!(!settings.lora);
    assert!(settings.truststore_locked);
    assert!(!settings.location_sharing);
}

#[test]
fn not_ready_repeats_the_same_phase() {
    let mut e = engine();
    e.fail.init_encrypted_storage = Some(EngineError::NotReady);
    let mut rig = Rig::new(e);

    assert_eq!(rig.advance(), StartupPhase::Idle);
    assert_eq!(rig.advance(), StartupPhase::Idle);
    assert_eq!(rig.sequencer.steps_in_phase(), 2);

    rig.engine.fail.init_encrypted_storage = None;
    assert_eq!(rig.advance(), StartupPhase::EncryptedStorageReady);
    assert_eq!(rig.sequencer.steps_in_phase(), 0);
}

#[test]
fn not_ready_in_later_phase_is_idempotent() {
    let mut e = engine();
    e.fail.finish_device_init = Some(EngineError::NotReady);
    let mut rig = Rig::new(e);
    rig.run(10);
    assert_eq!(rig.sequencer.phase(), StartupPhase::DeviceStoreReady);
    assert_eq!(rig.advance(), StartupPhase::DeviceStoreReady);
}

#[test]
fn encrypted_storage_failure_is_fatal() {
    let mut e = engine();
    e.fail.init_encrypted_storage = Some(EngineError::Io);
    let mut rig = Rig::new(e);
    assert_eq!(rig.advance(), StartupPhase::Error);
    // Terminal: never retried.
    assert_eq!(rig.advance(), StartupPhase::Error);
    assert_eq!(rig.engine.calls.len(), 1);
}

#[test]
fn invalid_license_is_unlicensed() {
    let mut e = engine();
    e.license_valid = false;
    let mut rig = Rig::new(e);
    assert_eq!(*rig.run(10).last().unwrap(), StartupPhase::Unlicensed);
}

#[test]
fn license_check_failure_is_unlicensed() {
    let mut e = engine();
    e.fail.validate_license = Some(EngineError::Io);
    let mut rig = Rig::new(e);
    assert_eq!(*rig.run(10).last().unwrap(), StartupPhase::Unlicensed);
}

#[test]
fn password_protected_store_needs_password() {
    let mut e = engine();
    e.password_protected = true;
    let mut rig = Rig::new(e);
    assert_eq!(*rig.run(10).last().unwrap(), StartupPhase::NeedPassword);
    assert!(!rig.engine.started);
}

#[test]
fn device_store_failure_is_fatal() {
    let mut e = engine();
    e.fail.open_device_store = Some(EngineError::Rejected);
    let mut rig = Rig::new(e);
    assert_eq!(*rig.run(10).last().unwrap(), StartupPhase::Error);
}

#[test]
fn missing_identity_requests_initialization() {
    let mut e = engine();
    e.identity_exists = false;
    let mut rig = Rig::new(e);
    assert_eq!(*rig.run(10).last().unwrap(), StartupPhase::InitializeDevice);
    assert!(rig.sequencer.phase().is_terminal());
}

#[test]
fn engine_start_failure_is_fatal() {
    let mut e = engine();
    e.fail.start = Some(EngineError::Unavailable);
    let mut rig = Rig::new(e);
    assert_eq!(*rig.run(10).last().unwrap(), StartupPhase::Error);
}

#[test]
fn initial_prune_failure_does_not_block_ready() {
    let mut e = engine();
    e.fail.open_storage = Some(StorageError::Unavailable);
    let mut rig = Rig::new(e);
    assert_eq!(*rig.run(10).last().unwrap(), StartupPhase::Ready);
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::Prune { .. })), 0);
}
