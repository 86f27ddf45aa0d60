//! Control cycle tests: outbound fallback, inbound routing, intents and
//! storage maintenance.

use fieldnode::adapters::memory_engine::{EngineCall, MemoryEngine};
use fieldnode::app::events::RestartReason;
use fieldnode::backpacks::{BackpackDispatcher, BackpackKind};
use fieldnode::config::ControlConfig;
use fieldnode::cycle::{ControlCycle, CycleKind, CycleOutcome};
use fieldnode::error::{EngineError, StorageError};
use fieldnode::outbound::{Recipient, SendState};
use fieldnode::scheduler::FlushScheduler;
use fieldnode::types::{MessageKind, StorageZone};

use super::mock_ports::{BackpackHit, MockBackpack, RecordingUi, broadcast_id, engine, peer};

struct Rig {
    cycle: ControlCycle,
    engine: MemoryEngine,
    ui: RecordingUi,
    backpacks: BackpackDispatcher,
    scheduler: FlushScheduler,
}

impl Rig {
    fn new() -> Self {
        let mut cycle = ControlCycle::new(&ControlConfig::default());
        cycle.set_listening(true);
        Self {
            cycle,
            engine: engine(),
            ui: RecordingUi::new(),
            backpacks: BackpackDispatcher::new(),
            scheduler: FlushScheduler::new(),
        }
    }

    fn run(&mut self, kind: CycleKind, now_ms: u64) -> CycleOutcome {
        self.cycle.run_once(
            kind,
            now_ms,
            &mut self.engine,
            &mut self.ui,
            &mut self.backpacks,
            &mut self.scheduler,
        )
    }

    fn state(&self) -> SendState {
        self.cycle.lifecycle().state()
    }

    fn syncs(&self) -> usize {
        self.engine.count_calls(|c| *c == EngineCall::SyncMesh)
    }
}

// ── Outbound lifecycle ────────────────────────────────────────

#[test]
fn broadcast_is_sent_in_one_cycle() {
    let mut rig = Rig::new();
    rig.cycle.lifecycle_mut().enqueue_broadcast(b"hi", 0, 0);
    assert_eq!(rig.run(CycleKind::Responsive, 0), CycleOutcome::Completed);
    assert_eq!(rig.state(), SendState::SentDirect);
    assert_eq!(rig.engine.calls[0], EngineCall::Broadcast(b"hi".to_vec()));
}

#[test]
fn failed_broadcast_is_terminal() {
    let mut rig = Rig::new();
    rig.engine.fail.broadcast = Some(EngineError::Io);
    rig.cycle.lifecycle_mut().enqueue_broadcast(b"hi", 0, 0);
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.state(), SendState::Failed);

    rig.run(CycleKind::Responsive, 10);
    assert_eq!(rig.state(), SendState::Failed);
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::Broadcast(_))), 1);
}

#[test]
fn message_waits_for_its_scheduled_time() {
    let mut rig = Rig::new();
    rig.cycle.lifecycle_mut().enqueue_broadcast(b"later", 500, 1_000);
    rig.run(CycleKind::Responsive, 1_499);
    assert_eq!(rig.state(), SendState::New);
    rig.run(CycleKind::Responsive, 1_500);
    assert_eq!(rig.state(), SendState::SentDirect);
}

#[test]
fn direct_send_success() {
    let mut rig = Rig::new();
    rig.cycle.lifecycle_mut().enqueue(
        b"dm",
        Recipient::Device(peer(1)),
        MessageKind::Plain,
        0,
        0,
    );
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.state(), SendState::SentDirect);
    assert_eq!(
        rig.engine.calls[0],
        EngineCall::SendDirect {
            payload: b"dm".to_vec(),
            to: peer(1)
        }
    );
}

#[test]
fn direct_failure_falls_back_to_mesh_next_cycle() {
    let mut rig = Rig::new();
    rig.engine.fail.send_direct = Some(EngineError::NoRoute);
    rig.cycle.lifecycle_mut().enqueue(
        b"dm",
        Recipient::Device(peer(2)),
        MessageKind::Plain,
        0,
        0,
    );

    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.state(), SendState::SendingDirect);
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::SendViaMesh { .. })), 0);

    rig.run(CycleKind::Responsive, 100);
    assert_eq!(rig.state(), SendState::MeshQueued);
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::SendDirect { .. })), 1);
}

#[test]
fn mesh_failure_is_terminal() {
    let mut rig = Rig::new();
    rig.engine.fail.send_direct = Some(EngineError::NoRoute);
    rig.engine.fail.send_via_mesh = Some(EngineError::Unavailable);
    rig.cycle.lifecycle_mut().enqueue(
        b"dm",
        Recipient::Device(peer(2)),
        MessageKind::Control,
        0,
        0,
    );
    rig.run(CycleKind::Responsive, 0);
    rig.run(CycleKind::Responsive, 1);
    assert_eq!(rig.state(), SendState::Failed);
}

#[test]
fn device_recipient_equal_to_broadcast_id_is_broadcast() {
    let mut rig = Rig::new();
    rig.cycle.lifecycle_mut().enqueue(
        b"all",
        Recipient::Device(broadcast_id()),
        MessageKind::Plain,
        0,
        0,
    );
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.engine.calls[0], EngineCall::Broadcast(b"all".to_vec()));
}

// ── Inbound routing ───────────────────────────────────────────

#[test]
fn plain_message_reaches_ui_and_is_acked() {
    let mut rig = Rig::new();
    rig.engine.push_message(peer(1), MessageKind::Plain, b"hello");
    rig.run(CycleKind::Responsive, 0);

    assert_eq!(rig.ui.received.len(), 1);
    assert_eq!(rig.ui.received[0].payload.as_slice(), b"hello");
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::SendAck(_))), 1);
    assert!(rig.ui.showed("Receiving"));
}

#[test]
fn failed_ack_falls_back_to_mesh_when_enabled() {
    let mut rig = Rig::new();
    rig.engine.fail.send_ack = Some(EngineError::NoRoute);
    rig.engine.push_message(peer(1), MessageKind::Plain, b"hello");
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::SendAckViaMesh(_))), 1);
}

#[test]
fn failed_ack_is_dropped_when_mesh_disabled() {
    let mut rig = Rig::new();
    rig.engine.prefs.insert(fieldnode::prefs::Preference::MeshEnabled, false);
    rig.engine.fail.send_ack = Some(EngineError::NoRoute);
    rig.engine.push_message(peer(1), MessageKind::Plain, b"hello");
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::SendAckViaMesh(_))), 0);
}

#[test]
fn messages_for_others_and_acks_are_not_acked() {
    let mut rig = Rig::new();
    rig.engine.push_message_to(peer(1), peer(2), MessageKind::Plain, b"relay me");
    rig.engine.push_message(peer(1), MessageKind::Plain, b"ack");
    if let Some(last) = rig.engine.inbox.back_mut() {
        last.is_ack = true;
    }
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::SendAck(_))), 0);
    assert_eq!(rig.ui.received.len(), 2);
}

#[test]
fn read_budget_caps_messages_per_cycle() {
    let mut rig = Rig::new();
    for _ in 0..8 {
        rig.engine.push_message(peer(1), MessageKind::Plain, b"x");
    }
    rig.run(CycleKind::Full, 0);
    assert_eq!(rig.ui.received.len(), 5);
    assert_eq!(rig.engine.inbox.len(), 3);
    // Messages were drained, so no mesh sync this cycle.
    assert_eq!(rig.syncs(), 0);
}

#[test]
fn interrupt_stops_the_cycle_after_current_message() {
    let mut rig = Rig::new();
    rig.ui.interrupt_after = Some(1);
    rig.engine.prune_due = true;
    for _ in 0..3 {
        rig.engine.push_message(peer(1), MessageKind::Plain, b"x");
    }
    assert_eq!(rig.run(CycleKind::Full, 0), CycleOutcome::Interrupted);
    assert_eq!(rig.ui.received.len(), 1);
    assert!(!rig.ui.showed("Ready"));
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::Prune { .. })), 0);
}

#[test]
fn control_cfg_message_runs_remote_command() {
    let mut rig = Rig::new();
    rig.engine.push_message(peer(3), MessageKind::Control, b"CFG:B");
    rig.run(CycleKind::Responsive, 1_000);

    assert!(rig.ui.received.is_empty());
    let msg = rig.cycle.lifecycle().message();
    assert_eq!(msg.state(), SendState::New);
    assert_eq!(*msg.recipient(), Recipient::Device(peer(3)));
    assert_eq!(msg.payload(), b"Battery: 100");
    assert_eq!(msg.scheduled_at(), Some(1_500));
}

#[test]
fn plain_cfg_message_is_just_a_message() {
    let mut rig = Rig::new();
    rig.engine.push_message(peer(3), MessageKind::Plain, b"CFG:B");
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.ui.received.len(), 1);
    assert_eq!(rig.state(), SendState::Unknown);
}

#[test]
fn backpack_request_is_dispatched() {
    let mut rig = Rig::new();
    let (relay, hits) = MockBackpack::new(BackpackKind::Relay, true);
    assert!(rig.backpacks.register(Box::new(relay)).is_ok());
    rig.engine.push_message(peer(4), MessageKind::Plain, b"BK:R");
    rig.run(CycleKind::Responsive, 0);

    assert!(rig.ui.received.is_empty());
    assert_eq!(
        *hits.borrow(),
        vec![BackpackHit::Message {
            payload: b"BK:R".to_vec(),
            sender: peer(4)
        }]
    );
}

#[test]
fn responsive_and_full_cycles_use_their_poll_bounds() {
    let mut rig = Rig::new();
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.engine.last_poll_count, Some(2));

    rig.run(CycleKind::Full, 1);
    assert_eq!(rig.engine.last_poll_count, Some(10));
}

#[test]
fn poll_bounds_follow_config() {
    let config = ControlConfig {
        responsive_poll_count: 3,
        full_poll_count: 7,
        ..ControlConfig::default()
    };
    let mut rig = Rig::new();
    rig.cycle = ControlCycle::new(&config);
    rig.cycle.set_listening(true);

    rig.run(CycleKind::Full, 0);
    assert_eq!(rig.engine.last_poll_count, Some(7));
    rig.run(CycleKind::Responsive, 1);
    assert_eq!(rig.engine.last_poll_count, Some(3));
}

#[test]
fn not_listening_skips_inbound() {
    let mut rig = Rig::new();
    rig.cycle.set_listening(false);
    rig.engine.push_message(peer(1), MessageKind::Plain, b"x");
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.engine.inbox.len(), 1);
    assert!(!rig.ui.showed("Listening"));
    assert_eq!(rig.syncs(), 1);
    assert_eq!(rig.engine.last_poll_count, None);
}

// ── Idle work and maintenance ─────────────────────────────────

#[test]
fn idle_cycle_syncs_mesh_and_shows_ready() {
    let mut rig = Rig::new();
    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.syncs(), 1);
    assert_eq!(rig.ui.progress, vec![0.0]);
    assert_eq!(
        rig.ui.statuses,
        vec!["Listening".to_owned(), "Mesh".to_owned(), "Ready".to_owned()]
    );
}

#[test]
fn queued_zone_clear_replaces_mesh_sync() {
    let mut rig = Rig::new();
    rig.cycle.intents_mut().queue_zone_clear(StorageZone::MeshPackets);
    rig.run(CycleKind::Responsive, 0);

    assert_eq!(rig.syncs(), 0);
    assert_eq!(
        rig.engine.calls,
        vec![
            EngineCall::OpenStorage,
            EngineCall::Clear(StorageZone::MeshPackets),
            EngineCall::CloseStorage,
        ]
    );
    assert!(!rig.cycle.intents().has_zone_clears());

    rig.run(CycleKind::Responsive, 1);
    assert_eq!(rig.syncs(), 1);
}

#[test]
fn full_cycle_prunes_when_due() {
    let mut rig = Rig::new();
    rig.engine.prune_due = true;

    rig.run(CycleKind::Responsive, 0);
    assert_eq!(rig.engine.count_calls(|c| matches!(c, EngineCall::Prune { .. })), 0);

    rig.run(CycleKind::Full, 1);
    assert_eq!(rig.engine.count_calls(|c| *c == EngineCall::Prune { force: false }), 1);
    assert!(!rig.engine.storage_open);
}

#[test]
fn prune_skipped_when_storage_unavailable() {
    let mut rig = Rig::new();
    rig.engine.prune_due = true;
    rig.engine.fail.open_storage = Some(StorageError::Unavailable);
    assert_eq!(rig.run(CycleKind::Full, 0), CycleOutcome::Completed);
    assert!(rig.engine.prune_due);
}

#[test]
fn dirty_zone_is_flushed_by_later_cycle() {
    let mut rig = Rig::new();
    rig.engine.mark_dirty(StorageZone::Messages);

    rig.run(CycleKind::Responsive, 100);
    assert_eq!(rig.scheduler.deadline(StorageZone::Messages), Some(20_100));

    rig.run(CycleKind::Responsive, 20_500);
    assert_eq!(rig.engine.count_calls(|c| *c == EngineCall::Flush(StorageZone::Messages)), 1);
    assert_eq!(rig.scheduler.deadline(StorageZone::Messages), None);
}

// ── Intents ───────────────────────────────────────────────────

#[test]
fn factory_reset_wipes_and_restarts() {
    let mut rig = Rig::new();
    rig.cycle.intents_mut().factory_reset = true;
    rig.engine.push_message(peer(1), MessageKind::Plain, b"x");

    assert_eq!(
        rig.run(CycleKind::Responsive, 0),
        CycleOutcome::Restart(RestartReason::FactoryReset)
    );
    assert_eq!(
        rig.engine.calls,
        vec![EngineCall::OpenStorage, EngineCall::Wipe, EngineCall::CloseStorage]
    );
    assert!(!rig.cycle.is_listening());
    assert!(!rig.cycle.intents().factory_reset);
}

#[test]
fn intent_is_deferred_while_storage_busy() {
    let mut rig = Rig::new();
    rig.cycle.intents_mut().factory_reset = true;
    rig.engine.fail.open_storage = Some(StorageError::Unavailable);

    assert_eq!(rig.run(CycleKind::Responsive, 0), CycleOutcome::Deferred);
    assert!(rig.cycle.intents().factory_reset);
    assert_eq!(rig.syncs(), 0);

    rig.engine.fail.open_storage = None;
    assert_eq!(
        rig.run(CycleKind::Responsive, 1),
        CycleOutcome::Restart(RestartReason::FactoryReset)
    );
}

#[test]
fn mesh_reset_flushes_and_restarts() {
    let mut rig = Rig::new();
    rig.cycle.intents_mut().mesh_reset = true;

    assert_eq!(
        rig.run(CycleKind::Responsive, 0),
        CycleOutcome::Restart(RestartReason::MeshReset)
    );
    assert_eq!(
        rig.engine.calls,
        vec![
            EngineCall::OpenStorage,
            EngineCall::ResetMesh,
            EngineCall::Flush(StorageZone::MeshPackets),
            EngineCall::Flush(StorageZone::MeshGraph),
            EngineCall::CloseStorage,
        ]
    );
}

#[test]
fn password_change_restarts_after_flush() {
    let mut rig = Rig::new();
    rig.engine.mark_dirty(StorageZone::Locations);
    assert!(rig.cycle.intents_mut().queue_password_change("s3cret"));

    assert_eq!(
        rig.run(CycleKind::Responsive, 0),
        CycleOutcome::Restart(RestartReason::PasswordChanged)
    );
    assert_eq!(rig.engine.password, "s3cret");
    assert_eq!(rig.engine.count_calls(|c| *c == EngineCall::Flush(StorageZone::Locations)), 1);
    assert!(!rig.engine.storage_open);
    assert!(rig.cycle.intents().password_change.is_none());
}

#[test]
fn failed_password_change_still_restarts() {
    let mut rig = Rig::new();
    rig.engine.password = "old".to_owned();
    rig.engine.fail.change_password = Some(StorageError::Io);
    assert!(rig.cycle.intents_mut().queue_password_change("s3cret"));

    assert_eq!(
        rig.run(CycleKind::Responsive, 0),
        CycleOutcome::Restart(RestartReason::PasswordChanged)
    );
    assert_eq!(rig.engine.password, "old");
    assert!(!rig.engine.storage_open);
    assert!(rig.cycle.intents().password_change.is_none());
}

#[test]
fn requested_restart_flushes_dirty_zones() {
    let mut rig = Rig::new();
    rig.engine.mark_dirty(StorageZone::Messages);
    rig.engine.mark_dirty(StorageZone::Truststore);
    rig.cycle.intents_mut().restart = Some(RestartReason::Requested);

    assert_eq!(
        rig.run(CycleKind::Responsive, 0),
        CycleOutcome::Restart(RestartReason::Requested)
    );
    assert!(rig.engine.dirty.iter().all(|d| !d));
}
