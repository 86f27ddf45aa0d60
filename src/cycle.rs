//! One pass of the ready-state control loop.
//!
//! ```text
//!  intents ─▶ progress reset ─▶ outbound step ─▶ drain inbound ─▶ mesh sync
//!                                                     │              │
//!                                  CFG ─▶ remote  ◀───┤              ▼
//!                                  BK:  ─▶ backpacks ◀┤         prune (full)
//!                                  else ─▶ UI       ◀─┘              │
//!                                                                    ▼
//!                                                               maybe_flush
//! ```
//!
//! Pending intents are honoured before any message or storage work. A user
//! interrupt ends the cycle right after the message being handled.

use log::{debug, error, info, warn};

use crate::app::events::RestartReason;
use crate::app::ports::{MeshEngine, UiPort};
use crate::backpacks::{self, BackpackDispatcher};
use crate::config::ControlConfig;
use crate::intents::PendingIntents;
use crate::outbound::MessageLifecycle;
use crate::remote::{self, RemoteCommandProcessor};
use crate::scheduler::FlushScheduler;
use crate::types::{InboundMessage, MessageKind};

/// Responsive cycles poll briefly to keep the UI snappy; full cycles poll
/// longer and also run storage maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Responsive,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// The user interrupted message draining.
    Interrupted,
    /// Storage was unavailable for a pending intent; nothing else ran.
    Deferred,
    Restart(RestartReason),
}

pub struct ControlCycle {
    lifecycle: MessageLifecycle,
    processor: RemoteCommandProcessor,
    intents: PendingIntents,
    listening: bool,
    responsive_poll_count: u8,
    full_poll_count: u8,
    max_reads_per_cycle: u8,
}

impl ControlCycle {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            lifecycle: MessageLifecycle::new(),
            processor: RemoteCommandProcessor::new(config),
            intents: PendingIntents::default(),
            listening: false,
            responsive_poll_count: config.responsive_poll_count,
            full_poll_count: config.full_poll_count,
            max_reads_per_cycle: config.max_reads_per_cycle,
        }
    }

    pub fn lifecycle(&self) -> &MessageLifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut MessageLifecycle {
        &mut self.lifecycle
    }

    pub fn intents(&self) -> &PendingIntents {
        &self.intents
    }

    pub fn intents_mut(&mut self) -> &mut PendingIntents {
        &mut self.intents
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn set_listening(&mut self, listening: bool) {
        self.listening = listening;
    }

    /// Run one control cycle.
    pub fn run_once(
        &mut self,
        kind: CycleKind,
        now_ms: u64,
        engine: &mut impl MeshEngine,
        ui: &mut impl UiPort,
        backpacks: &mut BackpackDispatcher,
        scheduler: &mut FlushScheduler,
    ) -> CycleOutcome {
        // 1-2. Intents
        if let Some(outcome) = self.run_intents(engine, scheduler) {
            return outcome;
        }

        // 3. Progress reset
        ui.show_progress(0.0);

        // 4. Outbound
        self.lifecycle.advance(now_ms, engine);

        // 5. Inbound
        let mut drained = 0u8;
        if self.listening {
            ui.show_status("Listening");
            let poll_count = match kind {
                CycleKind::Responsive => self.responsive_poll_count,
                CycleKind::Full => self.full_poll_count,
            };
            while drained < self.max_reads_per_cycle && engine.has_message(poll_count) {
                drained += 1;
                ui.show_status("Receiving");
                if let Some(message) = engine.retrieve_message() {
                    self.handle_inbound(&message, now_ms, engine, ui, backpacks);
                }
                ui.yield_now();
                if ui.user_interrupted() {
                    debug!("Cycle: interrupted after {drained} message(s)");
                    return CycleOutcome::Interrupted;
                }
            }
        }

        // 6. Idle work
        if drained == 0 {
            if self.intents.has_zone_clears() {
                self.clear_queued_zones(engine);
            } else {
                ui.show_status("Mesh");
                if engine.sync_mesh() {
                    info!("Cycle: mesh activity occurred");
                }
            }
        }
        ui.show_status("Ready");

        // 7. Prune
        if kind == CycleKind::Full && engine.is_prune_due() {
            match engine.open_storage() {
                Ok(()) => {
                    if let Err(e) = engine.prune(false) {
                        warn!("Cycle: prune failed ({e})");
                    }
                    engine.close_storage();
                }
                Err(e) => warn!("Cycle: storage unavailable for pruning ({e})"),
            }
        }

        // 8. Flush
        scheduler.maybe_flush(now_ms, engine);

        CycleOutcome::Completed
    }

    /// Execute resets, password changes and restarts. `None` lets the
    /// cycle continue.
    fn run_intents(
        &mut self,
        engine: &mut impl MeshEngine,
        scheduler: &mut FlushScheduler,
    ) -> Option<CycleOutcome> {
        if self.intents.factory_reset {
            warn!("Cycle: factory resetting");
            self.listening = false;
            if let Err(e) = engine.open_storage() {
                warn!("Cycle: storage unavailable for factory reset ({e})");
                return Some(CycleOutcome::Deferred);
            }
            if let Err(e) = engine.wipe() {
                error!("Cycle: wipe failed ({e})");
            }
            engine.close_storage();
            self.intents.factory_reset = false;
            return Some(CycleOutcome::Restart(RestartReason::FactoryReset));
        }

        if self.intents.mesh_reset {
            warn!("Cycle: resetting mesh");
            self.listening = false;
            if let Err(e) = engine.open_storage() {
                warn!("Cycle: storage unavailable for mesh reset ({e})");
                return Some(CycleOutcome::Deferred);
            }
            if let Err(e) = engine.reset_mesh() {
                error!("Cycle: mesh reset failed ({e})");
            }
            scheduler.flush_all_dirty(engine);
            engine.close_storage();
            self.intents.mesh_reset = false;
            return Some(CycleOutcome::Restart(RestartReason::MeshReset));
        }

        if let Some(password) = &self.intents.password_change {
            if let Err(e) = engine.open_storage() {
                warn!("Cycle: storage unavailable for password change ({e})");
                return Some(CycleOutcome::Deferred);
            }
            match engine.change_password(password) {
                Ok(()) => info!("Cycle: password changed"),
                Err(e) => error!("Cycle: password change failed ({e})"),
            }
            engine.close_storage();
            self.intents.password_change = None;
            // Restart either way so storage is flushed and reopened cleanly.
            self.intents.restart = Some(RestartReason::PasswordChanged);
        }

        if let Some(reason) = self.intents.restart {
            if let Err(e) = engine.open_storage() {
                warn!("Cycle: storage unavailable before restart ({e})");
                return Some(CycleOutcome::Deferred);
            }
            scheduler.flush_all_dirty(engine);
            engine.close_storage();
            self.intents.restart = None;
            info!("Cycle: restarting ({reason:?})");
            return Some(CycleOutcome::Restart(reason));
        }

        None
    }

    fn handle_inbound(
        &mut self,
        message: &InboundMessage,
        now_ms: u64,
        engine: &mut impl MeshEngine,
        ui: &mut impl UiPort,
        backpacks: &mut BackpackDispatcher,
    ) {
        if !message.is_ack && message.recipient == engine.device_id() {
            if let Err(e) = engine.send_ack(message) {
                debug!("Cycle: direct ack to {} failed ({e})", message.sender);
                if engine.mesh_enabled() {
                    if let Err(e) = engine.send_ack_via_mesh(message) {
                        warn!("Cycle: mesh ack to {} failed ({e})", message.sender);
                    }
                }
            }
        }

        let payload = message.payload.as_slice();
        if message.flags.kind == MessageKind::Control && remote::is_remote_command(payload) {
            info!("Cycle: remote command from {}", message.sender);
            self.processor.execute(
                payload,
                &message.sender,
                now_ms,
                engine,
                &mut self.lifecycle,
                &mut self.intents,
            );
        } else if backpacks::is_backpack_request(payload) {
            backpacks.dispatch_message(payload, &message.sender, &message.recipient);
        } else {
            ui.message_received(message);
        }
    }

    fn clear_queued_zones(&mut self, engine: &mut impl MeshEngine) {
        if let Err(e) = engine.open_storage() {
            warn!("Cycle: storage unavailable for zone clear ({e})");
            return;
        }
        for zone in self.intents.take_zone_clears() {
            match engine.clear_zone(zone) {
                Ok(()) => info!("Cycle: cleared {zone}"),
                Err(e) => warn!("Cycle: clearing {zone} failed ({e})"),
            }
        }
        engine.close_storage();
    }
}
