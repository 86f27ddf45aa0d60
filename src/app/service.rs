//! Control service: the hexagonal core.
//!
//! [`ControlService`] owns the engine, the UI ports and every control
//! component. The firmware loop calls [`ControlService::tick`] and acts on
//! the returned [`ControlEffect`]; everything else is pure logic behind
//! port traits, testable with mock adapters.
//!
//! ```text
//!                 ┌─────────────────────────────────────┐
//!  MeshEngine ◀──▶│           ControlService            │──▶ UiPort
//!                 │ StartupSequencer · ControlCycle     │──▶ ControlSurface
//!                 │ FlushScheduler · BackpackDispatcher │
//!                 └─────────────────────────────────────┘
//! ```

use core::fmt::Write;

use log::{error, info, warn};

use crate::backpacks::{Backpack, BackpackDispatcher, UserEvent};
use crate::config::ControlConfig;
use crate::cycle::{ControlCycle, CycleKind, CycleOutcome};
use crate::fsm::context::StartupContext;
use crate::fsm::{StartupPhase, StartupSequencer};
use crate::scheduler::FlushScheduler;
use crate::types::MessageKind;

use super::commands::ControlCommand;
use super::events::{ControlEffect, EngineNotice, HaltReason, RestartReason};
use super::ports::{
    ControlSurface, DeviceInitForm, MeshEngine, PreferencePort, QueryPort, UiPort,
};

/// Title shown once the base is ready when no aliases are known.
const FALLBACK_TITLE: &str = "Base Station";

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService<E, U, S> {
    engine: E,
    ui: U,
    surface: S,
    config: ControlConfig,
    sequencer: StartupSequencer<E>,
    cycle: ControlCycle,
    scheduler: FlushScheduler,
    backpacks: BackpackDispatcher,
    /// Message processing is skipped until this time (ms).
    paused_until: u64,
    halted: Option<HaltReason>,
    ready_entered: bool,
    genesis_submitted: bool,
}

impl<E: MeshEngine, U: UiPort, S: ControlSurface> ControlService<E, U, S> {
    /// Construct the service. Startup begins on the first [`tick`](Self::tick).
    pub fn new(config: ControlConfig, engine: E, ui: U, surface: S) -> crate::error::Result<Self> {
        config.validate()?;
        let cycle = ControlCycle::new(&config);
        let mut scheduler = FlushScheduler::new();
        scheduler.configure(&config.flush_intervals);
        Ok(Self {
            engine,
            ui,
            surface,
            sequencer: StartupSequencer::new(),
            cycle,
            scheduler,
            backpacks: BackpackDispatcher::new(),
            paused_until: 0,
            halted: None,
            ready_entered: false,
            genesis_submitted: false,
            config,
        })
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn phase(&self) -> StartupPhase {
        self.sequencer.phase()
    }

    pub fn halted(&self) -> Option<HaltReason> {
        self.halted
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn cycle(&self) -> &ControlCycle {
        &self.cycle
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Which cycle kind the firmware loop should run for tick number `n`.
    pub fn cycle_kind_for(&self, n: u64) -> CycleKind {
        if n % u64::from(self.config.full_cycle_every) == 0 {
            CycleKind::Full
        } else {
            CycleKind::Responsive
        }
    }

    /// Give the engine back, e.g. to boot it again after a restart effect.
    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn register_backpack(&mut self, backpack: Box<dyn Backpack>) -> Result<(), Box<dyn Backpack>> {
        self.backpacks.register(backpack)
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Advance startup until ready, then run one control cycle per call.
    pub fn tick(&mut self, now_ms: u64, kind: CycleKind) -> ControlEffect {
        if let Some(reason) = self.halted {
            return ControlEffect::Halt(reason);
        }

        if self.sequencer.phase() != StartupPhase::Ready {
            let mut ctx = StartupContext::new(&mut self.engine, &mut self.scheduler, &self.config);
            let phase = self.sequencer.advance(&mut ctx);
            return self.on_phase(phase, now_ms);
        }

        if self.is_messaging_paused(now_ms) {
            return ControlEffect::Continue;
        }

        match self.cycle.run_once(
            kind,
            now_ms,
            &mut self.engine,
            &mut self.ui,
            &mut self.backpacks,
            &mut self.scheduler,
        ) {
            CycleOutcome::Restart(reason) => ControlEffect::Restart(reason),
            CycleOutcome::Completed | CycleOutcome::Interrupted | CycleOutcome::Deferred => {
                ControlEffect::Continue
            }
        }
    }

    fn on_phase(&mut self, phase: StartupPhase, now_ms: u64) -> ControlEffect {
        match phase {
            StartupPhase::Ready => {
                self.enter_ready(now_ms);
                ControlEffect::Continue
            }
            StartupPhase::Error => self.halt(HaltReason::StartupFailed),
            StartupPhase::Unlicensed => {
                self.surface.show_busy("Unlicensed", "No valid license", "Halted", false);
                self.halt(HaltReason::Unlicensed)
            }
            StartupPhase::NeedPassword => {
                self.surface.prompt_password();
                self.halt(HaltReason::PasswordRejected)
            }
            StartupPhase::InitializeDevice => self.initialize_device(now_ms),
            StartupPhase::Idle
            | StartupPhase::EncryptedStorageReady
            | StartupPhase::Licensed
            | StartupPhase::DeviceStoreReady
            | StartupPhase::DeviceInitialized => ControlEffect::Continue,
        }
    }

    fn halt(&mut self, reason: HaltReason) -> ControlEffect {
        error!("Halting in {}: {reason:?}", self.sequencer.phase_name());
        self.halted = Some(reason);
        ControlEffect::Halt(reason)
    }

    fn enter_ready(&mut self, now_ms: u64) {
        if self.ready_entered {
            return;
        }
        self.ready_entered = true;
        self.cycle.set_listening(true);
        self.pause_messaging_for(now_ms, self.config.ready_settle_ms);
        let running = self.backpacks.init_all(&self.engine);
        self.surface.show_title(&ready_title(&self.engine));
        info!(
            "Ready as {} ({} of {} backpack(s) running)",
            self.engine.device_id(),
            running,
            self.backpacks.len()
        );
    }

    /// Submit a generated identity once; the new identity needs a restart.
    fn initialize_device(&mut self, now_ms: u64) -> ControlEffect {
        if !self.genesis_submitted {
            self.genesis_submitted = true;
            self.surface
                .show_busy("New Base Setup...", "Creating identity", "Please wait", false);
            let form = default_init_form(now_ms);
            match self.engine.genesis(&form) {
                Ok(()) => info!("Genesis complete for {}", form.device_alias),
                Err(e) => error!("Genesis failed ({e}), restarting anyway"),
            }
            self.surface.update_busy_status("Restarting...");
        }
        ControlEffect::Restart(RestartReason::DeviceInitialized)
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command(&mut self, cmd: ControlCommand, now_ms: u64) {
        match cmd {
            ControlCommand::FactoryReset => {
                warn!("Factory reset queued");
                self.cycle.intents_mut().factory_reset = true;
            }
            ControlCommand::ResetMesh => {
                warn!("Mesh reset queued");
                self.cycle.intents_mut().mesh_reset = true;
            }
            ControlCommand::Restart => {
                self.cycle.intents_mut().restart = Some(RestartReason::Requested);
            }
            ControlCommand::ChangePassword(password) => {
                self.cycle.intents_mut().password_change = Some(password);
            }
            ControlCommand::ClearZone(zone) => self.cycle.intents_mut().queue_zone_clear(zone),
            ControlCommand::SetListening(listening) => self.cycle.set_listening(listening),
            ControlCommand::SetPreference(pref, enabled) => {
                self.engine.set_enabled(pref, enabled);
                if pref.requires_restart() {
                    info!("{pref:?} changed, restart queued");
                    self.cycle.intents_mut().restart = Some(RestartReason::Requested);
                }
            }
            ControlCommand::PauseMessaging(ms) => self.pause_messaging_for(now_ms, ms),
            ControlCommand::SendMessage { payload, recipient } => {
                self.cycle
                    .lifecycle_mut()
                    .enqueue(&payload, recipient, MessageKind::Plain, 0, now_ms);
            }
        }
    }

    /// React to a button or similar. Any interaction pauses messaging.
    ///
    /// Returns `true` if the event was consumed.
    pub fn handle_user_event(&mut self, event: UserEvent, now_ms: u64) -> bool {
        self.pause_messaging_for(now_ms, self.config.user_pause_ms);
        match event {
            UserEvent::FactoryResetHeld => {
                warn!("Factory reset requested from front panel");
                self.cycle.intents_mut().factory_reset = true;
                true
            }
            UserEvent::ActionButton => self.backpacks.dispatch_event(event),
        }
    }

    /// Forward an engine notification to the UI.
    pub fn notify(&mut self, notice: &EngineNotice) {
        match notice {
            EngineNotice::ChannelHopped(channel) => self.ui.channel_hopped(*channel),
            EngineNotice::PingReceived(from) => self.ui.ping_received(from),
            EngineNotice::Progress(fraction) => self.ui.show_progress(*fraction),
            EngineNotice::CacheUsed(percent) => self.ui.show_cache_used(*percent),
            EngineNotice::Status(status) => self.ui.show_status(status),
        }
    }

    // ── Messaging pause ───────────────────────────────────────

    /// Extend the messaging pause to at least `now + duration`.
    pub fn pause_messaging_for(&mut self, now_ms: u64, duration_ms: u32) {
        self.paused_until = self.paused_until.max(now_ms + u64::from(duration_ms));
    }

    pub fn is_messaging_paused(&self, now_ms: u64) -> bool {
        now_ms < self.paused_until
    }
}

/// `"<device> @ <cluster>"`, or a fixed title until both aliases exist.
fn ready_title(engine: &impl QueryPort) -> heapless::String<32> {
    let mut title = heapless::String::new();
    // Two aliases and the separator fit the buffer.
    let _ = match (engine.device_alias(), engine.cluster_alias()) {
        (Some(device), Some(cluster)) => write!(title, "{device} @ {cluster}"),
        _ => title.write_str(FALLBACK_TITLE),
    };
    title
}

/// Identity defaults for a headless base station.
pub fn default_init_form(now_ms: u64) -> DeviceInitForm {
    let mut form = DeviceInitForm {
        device_alias: heapless::String::new(),
        cluster_alias: heapless::String::new(),
        password: heapless::String::new(),
        channel_count: 64,
        hop_schedule: heapless::String::new(),
        center_frequency_mhz: 915.0,
        daylight_saving: false,
        time_zone: heapless::String::new(),
    };
    // All values fit their buffers.
    let _ = write!(form.device_alias, "b.{:05}", now_ms % 100_000);
    let _ = form.cluster_alias.push_str("temp");
    let _ = form.hop_schedule.push_str("100");
    let _ = form.time_zone.push_str("New York");
    form
}
