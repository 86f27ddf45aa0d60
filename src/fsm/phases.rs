//! Startup phase step functions and table builder.
//!
//! ```text
//!  Idle ──▶ EncryptedStorageReady ──▶ Licensed ──▶ DeviceStoreReady ──▶ DeviceInitialized ──▶ Ready
//!   │                │                   │               │
//!   ▼                ▼                   ├──▶ NeedPassword
//!  Error         Unlicensed              ▼               ├──▶ InitializeDevice
//!                                       Error            ▼
//!                                                       Error
//! ```
//!
//! An engine answer of `NotReady` keeps the current phase.

use log::{error, info, warn};

use super::context::StartupContext;
use super::{PhaseDescriptor, StartupPhase};
use crate::app::ports::{DeviceStoreStatus, IdentityStatus, MeshEngine};
use crate::error::EngineError;
use crate::prefs::EngineSettings;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_phase_table<E: MeshEngine>() -> [PhaseDescriptor<E>; StartupPhase::COUNT] {
    [
        // Index 0
        PhaseDescriptor {
            id: StartupPhase::Idle,
            name: "Idle",
            step: idle_step,
        },
        // Index 1
        PhaseDescriptor {
            id: StartupPhase::EncryptedStorageReady,
            name: "EncryptedStorageReady",
            step: encrypted_storage_ready_step,
        },
        // Index 2
        PhaseDescriptor {
            id: StartupPhase::Licensed,
            name: "Licensed",
            step: licensed_step,
        },
        // Index 3
        PhaseDescriptor {
            id: StartupPhase::DeviceStoreReady,
            name: "DeviceStoreReady",
            step: device_store_ready_step,
        },
        // Index 4
        PhaseDescriptor {
            id: StartupPhase::NeedPassword,
            name: "NeedPassword",
            step: terminal_step,
        },
        // Index 5
        PhaseDescriptor {
            id: StartupPhase::DeviceInitialized,
            name: "DeviceInitialized",
            step: device_initialized_step,
        },
        // Index 6
        PhaseDescriptor {
            id: StartupPhase::Ready,
            name: "Ready",
            step: terminal_step,
        },
        // Index 7
        PhaseDescriptor {
            id: StartupPhase::Unlicensed,
            name: "Unlicensed",
            step: terminal_step,
        },
        // Index 8
        PhaseDescriptor {
            id: StartupPhase::Error,
            name: "Error",
            step: terminal_step,
        },
        // Index 9
        PhaseDescriptor {
            id: StartupPhase::InitializeDevice,
            name: "InitializeDevice",
            step: terminal_step,
        },
    ]
}

/// Map an engine failure to the phase's failure target, or stay on `NotReady`.
fn on_failure(phase: &str, e: EngineError, target: StartupPhase) -> Option<StartupPhase> {
    if e == EngineError::NotReady {
        info!("Startup: {phase} waiting on engine");
        return None;
    }
    error!("Startup: {phase} failed ({e})");
    Some(target)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Steps
// ═══════════════════════════════════════════════════════════════════════════

fn idle_step<E: MeshEngine>(ctx: &mut StartupContext<'_, E>) -> Option<StartupPhase> {
    match ctx.engine.init_encrypted_storage() {
        Ok(()) => Some(StartupPhase::EncryptedStorageReady),
        Err(e) => on_failure("encrypted storage init", e, StartupPhase::Error),
    }
}

fn encrypted_storage_ready_step<E: MeshEngine>(
    ctx: &mut StartupContext<'_, E>,
) -> Option<StartupPhase> {
    match ctx.engine.validate_license() {
        Ok(true) => Some(StartupPhase::Licensed),
        Ok(false) => {
            error!("Startup: license invalid");
            Some(StartupPhase::Unlicensed)
        }
        Err(e) => on_failure("license validation", e, StartupPhase::Unlicensed),
    }
}

fn licensed_step<E: MeshEngine>(ctx: &mut StartupContext<'_, E>) -> Option<StartupPhase> {
    match ctx.engine.open_device_store() {
        Ok(DeviceStoreStatus::Open) => Some(StartupPhase::DeviceStoreReady),
        Ok(DeviceStoreStatus::PasswordRequired) => {
            warn!("Startup: device store is password protected");
            Some(StartupPhase::NeedPassword)
        }
        Err(e) => on_failure("device store open", e, StartupPhase::Error),
    }
}

fn device_store_ready_step<E: MeshEngine>(ctx: &mut StartupContext<'_, E>) -> Option<StartupPhase> {
    match ctx.engine.finish_device_init() {
        Ok(IdentityStatus::Initialized) => Some(StartupPhase::DeviceInitialized),
        Ok(IdentityStatus::NeedsGenesis) => {
            warn!("Startup: no identity, device must be initialized");
            Some(StartupPhase::InitializeDevice)
        }
        Err(e) => on_failure("identity init", e, StartupPhase::Error),
    }
}

fn device_initialized_step<E: MeshEngine>(
    ctx: &mut StartupContext<'_, E>,
) -> Option<StartupPhase> {
    let settings = EngineSettings::from_prefs(&*ctx.engine);
    if !settings.any_channel() {
        warn!("Startup: no communication channel enabled");
    }

    if let Err(e) = ctx.engine.start(&settings) {
        return on_failure("engine start", e, StartupPhase::Error);
    }
    info!(
        "Startup: engine started (lora={} wifi={} wired={})",
        settings.lora, settings.wifi, settings.wired
    );

    // Soft failure: Ready does not depend on the prune.
    match ctx.engine.open_storage() {
        Ok(()) => {
            if let Err(e) = ctx.engine.prune(true) {
                warn!("Startup: initial prune failed ({e})");
            }
            ctx.engine.close_storage();
        }
        Err(e) => warn!("Startup: storage unavailable for initial prune ({e})"),
    }

    ctx.scheduler.configure(&ctx.config.flush_intervals);
    Some(StartupPhase::Ready)
}

fn terminal_step<E: MeshEngine>(_ctx: &mut StartupContext<'_, E>) -> Option<StartupPhase> {
    None
}
