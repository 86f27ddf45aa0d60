//! Function-pointer startup state machine.
//!
//! Brings the mesh engine from cold boot to ready, one phase per call:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PhaseTable                                                  │
//! │  ┌───────────────────────┬─────────────────────────────────┐ │
//! │  │ StartupPhase          │ step                            │ │
//! │  ├───────────────────────┼─────────────────────────────────┤ │
//! │  │ Idle                  │ fn(ctx) -> Option<StartupPhase> │ │
//! │  │ EncryptedStorageReady │ fn(ctx) -> Option<StartupPhase> │ │
//! │  │ Licensed              │ fn(ctx) -> Option<StartupPhase> │ │
//! │  │ ...                   │ ...                             │ │
//! │  └───────────────────────┴─────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`StartupSequencer::advance`] calls `step` for the **current** phase.
//! `Some(next)` moves the pointer; `None` stays, so a phase whose engine
//! call is not ready yet simply repeats on the next call.

pub mod context;
pub mod phases;

use context::StartupContext;
use log::info;

use crate::app::ports::MeshEngine;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Startup phases. Must stay in sync with [`phases::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StartupPhase {
    Idle = 0,
    EncryptedStorageReady = 1,
    Licensed = 2,
    DeviceStoreReady = 3,
    NeedPassword = 4,
    DeviceInitialized = 5,
    Ready = 6,
    Unlicensed = 7,
    Error = 8,
    InitializeDevice = 9,
}

impl StartupPhase {
    pub const COUNT: usize = 10;

    /// Panics on out-of-range in debug builds; returns `Error` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::EncryptedStorageReady,
            2 => Self::Licensed,
            3 => Self::DeviceStoreReady,
            4 => Self::NeedPassword,
            5 => Self::DeviceInitialized,
            6 => Self::Ready,
            7 => Self::Unlicensed,
            8 => Self::Error,
            9 => Self::InitializeDevice,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Error
            }
        }
    }

    /// No further `advance` call changes the phase.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Unlicensed | Self::Error | Self::NeedPassword | Self::InitializeDevice
        )
    }
}

// ---------------------------------------------------------------------------
// Phase descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Per-phase work. Returns `Some(next)` to move on, `None` to stay.
pub type PhaseStepFn<E> = fn(&mut StartupContext<'_, E>) -> Option<StartupPhase>;

pub struct PhaseDescriptor<E> {
    pub id: StartupPhase,
    pub name: &'static str,
    pub step: PhaseStepFn<E>,
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

pub struct StartupSequencer<E> {
    table: [PhaseDescriptor<E>; StartupPhase::COUNT],
    current: usize,
    /// `advance` calls spent in the current phase.
    steps_in_phase: u32,
}

impl<E: MeshEngine> Default for StartupSequencer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MeshEngine> StartupSequencer<E> {
    pub fn new() -> Self {
        Self {
            table: phases::build_phase_table(),
            current: StartupPhase::Idle as usize,
            steps_in_phase: 0,
        }
    }

    pub fn phase(&self) -> StartupPhase {
        StartupPhase::from_index(self.current)
    }

    pub fn phase_name(&self) -> &'static str {
        self.table[self.current].name
    }

    pub fn steps_in_phase(&self) -> u32 {
        self.steps_in_phase
    }

    /// Perform exactly one phase's work and return the resulting phase.
    pub fn advance(&mut self, ctx: &mut StartupContext<'_, E>) -> StartupPhase {
        let descriptor = &self.table[self.current];
        debug_assert_eq!(descriptor.id as usize, self.current);

        self.steps_in_phase = self.steps_in_phase.saturating_add(1);
        if let Some(next) = (descriptor.step)(ctx) {
            let next_idx = next as usize;
            if next_idx != self.current {
                info!(
                    "Startup: {} -> {}",
                    self.table[self.current].name, self.table[next_idx].name
                );
                self.current = next_idx;
                self.steps_in_phase = 0;
            }
        }
        self.phase()
    }
}
