//! Borrowed context threaded through every startup phase step.
//!
//! Phases need the engine, the flush scheduler (populated on the way to
//! Ready) and the configuration. The context only borrows them for one
//! `advance` call; ownership stays with the control service.

use crate::config::ControlConfig;
use crate::scheduler::FlushScheduler;

pub struct StartupContext<'a, E> {
    pub engine: &'a mut E,
    pub scheduler: &'a mut FlushScheduler,
    pub config: &'a ControlConfig,
}

impl<'a, E> StartupContext<'a, E> {
    pub fn new(engine: &'a mut E, scheduler: &'a mut FlushScheduler, config: &'a ControlConfig) -> Self {
        Self {
            engine,
            scheduler,
            config,
        }
    }
}
