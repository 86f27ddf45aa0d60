//! Relay backpack: pulses a digital output to close an external relay.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use super::{Backpack, BackpackKind, UserEvent};
use crate::app::ports::PreferencePort;
use crate::prefs::Preference;
use crate::types::DeviceId;

/// Granularity of the blocking pulse wait.
const PULSE_SLICE_MS: u32 = 100;

pub struct RelayBackpack<P, D> {
    pin: P,
    delay: D,
    pulse_ms: u32,
    running: bool,
    remote_enabled: bool,
}

impl<P: OutputPin, D: DelayNs> RelayBackpack<P, D> {
    pub fn new(pin: P, delay: D, pulse_ms: u32) -> Self {
        Self {
            pin,
            delay,
            pulse_ms,
            running: false,
            remote_enabled: false,
        }
    }

    /// Hold the output high for the pulse duration, then release it.
    ///
    /// Blocks the caller for the whole pulse.
    pub fn trigger(&mut self) -> bool {
        if self.pin.set_high().is_err() {
            warn!("Relay: failed to drive output high");
            return false;
        }
        info!("Relay: on");

        let mut remaining = self.pulse_ms;
        while remaining > 0 {
            let slice = remaining.min(PULSE_SLICE_MS);
            self.delay.delay_ms(slice);
            remaining -= slice;
        }

        if self.pin.set_low().is_err() {
            warn!("Relay: failed to release output");
            return false;
        }
        info!("Relay: off");
        true
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}

impl<P: OutputPin, D: DelayNs> Backpack for RelayBackpack<P, D> {
    fn handle_user_event(&mut self, event: UserEvent) -> bool {
        match event {
            UserEvent::ActionButton => {
                info!("Relay: triggered by action button");
                self.trigger()
            }
            UserEvent::FactoryResetHeld => false,
        }
    }

    fn handle_message(&mut self, _payload: &[u8], sender: &DeviceId, _recipient: &DeviceId) -> bool {
        if !self.remote_enabled {
            warn!("Relay: remote request from {sender} but remote trigger disabled");
            return false;
        }
        info!("Relay: triggered remotely by {sender}");
        self.trigger()
    }

    fn init(&mut self, prefs: &dyn PreferencePort) -> bool {
        self.remote_enabled = prefs.is_enabled(Preference::BackpackRelayRemoteEnabled);
        if self.running {
            return true;
        }
        if !prefs.is_enabled(Preference::BackpackRelayEnabled) {
            info!("Relay: disabled in preferences");
            return false;
        }
        match self.pin.set_low() {
            Ok(()) => {
                self.running = true;
                info!("Relay: ready (remote {})", if self.remote_enabled { "on" } else { "off" });
            }
            Err(_) => warn!("Relay: output pin unavailable"),
        }
        self.running
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn name(&self) -> &'static str {
        "relay"
    }

    fn kind(&self) -> BackpackKind {
        BackpackKind::Relay
    }

    fn remote_enabled(&self) -> bool {
        self.remote_enabled
    }
}
