//! Log-based UI adapters.
//!
//! Implement [`UiPort`] and [`ControlSurface`] by writing to the logger
//! (UART / USB-CDC in production). Used by display-less bases and on the
//! host; a panel driver would implement the same traits.

use log::{debug, info, warn};

use crate::app::ports::{ControlSurface, UiPort};
use crate::types::{DeviceId, InboundMessage};

/// Front panel stand-in that logs every update.
#[derive(Default)]
pub struct LogUi {
    last_status: heapless::String<32>,
    interrupt_pending: bool,
}

impl LogUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `user_interrupted` poll report an interrupt.
    pub fn request_interrupt(&mut self) {
        self.interrupt_pending = true;
    }

    pub fn last_status(&self) -> &str {
        &self.last_status
    }
}

impl UiPort for LogUi {
    fn show_status(&mut self, status: &str) {
        // Only log changes; the cycle repeats the same statuses constantly.
        if self.last_status.as_str() != status {
            debug!("UI | status={status}");
            self.last_status.clear();
            for c in status.chars() {
                if self.last_status.push(c).is_err() {
                    break;
                }
            }
        }
    }

    fn show_progress(&mut self, fraction: f32) {
        if fraction > 0.0 {
            debug!("UI | progress={:.0}%", fraction * 100.0);
        }
    }

    fn show_cache_used(&mut self, percent: u8) {
        info!("UI | cache={percent}%");
    }

    fn channel_hopped(&mut self, channel: u8) {
        debug!("UI | channel={channel}");
    }

    fn ping_received(&mut self, from: &DeviceId) {
        info!("UI | ping from={from}");
    }

    fn message_received(&mut self, message: &InboundMessage) {
        info!(
            "UI | message from={} id={} bytes={}",
            message.sender,
            message.message_id,
            message.payload.len()
        );
    }

    fn user_interrupted(&mut self) -> bool {
        core::mem::take(&mut self.interrupt_pending)
    }

    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

/// Control surface of a base without keyboard or screen.
#[derive(Default)]
pub struct HeadlessSurface;

impl HeadlessSurface {
    pub fn new() -> Self {
        Self
    }
}

impl ControlSurface for HeadlessSurface {
    fn prompt_password(&mut self) {
        warn!("SURFACE | Password protected! A headless base cannot unlock its store");
    }

    fn show_busy(&mut self, title: &str, description: &str, status: &str, _cancellable: bool) {
        info!("SURFACE | {title} | {description} | {status}");
    }

    fn update_busy_status(&mut self, status: &str) {
        info!("SURFACE | {status}");
    }

    fn show_title(&mut self, title: &str) {
        info!("SURFACE | {title}");
    }
}
