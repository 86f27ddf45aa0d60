//! Mock UI, surface and backpack adapters for integration tests.
//!
//! Record every call so tests can assert on the full history. The engine
//! side uses the library's own `MemoryEngine`.

use std::cell::RefCell;
use std::rc::Rc;

use fieldnode::adapters::memory_engine::MemoryEngine;
use fieldnode::app::ports::{ControlSurface, PreferencePort, UiPort};
use fieldnode::backpacks::{Backpack, BackpackKind, UserEvent};
use fieldnode::types::{DeviceId, InboundMessage};

// ── Identities ────────────────────────────────────────────────

pub fn base_id() -> DeviceId {
    DeviceId::new("BASE0001").unwrap()
}

pub fn broadcast_id() -> DeviceId {
    DeviceId::new("BROADCST").unwrap()
}

/// `PEER000n` for n in 0..=9.
pub fn peer(n: u8) -> DeviceId {
    DeviceId::new(&format!("PEER000{n}")).unwrap()
}

pub fn engine() -> MemoryEngine {
    MemoryEngine::new(base_id(), broadcast_id())
}

// ── RecordingUi ───────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingUi {
    pub statuses: Vec<String>,
    pub progress: Vec<f32>,
    pub received: Vec<InboundMessage>,
    pub channels: Vec<u8>,
    pub pings: Vec<DeviceId>,
    pub cache_used: Vec<u8>,
    pub yields: usize,
    /// Report an interrupt on the poll following this many yields.
    pub interrupt_after: Option<usize>,
}

#[allow(dead_code)]
impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn showed(&self, status: &str) -> bool {
        self.statuses.iter().any(|s| s == status)
    }
}

impl UiPort for RecordingUi {
    fn show_status(&mut self, status: &str) {
        self.statuses.push(status.to_owned());
    }

    fn show_progress(&mut self, fraction: f32) {
        self.progress.push(fraction);
    }

    fn show_cache_used(&mut self, percent: u8) {
        self.cache_used.push(percent);
    }

    fn channel_hopped(&mut self, channel: u8) {
        self.channels.push(channel);
    }

    fn ping_received(&mut self, from: &DeviceId) {
        self.pings.push(from.clone());
    }

    fn message_received(&mut self, message: &InboundMessage) {
        self.received.push(message.clone());
    }

    fn user_interrupted(&mut self) -> bool {
        self.interrupt_after.is_some_and(|n| self.yields >= n)
    }

    fn yield_now(&mut self) {
        self.yields += 1;
    }
}

// ── RecordingSurface ──────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSurface {
    pub screens: Vec<String>,
    pub password_prompts: usize,
}

impl ControlSurface for RecordingSurface {
    fn prompt_password(&mut self) {
        self.password_prompts += 1;
        self.screens.push("Password protected!".to_owned());
    }

    fn show_busy(&mut self, title: &str, _description: &str, _status: &str, _cancellable: bool) {
        self.screens.push(title.to_owned());
    }

    fn update_busy_status(&mut self, status: &str) {
        self.screens.push(status.to_owned());
    }

    fn show_title(&mut self, title: &str) {
        self.screens.push(title.to_owned());
    }
}

// ── MockBackpack ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BackpackHit {
    Init,
    Event(UserEvent),
    Message { payload: Vec<u8>, sender: DeviceId },
}

pub type HitLog = Rc<RefCell<Vec<BackpackHit>>>;

pub struct MockBackpack {
    pub kind: BackpackKind,
    pub remote: bool,
    pub running: bool,
    pub consumes_events: bool,
    pub hits: HitLog,
}

#[allow(dead_code)]
impl MockBackpack {
    /// A running accessory; returns it with a handle to its hit log.
    pub fn new(kind: BackpackKind, remote: bool) -> (Self, HitLog) {
        let hits = HitLog::default();
        let backpack = Self {
            kind,
            remote,
            running: true,
            consumes_events: true,
            hits: Rc::clone(&hits),
        };
        (backpack, hits)
    }
}

impl Backpack for MockBackpack {
    fn handle_user_event(&mut self, event: UserEvent) -> bool {
        self.hits.borrow_mut().push(BackpackHit::Event(event));
        self.consumes_events
    }

    fn handle_message(&mut self, payload: &[u8], sender: &DeviceId, _recipient: &DeviceId) -> bool {
        self.hits.borrow_mut().push(BackpackHit::Message {
            payload: payload.to_vec(),
            sender: sender.clone(),
        });
        true
    }

    fn init(&mut self, _prefs: &dyn PreferencePort) -> bool {
        self.hits.borrow_mut().push(BackpackHit::Init);
        self.running
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn kind(&self) -> BackpackKind {
        self.kind
    }

    fn remote_enabled(&self) -> bool {
        self.remote
    }
}
