//! Outbound message lifecycle.
//!
//! The base station has a single outbound slot. Producers (the remote
//! command processor, user actions) overwrite it with [`MessageLifecycle::enqueue`];
//! the control cycle advances it one step per call:
//!
//! ```text
//!  New ──[now ≥ scheduled_at]──▶ Scheduled ──▶ SendingDirect
//!                                               │   │
//!                       broadcast ok / direct ok│   │direct failed
//!                                               ▼   ▼
//!                                        SentDirect  SendingDirect
//!                                                       │ (next cycle)
//!                                          mesh ok ─────┼───── mesh failed
//!                                               ▼              ▼
//!                                          MeshQueued        Failed
//! ```
//!
//! Terminal states stay put until the next enqueue.

use log::{debug, info, warn};

use crate::app::ports::MessagingPort;
use crate::types::{DeviceId, MAX_PAYLOAD, MessageFlags, MessageKind, Payload};

/// Where the outbound message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Device(DeviceId),
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    New,
    Scheduled,
    SendingDirect,
    SentDirect,
    MeshQueued,
    Failed,
    Cancelled,
    /// Nothing has ever been enqueued.
    Unknown,
}

impl SendState {
    /// No further transitions happen without a new enqueue.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::SentDirect | Self::MeshQueued | Self::Failed | Self::Cancelled | Self::Unknown
        )
    }
}

/// The single reusable outbound message.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    payload: Payload,
    recipient: Recipient,
    kind: MessageKind,
    state: SendState,
    scheduled_at: Option<u64>,
}

impl OutboundMessage {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn scheduled_at(&self) -> Option<u64> {
        self.scheduled_at
    }
}

pub struct MessageLifecycle {
    message: OutboundMessage,
}

impl Default for MessageLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLifecycle {
    pub fn new() -> Self {
        Self {
            message: OutboundMessage {
                payload: Payload::new(),
                recipient: Recipient::Broadcast,
                kind: MessageKind::Plain,
                state: SendState::Unknown,
                scheduled_at: None,
            },
        }
    }

    pub fn message(&self) -> &OutboundMessage {
        &self.message
    }

    pub fn state(&self) -> SendState {
        self.message.state
    }

    /// Replace the outbound message with a device-addressed one.
    ///
    /// Whatever was pending is dropped.
    ///
    /// # Panics
    ///
    /// If `payload` is longer than [`MAX_PAYLOAD`].
    pub fn enqueue(
        &mut self,
        payload: &[u8],
        recipient: Recipient,
        kind: MessageKind,
        delay_ms: u32,
        now_ms: u64,
    ) {
        assert!(
            payload.len() <= MAX_PAYLOAD,
            "outbound payload of {} bytes exceeds {MAX_PAYLOAD}",
            payload.len()
        );
        if !self.message.state.is_terminal() {
            debug!("Outbound: replacing pending message in {:?}", self.message.state);
        }

        self.message.payload.clear();
        // Length checked above.
        let _ = self.message.payload.extend_from_slice(payload);
        self.message.recipient = recipient;
        self.message.kind = kind;
        self.message.state = SendState::New;
        self.message.scheduled_at = Some(now_ms + u64::from(delay_ms));
    }

    /// Replace the outbound message with a plain broadcast.
    ///
    /// # Panics
    ///
    /// If `payload` is longer than [`MAX_PAYLOAD`].
    pub fn enqueue_broadcast(&mut self, payload: &[u8], delay_ms: u32, now_ms: u64) {
        self.enqueue(payload, Recipient::Broadcast, MessageKind::Plain, delay_ms, now_ms);
    }

    pub fn cancel(&mut self) {
        self.message.state = SendState::Cancelled;
        self.message.scheduled_at = None;
    }

    /// Take at most one lifecycle step.
    pub fn advance(&mut self, now_ms: u64, radio: &mut impl MessagingPort) {
        match self.message.state {
            SendState::New => {
                if self.message.scheduled_at.is_some_and(|at| now_ms >= at) {
                    self.message.state = SendState::Scheduled;
                    self.dispatch(radio);
                }
            }
            SendState::Scheduled => self.dispatch(radio),
            SendState::SendingDirect => self.fail_over_to_mesh(radio),
            _ => {}
        }
    }

    fn dispatch(&mut self, radio: &mut impl MessagingPort) {
        self.message.scheduled_at = None;
        self.message.state = SendState::SendingDirect;

        let broadcast_id = radio.broadcast_id();
        let msg = &mut self.message;
        match &msg.recipient {
            Recipient::Device(id) if *id != broadcast_id => {
                let flags = MessageFlags {
                    kind: msg.kind,
                    ack_requested: true,
                };
                match radio.send_direct(&msg.payload, id, flags) {
                    Ok(()) => {
                        info!("Outbound: sent direct to {id}");
                        msg.state = SendState::SentDirect;
                    }
                    Err(e) => {
                        warn!("Outbound: direct send to {id} failed ({e}), mesh next cycle");
                    }
                }
            }
            _ => match radio.broadcast(&msg.payload, msg.kind) {
                Ok(()) => {
                    info!("Outbound: broadcast sent");
                    msg.state = SendState::SentDirect;
                }
                Err(e) => {
                    warn!("Outbound: broadcast failed ({e})");
                    msg.state = SendState::Failed;
                }
            },
        }
    }

    fn fail_over_to_mesh(&mut self, radio: &mut impl MessagingPort) {
        let msg = &mut self.message;
        let Recipient::Device(id) = &msg.recipient else {
            msg.state = SendState::Failed;
            return;
        };
        let flags = MessageFlags {
            kind: msg.kind,
            ack_requested: true,
        };
        match radio.send_via_mesh(&msg.payload, id, flags) {
            Ok(()) => {
                info!("Outbound: queued to mesh for {id}");
                msg.state = SendState::MeshQueued;
            }
            Err(e) => {
                warn!("Outbound: mesh send to {id} failed ({e})");
                msg.state = SendState::Failed;
            }
        }
    }
}
