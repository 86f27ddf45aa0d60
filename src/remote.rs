//! Remote command protocol.
//!
//! A trusted peer can query or reconfigure the base station by sending a
//! control-kind message of the form:
//!
//! ```text
//!   ┌───┬───┬───┬───┬──────┐
//!   │ C │ F │ G │ : │ code │   (bytes beyond the code are ignored)
//!   └───┴───┴───┴───┴──────┘
//! ```
//!
//! Every accepted command answers the requestor with a short text reply
//! through the outbound lifecycle, after `reply_delay_ms`.

use core::fmt::Write;

use log::{info, warn};

use crate::app::ports::{MessagingPort, PreferencePort, QueryPort};
use crate::config::ControlConfig;
use crate::intents::PendingIntents;
use crate::outbound::{MessageLifecycle, Recipient};
use crate::prefs::Preference;
use crate::types::{DeviceId, MessageKind, StorageZone};

const PREFIX: &[u8; 3] = b"CFG";
const SEPARATOR: u8 = b':';
const MIN_LEN: usize = 5;

/// Reply text buffer; list items that do not fit are dropped.
type Reply = heapless::String<256>;

/// Recognised command codes (byte 4 of the payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Battery,
    Uptime,
    Neighbors,
    Path,
    ClearMeshPackets,
    ClearMeshGraph,
    ClearPingTable,
    ClearMessages,
    EnableLearning,
    DisableLearning,
}

impl CommandCode {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'B' => Self::Battery,
            b'U' => Self::Uptime,
            b'N' => Self::Neighbors,
            b'P' => Self::Path,
            b'M' => Self::ClearMeshPackets,
            b'G' => Self::ClearMeshGraph,
            b'T' => Self::ClearPingTable,
            b'C' => Self::ClearMessages,
            b'E' => Self::EnableLearning,
            b'D' => Self::DisableLearning,
            _ => return None,
        })
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Battery => b'B',
            Self::Uptime => b'U',
            Self::Neighbors => b'N',
            Self::Path => b'P',
            Self::ClearMeshPackets => b'M',
            Self::ClearMeshGraph => b'G',
            Self::ClearPingTable => b'T',
            Self::ClearMessages => b'C',
            Self::EnableLearning => b'E',
            Self::DisableLearning => b'D',
        }
    }

    /// Zone emptied by a clear command.
    const fn zone(self) -> Option<StorageZone> {
        match self {
            Self::ClearMeshPackets => Some(StorageZone::MeshPackets),
            Self::ClearMeshGraph => Some(StorageZone::MeshGraph),
            Self::ClearPingTable => Some(StorageZone::PingTable),
            Self::ClearMessages => Some(StorageZone::Messages),
            _ => None,
        }
    }
}

/// A parsed remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub code: CommandCode,
    pub requestor: DeviceId,
}

/// `true` if the payload has the `CFG:<code>` shape, known code or not.
pub fn is_remote_command(payload: &[u8]) -> bool {
    payload.len() >= MIN_LEN && payload[..3] == PREFIX[..] && payload[3] == SEPARATOR
}

/// Parse a payload into a command, rejecting unknown codes.
pub fn parse(payload: &[u8], requestor: &DeviceId) -> Option<RemoteCommand> {
    if !is_remote_command(payload) {
        return None;
    }
    CommandCode::from_code(payload[4]).map(|code| RemoteCommand {
        code,
        requestor: requestor.clone(),
    })
}

// ───────────────────────────────────────────────────────────────
// Processor
// ───────────────────────────────────────────────────────────────

pub struct RemoteCommandProcessor {
    neighbor_limit: usize,
    reply_delay_ms: u32,
}

impl RemoteCommandProcessor {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            neighbor_limit: config.neighbor_report_limit as usize,
            reply_delay_ms: config.reply_delay_ms,
        }
    }

    /// Run one command and queue its reply to the requestor.
    ///
    /// Returns `false` for malformed payloads and unknown codes, which are
    /// logged and otherwise ignored.
    pub fn execute(
        &self,
        payload: &[u8],
        requestor: &DeviceId,
        now_ms: u64,
        engine: &mut (impl QueryPort + PreferencePort + MessagingPort),
        outbox: &mut MessageLifecycle,
        intents: &mut PendingIntents,
    ) -> bool {
        let Some(command) = parse(payload, requestor) else {
            if is_remote_command(payload) {
                warn!("Remote: unknown command code {:#04x} from {requestor}", payload[4]);
            } else {
                warn!("Remote: malformed command from {requestor}");
            }
            return false;
        };

        let mut reply = Reply::new();
        match command.code {
            CommandCode::Battery => {
                let level = engine.battery_percent().unwrap_or(100);
                let _ = write!(reply, "Battery: {level:03}");
            }
            CommandCode::Uptime => {
                let _ = write!(reply, "Uptime: {} min", now_ms / 60_000);
            }
            CommandCode::Neighbors => {
                let _ = reply.push_str("Neighbors: ");
                let neighbors = engine.nearby_devices(self.neighbor_limit);
                for (i, id) in neighbors.iter().take(self.neighbor_limit).enumerate() {
                    let sep = if i > 0 { ", " } else { "" };
                    let pushed = match engine.resolve_alias(id) {
                        Some(alias) => write!(reply, "{sep}{alias}"),
                        None => write!(reply, "{sep}{id}"),
                    };
                    if pushed.is_err() {
                        break;
                    }
                }
            }
            CommandCode::Path => {
                let _ = reply.push_str("Path: ");
                write_path(&mut reply, &*engine, requestor);
            }
            CommandCode::ClearMeshPackets
            | CommandCode::ClearMeshGraph
            | CommandCode::ClearPingTable
            | CommandCode::ClearMessages => {
                if let Some(zone) = command.code.zone() {
                    intents.queue_zone_clear(zone);
                    let _ = write!(reply, "Clearing: {zone}");
                }
            }
            CommandCode::EnableLearning | CommandCode::DisableLearning => {
                let enable = command.code == CommandCode::EnableLearning;
                engine.set_enabled(Preference::MeshLearningEnabled, enable);
                let _ = write!(reply, "Learning: {}", if enable { "on" } else { "off" });
            }
        }

        info!("Remote: '{}' reply to {requestor}", command.code.code() as char);
        outbox.enqueue(
            reply.as_bytes(),
            Recipient::Device(requestor.clone()),
            MessageKind::Plain,
            self.reply_delay_ms,
            now_ms,
        );
        true
    }
}

/// Hops from this device to `to`: alias when known, else `[id]`.
fn write_path(
    reply: &mut Reply,
    engine: &(impl QueryPort + MessagingPort),
    to: &DeviceId,
) {
    let path = engine.find_path(&engine.device_id(), to);
    if path.is_empty() {
        let _ = reply.push_str("no path!");
        return;
    }
    for (i, hop) in path.iter().enumerate() {
        let sep = if i > 0 { " -> " } else { "" };
        let pushed = match engine.resolve_alias(hop) {
            Some(alias) => write!(reply, "{sep}{alias}"),
            None => write!(reply, "{sep}[{hop}]"),
        };
        if pushed.is_err() {
            break;
        }
    }
}
