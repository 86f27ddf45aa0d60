//! Fuzz target: inbound control payload routing
//!
//! Feeds arbitrary bytes through the remote command grammar, the backpack
//! request grammar and a full `RemoteCommandProcessor::execute` against the
//! in-memory engine.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - `execute` accepts exactly the payloads `parse` accepts
//! - A rejected payload never queues a reply
//!
//! cargo fuzz run fuzz_remote_command

#![no_main]

use fieldnode::adapters::memory_engine::MemoryEngine;
use fieldnode::backpacks::is_backpack_request;
use fieldnode::config::ControlConfig;
use fieldnode::intents::PendingIntents;
use fieldnode::outbound::{MessageLifecycle, SendState};
use fieldnode::remote::{RemoteCommandProcessor, is_remote_command, parse};
use fieldnode::types::DeviceId;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let (Some(base), Some(broadcast), Some(requestor)) = (
        DeviceId::new("BASE0001"),
        DeviceId::new("BROADCST"),
        DeviceId::new("PEER0001"),
    ) else {
        return;
    };

    let _ = is_backpack_request(data);
    let recognised = is_remote_command(data);
    let parsed = parse(data, &requestor);
    assert!(parsed.is_none() || recognised);

    let mut engine = MemoryEngine::new(base, broadcast);
    let mut outbox = MessageLifecycle::new();
    let mut intents = PendingIntents::default();
    let processor = RemoteCommandProcessor::new(&ControlConfig::default());

    let accepted = processor.execute(data, &requestor, 0, &mut engine, &mut outbox, &mut intents);
    assert_eq!(accepted, parsed.is_some());
    if !accepted {
        assert_eq!(outbox.state(), SendState::Unknown);
    }
});
