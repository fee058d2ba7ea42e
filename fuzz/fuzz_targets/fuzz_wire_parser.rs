//! Fuzz target: wire token parser and receiver frame handling
//!
//! Feeds arbitrary byte frames through `LinkMessage::parse` and then
//! through a full `Responder` cycle over a scripted transport.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A frame parses iff it is byte-exact one of the seven tokens
//! - Only command tokens ever produce a reply; garbage is silent
//! - The responder is always listening again after a cycle
//!
//! cargo fuzz run fuzz_wire_parser

#![no_main]

use std::cell::Cell;
use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use relaylink::app::ports::{Clock, RelayPort, StorageError, StoragePort};
use relaylink::app::settings::SettingsStore;
use relaylink::config::ProtocolConfig;
use relaylink::link::{LinkMessage, LinkTransport, ReceiveError, Responder, SendError};

// ── In-memory doubles ─────────────────────────────────────────

struct TickingClock {
    now: Cell<u32>,
}

impl Clock for TickingClock {
    fn now_ms(&self) -> u32 {
        let t = self.now.get();
        self.now.set(t.wrapping_add(1));
        t
    }
}

#[derive(Default)]
struct FakeRelay {
    on: bool,
}

impl RelayPort for FakeRelay {
    fn set_on(&mut self) {
        self.on = true;
    }

    fn set_off(&mut self) {
        self.on = false;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

#[derive(Default)]
struct MemStore {
    map: HashMap<String, Vec<u8>>,
}

impl StoragePort for MemStore {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let v = self
            .map
            .get(&format!("{ns}::{key}"))
            .ok_or(StorageError::NotFound)?;
        let n = v.len().min(buf.len());
        buf[..n].copy_from_slice(&v[..n]);
        Ok(n)
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.map.insert(format!("{ns}::{key}"), data.to_vec());
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.map.contains_key(&format!("{ns}::{key}"))
    }
}

struct OneShotTransport {
    pending: Option<Vec<u8>>,
    replies: usize,
    listening: bool,
}

impl LinkTransport for OneShotTransport {
    fn send(&mut self, _frame: &[u8]) -> Result<(), SendError> {
        self.replies += 1;
        self.listening = false;
        Ok(())
    }

    fn start_listening(&mut self) {
        self.listening = true;
    }

    fn data_ready(&self) -> bool {
        self.listening && self.pending.is_some()
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, ReceiveError> {
        let frame = self.pending.take().ok_or(ReceiveError::Empty)?;
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Ok(n)
    }
}

fuzz_target!(|data: &[u8]| {
    // Parser: parse iff byte-exact vocabulary.
    let parsed = LinkMessage::parse(data);
    if let Some(msg) = parsed {
        assert_eq!(msg.wire(), data, "parse must only accept exact tokens");
    }

    // Full receiver cycle over the same frame.
    let mut responder = Responder::new(ProtocolConfig::default());
    let mut transport = OneShotTransport {
        pending: Some(data.to_vec()),
        replies: 0,
        listening: true,
    };
    let mut relay = FakeRelay::default();
    let mut settings = SettingsStore::open(MemStore::default());
    let clock = TickingClock { now: Cell::new(0) };

    let handled = responder.poll(&mut transport, &mut relay, &mut settings, &clock);
    assert!(handled.is_some(), "a pending frame must be consumed");

    let is_command = parsed.is_some_and(LinkMessage::is_command);
    assert_eq!(
        transport.replies > 0,
        is_command,
        "only command tokens are acknowledged"
    );
    assert!(transport.listening, "responder must re-arm unconditionally");
});
