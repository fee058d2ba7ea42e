//! Integration tests: Responder → relay pin, persistence, ack discipline.
//!
//! Exercises the receiver-side stack through its public surface only:
//! scripted transport in, relay/storage side effects out.

#![cfg(not(target_os = "espidf"))]

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use relaylink::app::ports::{Clock, RelayPort, StorageError, StoragePort};
use relaylink::app::settings::SettingsStore;
use relaylink::config::ProtocolConfig;
use relaylink::link::{Handled, LinkTransport, ReceiveError, Responder, SendError};

// ── Test doubles ─────────────────────────────────────────────

/// Clock that ticks one millisecond per query, with a jump control for
/// crossing the anti-repeat window without millions of calls.
struct TickingClock {
    now: Cell<u32>,
}

impl TickingClock {
    fn new() -> Self {
        Self { now: Cell::new(0) }
    }

    fn jump(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for TickingClock {
    fn now_ms(&self) -> u32 {
        let t = self.now.get();
        self.now.set(t.wrapping_add(1));
        t
    }
}

/// Relay double with a shared live-level cell so tests can flip the pin
/// behind the responder's back.
#[derive(Clone)]
struct SharedRelay {
    on: Rc<Cell<bool>>,
    set_on_calls: Rc<Cell<u32>>,
}

impl SharedRelay {
    fn new() -> Self {
        Self {
            on: Rc::new(Cell::new(false)),
            set_on_calls: Rc::new(Cell::new(0)),
        }
    }
}

impl RelayPort for SharedRelay {
    fn set_on(&mut self) {
        self.on.set(true);
        self.set_on_calls.set(self.set_on_calls.get() + 1);
    }

    fn set_off(&mut self) {
        self.on.set(false);
    }

    fn is_on(&self) -> bool {
        self.on.get()
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

/// Transport double: frames are queued in, replies recorded out.
#[derive(Default)]
struct ScriptedTransport {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    listening: bool,
}

impl ScriptedTransport {
    fn push_frame(&mut self, frame: &[u8]) {
        self.inbound.push_back(frame.to_vec());
    }
}

impl LinkTransport for ScriptedTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), SendError> {
        self.sent.push(frame.to_vec());
        self.listening = false;
        Ok(())
    }

    fn start_listening(&mut self) {
        self.listening = true;
    }

    fn data_ready(&self) -> bool {
        self.listening && !self.inbound.is_empty()
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, ReceiveError> {
        let frame = self.inbound.pop_front().ok_or(ReceiveError::Empty)?;
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Ok(n)
    }
}

struct Rig {
    responder: Responder,
    transport: ScriptedTransport,
    relay: SharedRelay,
    settings: SettingsStore<MemStore>,
    clock: TickingClock,
}

impl Rig {
    fn new() -> Self {
        let mut transport = ScriptedTransport::default();
        transport.start_listening();
        Self {
            responder: Responder::new(ProtocolConfig::default()),
            transport,
            relay: SharedRelay::new(),
            settings: SettingsStore::open(MemStore::default()),
            clock: TickingClock::new(),
        }
    }

    fn deliver(&mut self, frame: &[u8]) -> Option<Handled> {
        self.transport.push_frame(frame);
        self.responder.poll(
            &mut self.transport,
            &mut self.relay,
            &mut self.settings,
            &self.clock,
        )
    }
}

// ── Tests ────────────────────────────────────────────────────

#[test]
fn relay_on_actuates_persists_and_acks() {
    let mut rig = Rig::new();

    let handled = rig.deliver(b"RELAY_ON");
    assert_eq!(handled, Some(Handled::RelayOn { repeated: false }));
    assert!(rig.relay.is_on());
    assert!(rig.settings.relay_on(), "state must be committed before ack");
    assert_eq!(rig.transport.sent, vec![b"ACK_ON".to_vec()]);
    assert!(rig.transport.listening, "must re-arm after handling");
}

#[test]
fn duplicate_on_inside_window_is_acked_but_not_reexecuted() {
    let mut rig = Rig::new();

    rig.deliver(b"RELAY_ON");
    assert_eq!(rig.relay.set_on_calls.get(), 1);

    // A retry of the same exchange lands moments later.
    let handled = rig.deliver(b"RELAY_ON");
    assert_eq!(handled, Some(Handled::RelayOn { repeated: true }));
    assert_eq!(rig.relay.set_on_calls.get(), 1, "pin must not be touched again");
    assert_eq!(rig.transport.sent.len(), 2, "every delivery still gets its ack");
}

#[test]
fn on_command_after_window_executes_again() {
    let mut rig = Rig::new();

    rig.deliver(b"RELAY_ON");
    rig.clock.jump(3_500);

    let handled = rig.deliver(b"RELAY_ON");
    assert_eq!(handled, Some(Handled::RelayOn { repeated: false }));
    assert_eq!(rig.relay.set_on_calls.get(), 2);
}

#[test]
fn off_resets_the_anti_repeat_window() {
    let mut rig = Rig::new();

    rig.deliver(b"RELAY_ON");
    rig.deliver(b"RELAY_OFF");
    assert!(!rig.relay.is_on());
    assert!(!rig.settings.relay_on());

    // Straight back on, well inside what would have been the window.
    let handled = rig.deliver(b"RELAY_ON");
    assert_eq!(handled, Some(Handled::RelayOn { repeated: false }));
    assert!(rig.relay.is_on());
}

#[test]
fn status_reply_reports_the_live_pin_not_a_cache() {
    let mut rig = Rig::new();

    rig.deliver(b"RELAY_ON");
    rig.transport.sent.clear();

    // Something outside the protocol drops the pin (brown-out, manual
    // intervention). The next status answer must tell the truth.
    rig.relay.on.set(false);

    let handled = rig.deliver(b"GET_STATUS");
    assert_eq!(handled, Some(Handled::StatusQuery { on: false }));
    assert_eq!(rig.transport.sent, vec![b"STATUS_OFF".to_vec()]);
}

#[test]
fn garbage_is_dropped_without_reply_or_side_effect() {
    let mut rig = Rig::new();

    let handled = rig.deliver(&[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(handled, Some(Handled::Unrecognized));
    assert!(!rig.relay.is_on());
    assert!(rig.transport.sent.is_empty(), "no ack for unrecognized frames");
    assert!(rig.transport.listening);
}

#[test]
fn transmitter_bound_tokens_are_ignored() {
    let mut rig = Rig::new();

    // Crosstalk: hearing our own ack vocabulary back.
    for frame in [b"ACK_ON".as_slice(), b"STATUS_OFF", b"ACK_OFF"] {
        let handled = rig.deliver(frame);
        assert_eq!(handled, Some(Handled::Unrecognized));
    }
    assert!(rig.transport.sent.is_empty());
}

#[test]
fn poll_without_frame_is_a_no_op() {
    let mut rig = Rig::new();
    let handled = rig.responder.poll(
        &mut rig.transport,
        &mut rig.relay,
        &mut rig.settings,
        &rig.clock,
    );
    assert_eq!(handled, None);
}

#[test]
fn relay_state_survives_a_receiver_restart() {
    let mut rig = Rig::new();
    rig.deliver(b"RELAY_ON");

    // "Reboot": reopen the settings over the same backing store.
    let store = MemStore {
        map: rig.settings.into_store().map,
    };
    let reopened = SettingsStore::open(store);
    assert!(reopened.relay_on());
}
