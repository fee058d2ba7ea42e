//! End-to-end exchange tests over the in-memory loopback medium.
//!
//! Both protocol halves run against real [`LoopbackTransport`] endpoints:
//! the transmitter's [`LinkSession`] blocks in its ack wait while the
//! idle hook pumps the receiver's [`Responder`], the same way the two
//! boards interleave over the air.

#![cfg(not(target_os = "espidf"))]

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use relaylink::app::ports::{Clock, IdleFn, NoIdle, RelayPort, StorageError, StoragePort};
use relaylink::app::settings::SettingsStore;
use relaylink::config::ProtocolConfig;
use relaylink::link::{Command, LinkSession, LinkTransport, LoopbackTransport, Responder};

// ── Test doubles ─────────────────────────────────────────────

struct TickingClock {
    now: Cell<u32>,
}

impl TickingClock {
    fn new() -> Self {
        Self { now: Cell::new(0) }
    }
}

impl Clock for TickingClock {
    fn now_ms(&self) -> u32 {
        let t = self.now.get();
        self.now.set(t.wrapping_add(1));
        t
    }
}

#[derive(Clone)]
struct SharedRelay {
    on: Rc<Cell<bool>>,
}

impl SharedRelay {
    fn new() -> Self {
        Self {
            on: Rc::new(Cell::new(false)),
        }
    }
}

impl RelayPort for SharedRelay {
    fn set_on(&mut self) {
        self.on.set(true);
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

/// Wire a transmitter session to a live receiver stack over loopback.
/// Returns the session, its transport/clock, and a handle on the
/// receiver's relay pin; `pump` is the idle hook that runs the receiver.
fn rig() -> (
    LinkSession,
    LoopbackTransport,
    TickingClock,
    SharedRelay,
    impl FnMut(u32),
) {
    let (tx_radio, mut rx_radio) = LoopbackTransport::pair();
    rx_radio.start_listening();

    let session = LinkSession::new(ProtocolConfig::default());
    let tx_clock = TickingClock::new();

    let mut responder = Responder::new(ProtocolConfig::default());
    let relay = SharedRelay::new();
    let relay_handle = relay.clone();
    let rx_clock = TickingClock::new();
    let mut rx_relay = relay;
    let mut rx_settings = SettingsStore::open(MemStore::default());

    let pump = move |_now: u32| {
        responder.poll(&mut rx_radio, &mut rx_relay, &mut rx_settings, &rx_clock);
    };

    (session, tx_radio, tx_clock, relay_handle, pump)
}

// ── Tests ────────────────────────────────────────────────────

#[test]
fn relay_on_round_trip_actuates_and_confirms() {
    let (mut session, mut radio, clock, relay, pump) = rig();
    let mut idle = IdleFn(pump);

    let ok = session
        .request(Command::RelayOn, &mut radio, &clock, &mut idle)
        .unwrap();

    assert!(ok, "ack must arrive inside the first window");
    assert!(relay.is_on(), "receiver pin must be energised");
    assert!(session.relay_belief());
    assert!(session.link_online());
}

#[test]
fn full_on_off_cycle_keeps_both_sides_agreed() {
    let (mut session, mut radio, clock, relay, pump) = rig();
    let mut idle = IdleFn(pump);

    assert!(session
        .request(Command::RelayOn, &mut radio, &clock, &mut idle)
        .unwrap());
    assert!(relay.is_on());

    assert!(session
        .request(Command::RelayOff, &mut radio, &clock, &mut idle)
        .unwrap());
    assert!(!relay.is_on());
    assert!(!session.relay_belief());
    assert!(session.link_online());
}

#[test]
fn status_query_reconciles_a_stale_belief() {
    let (mut session, mut radio, clock, relay, pump) = rig();
    let mut idle = IdleFn(pump);

    // The receiver's pin is on (restored from flash after its own
    // reboot, say) while this side still believes off.
    relay.on.set(true);
    assert!(!session.relay_belief());

    let ok = session
        .request(Command::GetStatus, &mut radio, &clock, &mut idle)
        .unwrap();

    assert!(ok);
    assert!(session.relay_belief(), "belief must follow the live report");
}

#[test]
fn dead_receiver_times_out_and_marks_link_offline() {
    let (mut session, mut radio, clock, _relay, _pump) = rig();

    // Nobody pumps the receiver: all three attempts go unanswered.
    let ok = session
        .request(Command::RelayOn, &mut radio, &clock, &mut NoIdle)
        .unwrap();

    assert!(!ok);
    assert!(!session.link_online());
    assert!(!session.relay_belief(), "belief untouched by a failed exchange");
}

#[test]
fn link_recovers_on_the_next_exchange() {
    let (mut session, mut radio, clock, relay, pump) = rig();

    let ok = session
        .request(Command::RelayOn, &mut radio, &clock, &mut NoIdle)
        .unwrap();
    assert!(!ok);
    assert!(!session.link_online());

    // Receiver comes back; the very next exchange succeeds.
    let mut idle = IdleFn(pump);
    let ok = session
        .request(Command::RelayOn, &mut radio, &clock, &mut idle)
        .unwrap();
    assert!(ok);
    assert!(session.link_online());
    assert!(relay.is_on());
}
