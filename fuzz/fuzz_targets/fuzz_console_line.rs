//! Fuzz target: BLE console line handling
//!
//! Drives arbitrary (lossily decoded) text lines through an activated
//! `Console` backed by in-memory settings.
//!
//! Invariants checked:
//! - No panics under any input line
//! - The console only authenticates on a byte-exact `pass <secret>`
//! - Relay commands never come out of an unauthenticated console;
//!   the ungated status query is the only permitted leak
//!
//! cargo fuzz run fuzz_console_line

#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use relaylink::app::console::{CommandMailbox, Console, MAX_LINE_LEN};
use relaylink::app::ports::{StorageError, StoragePort};
use relaylink::app::settings::SettingsStore;
use relaylink::config::DEFAULT_PASSPHRASE;
use relaylink::link::Command;

// ── In-memory doubles ─────────────────────────────────────────

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

#[derive(Default)]
struct SinkMailbox;

impl CommandMailbox for SinkMailbox {
    fn take_line(&mut self) -> Option<heapless::String<MAX_LINE_LEN>> {
        None
    }

    fn reply(&mut self, _text: &str) {}
}

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);

    let mut console = Console::new();
    console.activate(0);
    let mut settings = SettingsStore::open(MemStore::default());
    let mut mailbox = SinkMailbox;

    let cmd = console.process(&line, 1, &mut settings, &mut mailbox);

    let mut words = line.split_whitespace();
    let is_real_login = words.next() == Some("pass") && words.next() == Some(DEFAULT_PASSPHRASE);

    assert_eq!(
        console.is_authenticated(),
        is_real_login,
        "only the exact passphrase may authenticate"
    );
    if let Some(c) = cmd {
        assert_eq!(c, Command::GetStatus, "relay control must stay gated");
    }
});
