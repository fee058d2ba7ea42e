//! Typed settings access over the raw [`StoragePort`].
//!
//! One postcard blob holds the whole [`Settings`] struct; the store
//! keeps a cached copy so reads never touch flash and writes re-persist
//! the blob atomically.

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::{Settings, MAX_PASSPHRASE_LEN};

const NAMESPACE: &str = "relaylink";
const KEY: &str = "settings";

/// Upper bound for the serialized settings blob.
const MAX_BLOB: usize = 64;

pub struct SettingsStore<S: StoragePort> {
    store: S,
    cached: Settings,
}

impl<S: StoragePort> SettingsStore<S> {
    /// Load settings from storage, falling back to defaults on a missing
    /// or corrupted blob (first boot, or flash wear).
    pub fn open(store: S) -> Self {
        let cached = Self::load_from(&store);
        Self { store, cached }
    }

    fn load_from(store: &S) -> Settings {
        let mut buf = [0u8; MAX_BLOB];
        match store.read(NAMESPACE, KEY, &mut buf) {
            Ok(n) => match postcard::from_bytes::<Settings>(&buf[..n]) {
                Ok(settings) => {
                    info!("settings: loaded (relay_on={})", settings.relay_on);
                    settings
                }
                Err(_) => {
                    warn!("settings: stored blob corrupted, using defaults");
                    Settings::default()
                }
            },
            Err(StorageError::NotFound) => {
                info!("settings: first boot, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!("settings: load failed ({e}), using defaults");
                Settings::default()
            }
        }
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let blob = postcard::to_allocvec(&self.cached).map_err(|_| StorageError::IoError)?;
        self.store.write(NAMESPACE, KEY, &blob)
    }

    /// Last committed relay state (boot-restore hint).
    pub fn relay_on(&self) -> bool {
        self.cached.relay_on
    }

    /// Persist a relay transition. Best-effort at call sites: actuation
    /// must not fail because flash is tired.
    pub fn set_relay_on(&mut self, on: bool) -> Result<(), StorageError> {
        self.cached.relay_on = on;
        self.persist()
    }

    /// Current console passphrase.
    pub fn passphrase(&self) -> &str {
        self.cached.passphrase.as_str()
    }

    /// Hand back the underlying storage (restart simulation in tests).
    pub fn into_store(self) -> S {
        self.store
    }

    /// Replace the console passphrase.
    pub fn set_passphrase(&mut self, new: &str) -> Result<(), StorageError> {
        if new.is_empty() || new.len() > MAX_PASSPHRASE_LEN {
            return Err(StorageError::IoError);
        }
        let mut p = heapless::String::new();
        p.push_str(new).map_err(|()| StorageError::IoError)?;
        self.cached.passphrase = p;
        self.persist()
    }
}
