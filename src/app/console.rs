//! Passphrase-gated text console for the phone link.
//!
//! The BLE channel is a plain mailbox of ASCII lines (`pass <secret>`,
//! `setpass <old> <new>`, `on`, `off`, `status`, `?`). The console owns
//! the in-memory authentication flag — reset on every channel
//! (re)activation, expired a fixed time after activation (not after the
//! last command) — and translates accepted relay commands into the same
//! [`Command`](crate::link::Command)s the button produces. Auth attempts
//! are token-bucket limited to slow down passphrase guessing.

use burster::Limiter;
use core::time::Duration;
use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::app::settings::SettingsStore;
use crate::link::Command;

/// Session lifetime measured from channel activation.
pub const SESSION_TTL_MS: u32 = 10 * 60 * 1000;

/// Longest accepted command line.
pub const MAX_LINE_LEN: usize = 64;

const LOGIN_PROMPT: &str = "LOGIN: pass <secret>";

// ───────────────────────────────────────────────────────────────
// Mailbox contract (BLE adapter on hardware, vec mailbox in tests)
// ───────────────────────────────────────────────────────────────

/// Line-oriented command mailbox: the channel buffers one command until
/// the main loop collects it, and carries replies back to the phone.
pub trait CommandMailbox {
    /// Take the pending command line, clearing the mailbox.
    fn take_line(&mut self) -> Option<heapless::String<MAX_LINE_LEN>>;

    /// Send a reply line to the peer. Best effort.
    fn reply(&mut self, text: &str);
}

// ───────────────────────────────────────────────────────────────
// Console
// ───────────────────────────────────────────────────────────────

pub struct Console {
    authenticated: bool,
    /// Set while the channel is active; session TTL counts from here.
    activated_at_ms: Option<u32>,
    auth_limiter: burster::TokenBucket<fn() -> Duration>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            authenticated: false,
            activated_at_ms: None,
            // 5 guesses, refilled one per second.
            auth_limiter: burster::TokenBucket::new_with_time_provider(
                1,
                5,
                platform_now as fn() -> Duration,
            ),
        }
    }

    /// Channel came up (BLE advertising started or a client reconnected).
    /// Any previous authentication is void.
    pub fn activate(&mut self, now_ms: u32) {
        self.authenticated = false;
        self.activated_at_ms = Some(now_ms);
        info!("console: channel activated, login required");
    }

    /// Channel went down.
    pub fn deactivate(&mut self) {
        self.authenticated = false;
        self.activated_at_ms = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Handle one command line. Replies go to `mailbox`; an accepted
    /// relay command is returned for the caller to run through the
    /// protocol engine (and answer `TX OK` / `TX FAIL` itself).
    pub fn process<S: StoragePort>(
        &mut self,
        line: &str,
        now_ms: u32,
        settings: &mut SettingsStore<S>,
        mailbox: &mut impl CommandMailbox,
    ) -> Option<Command> {
        self.expire_if_due(now_ms);

        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or("");

        match verb {
            "pass" => {
                self.try_login(words.next().unwrap_or(""), settings, mailbox);
                None
            }

            "setpass" => {
                if !self.require_auth(mailbox) {
                    return None;
                }
                let old = words.next().unwrap_or("");
                let new = words.next().unwrap_or("");
                if old != settings.passphrase() {
                    mailbox.reply("WRONG PASS");
                    return None;
                }
                match settings.set_passphrase(new) {
                    Ok(()) => mailbox.reply("PASS CHANGED"),
                    Err(e) => {
                        warn!("console: passphrase change failed ({e})");
                        mailbox.reply("PASS NOT SAVED");
                    }
                }
                None
            }

            "on" => self.require_auth(mailbox).then_some(Command::RelayOn),
            "off" => self.require_auth(mailbox).then_some(Command::RelayOff),

            // Status is a read-only query; no login needed.
            "status" | "?" => Some(Command::GetStatus),

            "" => None,

            other => {
                info!("console: unknown command '{other}'");
                mailbox.reply("UNKNOWN CMD");
                None
            }
        }
    }

    fn try_login<S: StoragePort>(
        &mut self,
        secret: &str,
        settings: &SettingsStore<S>,
        mailbox: &mut impl CommandMailbox,
    ) {
        if self.auth_limiter.try_consume(1).is_err() {
            warn!("console: auth rate limit hit");
            mailbox.reply("TOO MANY ATTEMPTS");
            return;
        }

        if secret == settings.passphrase() {
            self.authenticated = true;
            mailbox.reply("PASS OK");
            info!("console: session authenticated");
        } else {
            self.authenticated = false;
            mailbox.reply("WRONG PASS");
            warn!("console: wrong passphrase");
        }
    }

    fn require_auth(&self, mailbox: &mut impl CommandMailbox) -> bool {
        if self.authenticated {
            return true;
        }
        mailbox.reply(LOGIN_PROMPT);
        false
    }

    fn expire_if_due(&mut self, now_ms: u32) {
        if !self.authenticated {
            return;
        }
        let expired = self
            .activated_at_ms
            .is_some_and(|t| now_ms.wrapping_sub(t) >= SESSION_TTL_MS);
        if expired {
            self.authenticated = false;
            info!("console: session expired");
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

// ── Platform time for the rate limiter ───────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ── Tests ────────────────────────────────────────────────────
