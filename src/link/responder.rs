//! Receiver-side command responder.
//!
//! A reactive two-state machine: **Listening** until the transport
//! reports a frame, **Handling** while the side effect runs and the
//! acknowledgement goes out, then back to Listening unconditionally —
//! the receiver must never be left deaf, whatever the payload was and
//! whether or not the reply made it onto the air.

use log::{debug, info, warn};

use crate::app::ports::{Clock, RelayPort, StoragePort};
use crate::app::settings::SettingsStore;
use crate::config::ProtocolConfig;

use super::message::LinkMessage;
use super::transport::{LinkTransport, MAX_FRAME_LEN};

/// What one responder cycle did, for the caller's LED/panel updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Relay commanded on. `repeated` marks an anti-repeat hit: the
    /// command was acknowledged but the pin and storage were untouched.
    RelayOn { repeated: bool },
    /// Relay commanded off.
    RelayOff,
    /// Status query answered with the live pin level.
    StatusQuery { on: bool },
    /// Payload did not parse; dropped.
    Unrecognized,
}

pub struct Responder {
    cfg: ProtocolConfig,
    /// Start of the anti-repeat window: the instant of the last executed
    /// relay-on command.
    last_on_ms: Option<u32>,
}

impl Responder {
    pub fn new(cfg: ProtocolConfig) -> Self {
        Self {
            cfg,
            last_on_ms: None,
        }
    }

    /// One cycle of the Listening → Handling → Listening machine.
    /// Returns `None` when no frame was pending.
    pub fn poll<S: StoragePort>(
        &mut self,
        transport: &mut impl LinkTransport,
        relay: &mut impl RelayPort,
        settings: &mut SettingsStore<S>,
        clock: &impl Clock,
    ) -> Option<Handled> {
        if !transport.data_ready() {
            return None;
        }

        let mut buf = [0u8; MAX_FRAME_LEN];
        let handled = match transport.receive(&mut buf) {
            Ok(n) => self.handle(&buf[..n], transport, relay, settings, clock),
            Err(e) => {
                debug!("responder: receive failed ({e})");
                Handled::Unrecognized
            }
        };

        // Back to Listening no matter what came in or went out.
        transport.start_listening();
        Some(handled)
    }

    fn handle<S: StoragePort>(
        &mut self,
        frame: &[u8],
        transport: &mut impl LinkTransport,
        relay: &mut impl RelayPort,
        settings: &mut SettingsStore<S>,
        clock: &impl Clock,
    ) -> Handled {
        let Some(msg) = LinkMessage::parse(frame) else {
            debug!("responder: dropping unrecognized {}-byte frame", frame.len());
            return Handled::Unrecognized;
        };

        info!("responder: received {}", msg.token());

        match msg {
            LinkMessage::RelayOn => {
                let repeated = self.within_anti_repeat(clock.now_ms());
                if repeated {
                    // Ack-but-don't-re-execute: withholding the ack would
                    // burn the peer's whole retry budget and falsely mark
                    // the link offline, while the pin is already on.
                    info!("responder: duplicate RELAY_ON inside anti-repeat window");
                } else {
                    relay.set_on();
                    if let Err(e) = settings.set_relay_on(true) {
                        warn!("responder: state persist failed ({e})");
                    }
                    self.last_on_ms = Some(clock.now_ms());
                }
                self.reply(LinkMessage::AckOn, transport, clock);
                Handled::RelayOn { repeated }
            }

            LinkMessage::RelayOff => {
                relay.set_off();
                if let Err(e) = settings.set_relay_on(false) {
                    warn!("responder: state persist failed ({e})");
                }
                self.last_on_ms = None;
                self.reply(LinkMessage::AckOff, transport, clock);
                Handled::RelayOff
            }

            LinkMessage::GetStatus => {
                // Authoritative answer: the live pin level, never a cache.
                let on = relay.is_on();
                let status = if on {
                    LinkMessage::StatusOn
                } else {
                    LinkMessage::StatusOff
                };
                self.reply(status, transport, clock);
                Handled::StatusQuery { on }
            }

            // Acks and status tokens are transmitter-bound; hearing one
            // here means crosstalk or a misconfigured peer.
            other => {
                debug!("responder: ignoring transmitter-bound {}", other.token());
                Handled::Unrecognized
            }
        }
    }

    /// Settle, then transmit the acknowledgement. A failed reply is
    /// logged and absorbed — the peer's retry will give us another shot.
    fn reply(&self, ack: LinkMessage, transport: &mut impl LinkTransport, clock: &impl Clock) {
        // Give the half-duplex peer time to switch from transmit to
        // receive before the ack hits the air.
        let start = clock.now_ms();
        while clock.now_ms().wrapping_sub(start) < self.cfg.settle_delay_ms {}

        if let Err(e) = transport.send(ack.wire()) {
            warn!("responder: {} reply failed ({e})", ack.token());
        }
    }

    fn within_anti_repeat(&self, now_ms: u32) -> bool {
        self.last_on_ms
            .is_some_and(|t| now_ms.wrapping_sub(t) < self.cfg.anti_repeat_window_ms)
    }
}
