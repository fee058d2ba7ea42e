//! Transmitter-side command protocol engine.
//!
//! One [`LinkSession`] owns everything the old firmware kept in globals:
//! the busy mutual-exclusion flag, the believed relay state, and the
//! link-online flag. An exchange is send → listen → bounded ack wait,
//! repeated up to the configured attempt count, with the idle services
//! ticked on every poll iteration so gesture detection never starves.

use log::{debug, info, warn};

use crate::app::ports::{Clock, IdleService};
use crate::config::ProtocolConfig;

use super::message::{Command, LinkMessage};
use super::transport::{LinkTransport, SendError, MAX_FRAME_LEN};

/// Transmitter-side link state and exchange engine.
pub struct LinkSession {
    cfg: ProtocolConfig,
    /// True for the entire duration of one exchange. New trigger events
    /// arriving while set are rejected without transmitting.
    busy: bool,
    /// What this node believes the remote relay state is. Advisory, not
    /// authoritative — reconcile with [`Command::GetStatus`] on boot or
    /// suspected divergence.
    relay_belief: bool,
    /// True iff the most recent exchange got any valid acknowledgement
    /// before its timeout. Drives UI only, never safety logic.
    link_online: bool,
}

impl LinkSession {
    pub fn new(cfg: ProtocolConfig) -> Self {
        Self {
            cfg,
            busy: false,
            relay_belief: false,
            link_online: false,
        }
    }

    /// Whether an exchange is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Believed remote relay state.
    pub fn relay_belief(&self) -> bool {
        self.relay_belief
    }

    /// Whether the receiver answered the last exchange.
    pub fn link_online(&self) -> bool {
        self.link_online
    }

    /// Run one full exchange for `cmd`.
    ///
    /// Returns `Ok(true)` when a matching acknowledgement arrived inside
    /// the retry budget, `Ok(false)` on rejection (busy) or timeout, and
    /// `Err` only when every attempt already failed at transmit — a
    /// timeout is a reported boolean, not an error.
    ///
    /// Post-condition regardless of outcome: the transport is listening
    /// and the busy flag is clear.
    pub fn request(
        &mut self,
        cmd: Command,
        transport: &mut impl LinkTransport,
        clock: &impl Clock,
        idle: &mut impl IdleService,
    ) -> Result<bool, SendError> {
        if self.busy {
            warn!("link: {} rejected, exchange in flight", cmd.message().token());
            return Ok(false);
        }

        self.busy = true;
        let result = self.run_exchange(cmd, transport, clock, idle);

        // The receiver must find us ready for future traffic no matter
        // how the exchange ended.
        transport.start_listening();
        self.busy = false;
        result
    }

    fn run_exchange(
        &mut self,
        cmd: Command,
        transport: &mut impl LinkTransport,
        clock: &impl Clock,
        idle: &mut impl IdleService,
    ) -> Result<bool, SendError> {
        let token = cmd.message().token();
        let mut last_send_err = None;
        let mut any_sent = false;

        for attempt in 1..=self.cfg.attempts {
            info!("link: {} attempt {}/{}", token, attempt, self.cfg.attempts);

            match transport.send(cmd.message().wire()) {
                Ok(()) => {
                    any_sent = true;
                    // Half-duplex: the chip cannot listen while it
                    // transmits, so arm the receiver only now.
                    transport.start_listening();

                    if let Some(ack) = self.wait_for_ack(cmd, transport, clock, idle) {
                        self.apply_ack(cmd, ack);
                        info!("link: {} confirmed by {}", token, ack.token());
                        return Ok(true);
                    }
                }
                Err(e) => {
                    // Aborts this attempt only; the retry budget stands.
                    warn!("link: {} transmit failed ({e})", token);
                    last_send_err = Some(e);
                }
            }

            if attempt < self.cfg.attempts {
                self.pause(clock, idle, self.cfg.retry_pause_ms);
            }
        }

        self.link_online = false;
        warn!("link: {} — no response after {} attempts", token, self.cfg.attempts);

        match last_send_err {
            Some(e) if !any_sent => Err(e),
            _ => Ok(false),
        }
    }

    /// Poll for a matching acknowledgement within the ack window.
    fn wait_for_ack(
        &mut self,
        cmd: Command,
        transport: &mut impl LinkTransport,
        clock: &impl Clock,
        idle: &mut impl IdleService,
    ) -> Option<LinkMessage> {
        let start = clock.now_ms();

        loop {
            let now = clock.now_ms();
            if now.wrapping_sub(start) >= self.cfg.ack_window_ms {
                return None;
            }

            idle.service(now);

            if !transport.data_ready() {
                continue;
            }

            let mut buf = [0u8; MAX_FRAME_LEN];
            let frame = match transport.receive(&mut buf) {
                Ok(n) => &buf[..n],
                Err(e) => {
                    debug!("link: receive failed mid-wait ({e})");
                    continue;
                }
            };

            match LinkMessage::parse(frame) {
                Some(msg) if msg.acknowledges(cmd) => return Some(msg),
                Some(msg) => debug!("link: ignoring non-matching {}", msg.token()),
                None => debug!("link: dropping unrecognized {}-byte frame", frame.len()),
            }
        }
    }

    /// Fold a successful acknowledgement into the session state.
    fn apply_ack(&mut self, cmd: Command, ack: LinkMessage) {
        self.link_online = true;
        match cmd.requested_state() {
            Some(state) => self.relay_belief = state,
            // Status query: reconcile belief from the receiver's report.
            None => {
                if let Some(live) = ack.relay_level() {
                    self.relay_belief = live;
                }
            }
        }
    }

    /// Inter-attempt pause, still servicing idle collaborators.
    fn pause(&self, clock: &impl Clock, idle: &mut impl IdleService, duration_ms: u32) {
        let start = clock.now_ms();
        loop {
            let now = clock.now_ms();
            if now.wrapping_sub(start) >= duration_ms {
                return;
            }
            idle.service(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{IdleFn, NoIdle};
    use crate::link::transport::ReceiveError;
    use std::cell::Cell;

    /// Millisecond clock that advances a fixed step per query so poll
    /// loops terminate deterministically.
    struct SteppingClock {
        now: Cell<u32>,
        step: u32,
    }

    impl SteppingClock {
        fn new(step: u32) -> Self {
            Self {
                now: Cell::new(0),
                step,
            }
        }
    }

    impl Clock for SteppingClock {
        fn now_ms(&self) -> u32 {
            let t = self.now.get();
            self.now.set(t.wrapping_add(self.step));
            t
        }
    }

    /// Scripted transport: records sends, replies from a queue.
    #[derive(Default)]
    struct ScriptedTransport {
        sent: Vec<Vec<u8>>,
        replies: std::collections::VecDeque<Vec<u8>>,
        listening: bool,
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
            self.listening && !self.replies.is_empty()
        }

        fn receive(&mut self, buf: &mut [u8]) -> Result<usize, ReceiveError> {
            let frame = self.replies.pop_front().ok_or(ReceiveError::Empty)?;
            let n = frame.len().min(buf.len());
            buf[..n].copy_from_slice(&frame[..n]);
            Ok(n)
        }
    }

    fn session() -> LinkSession {
        LinkSession::new(ProtocolConfig::default())
    }

    #[test]
    fn ack_within_window_reports_success() {
        let mut s = session();
        let mut t = ScriptedTransport::default();
        t.replies.push_back(b"ACK_ON".to_vec());
        let clock = SteppingClock::new(1);

        let ok = s.request(Command::RelayOn, &mut t, &clock, &mut NoIdle).unwrap();
        assert!(ok);
        assert!(s.relay_belief());
        assert!(s.link_online());
        assert!(!s.is_busy());
        assert!(t.listening);
        assert_eq!(t.sent.len(), 1);
    }

    #[test]
    fn silence_exhausts_all_attempts() {
        let mut s = session();
        let mut t = ScriptedTransport::default();
        let clock = SteppingClock::new(10);

        let ok = s.request(Command::RelayOff, &mut t, &clock, &mut NoIdle).unwrap();
        assert!(!ok);
        assert_eq!(t.sent.len(), 3);
        assert!(!s.link_online());
        // Belief untouched by a failed exchange.
        assert!(!s.relay_belief());
        assert!(!s.is_busy());
        assert!(t.listening);
    }

    #[test]
    fn busy_session_rejects_without_transmitting() {
        let mut s = session();
        s.busy = true;
        let mut t = ScriptedTransport::default();
        let clock = SteppingClock::new(1);

        let ok = s.request(Command::RelayOn, &mut t, &clock, &mut NoIdle).unwrap();
        assert!(!ok);
        assert!(t.sent.is_empty());
    }

    #[test]
    fn mismatched_ack_is_ignored_until_timeout() {
        let mut s = session();
        let mut t = ScriptedTransport::default();
        // Wrong family: OFF ack for an ON command, three times over.
        for _ in 0..3 {
            t.replies.push_back(b"ACK_OFF".to_vec());
        }
        let clock = SteppingClock::new(5);

        let ok = s.request(Command::RelayOn, &mut t, &clock, &mut NoIdle).unwrap();
        assert!(!ok);
        assert!(!s.relay_belief());
    }

    #[test]
    fn status_query_reconciles_belief() {
        let mut s = session();
        s.relay_belief = true; // stale belief after receiver power-cycle
        let mut t = ScriptedTransport::default();
        t.replies.push_back(b"STATUS_OFF".to_vec());
        let clock = SteppingClock::new(1);

        let ok = s.request(Command::GetStatus, &mut t, &clock, &mut NoIdle).unwrap();
        assert!(ok);
        assert!(!s.relay_belief());
        assert!(s.link_online());
    }

    #[test]
    fn idle_service_runs_during_wait() {
        let mut s = session();
        let mut t = ScriptedTransport::default();
        let clock = SteppingClock::new(1);
        let mut ticks = 0u32;

        let mut counter = IdleFn(|_now: u32| ticks += 1);
        let ok = s.request(Command::RelayOn, &mut t, &clock, &mut counter).unwrap();
        assert!(!ok);
        assert!(ticks > 100, "idle hook must be serviced every poll iteration");
    }

    #[test]
    fn garbage_frames_never_abort_the_wait() {
        let mut s = session();
        let mut t = ScriptedTransport::default();
        t.replies.push_back(vec![0xFF, 0x13, 0x37]);
        t.replies.push_back(b"ACK_ON".to_vec());
        let clock = SteppingClock::new(1);

        let ok = s.request(Command::RelayOn, &mut t, &clock, &mut NoIdle).unwrap();
        assert!(ok);
    }
}
