//! Transmitter-role orchestrator.
//!
//! Owns the protocol session, the console, and the driven-side ports,
//! and maps queue events to protocol exchanges:
//!
//! | Trigger            | Command      |
//! |--------------------|--------------|
//! | short click        | `RELAY_ON`   |
//! | long click (5 s)   | `RELAY_OFF`  |
//! | double click       | `GET_STATUS` |
//! | console `on`/`off`/`status` | same three |
//!
//! The LED shows red for the whole exchange, then green on an ack or
//! back to blue on a timeout, so the user can see the link working.

use log::{debug, info};

use crate::config::ProtocolConfig;
use crate::events::Event;
use crate::link::{Command, LinkSession, LinkTransport, MAX_FRAME_LEN};

use super::console::{CommandMailbox, Console};
use super::ports::{Clock, IdleService, IndicatorPort, StatusColour, StatusPanel, StoragePort};
use super::settings::SettingsStore;

pub struct TransmitterApp<T, C, S, I, P>
where
    T: LinkTransport,
    C: Clock,
    S: StoragePort,
    I: IndicatorPort,
    P: StatusPanel,
{
    session: LinkSession,
    console: Console,
    settings: SettingsStore<S>,
    transport: T,
    clock: C,
    indicator: I,
    panel: P,
}

impl<T, C, S, I, P> TransmitterApp<T, C, S, I, P>
where
    T: LinkTransport,
    C: Clock,
    S: StoragePort,
    I: IndicatorPort,
    P: StatusPanel,
{
    pub fn new(
        cfg: ProtocolConfig,
        transport: T,
        clock: C,
        settings: SettingsStore<S>,
        indicator: I,
        panel: P,
    ) -> Self {
        Self {
            session: LinkSession::new(cfg),
            console: Console::new(),
            settings,
            transport,
            clock,
            indicator,
            panel,
        }
    }

    /// Startup: reconcile the relay belief with the receiver's actual
    /// state, then settle into listening.
    pub fn boot(&mut self, idle: &mut impl IdleService) {
        info!("transmitter: reconciling relay state");
        self.run_command(Command::GetStatus, idle);
        self.indicator.set_colour(StatusColour::Idle);
    }

    /// Believed remote relay state (advisory).
    pub fn relay_belief(&self) -> bool {
        self.session.relay_belief()
    }

    pub fn link_online(&self) -> bool {
        self.session.link_online()
    }

    /// Dispatch one queue event. `mailbox` carries console traffic;
    /// `idle` is serviced during blocking waits.
    pub fn handle_event(
        &mut self,
        event: Event,
        mailbox: &mut impl CommandMailbox,
        idle: &mut impl IdleService,
    ) {
        match event {
            Event::ButtonShortPress => {
                self.run_command(Command::RelayOn, idle);
            }
            Event::ButtonLongPress => {
                self.run_command(Command::RelayOff, idle);
            }
            Event::ButtonDoublePress => {
                self.run_command(Command::GetStatus, idle);
            }

            Event::ConsoleConnected => {
                self.console.activate(self.clock.now_ms());
            }
            Event::ConsoleDisconnected => {
                self.console.deactivate();
            }
            Event::ConsoleLine => {
                if let Some(line) = mailbox.take_line() {
                    self.handle_console_line(&line, mailbox, idle);
                }
            }

            // Unsolicited traffic: the transmitter only expects frames
            // inside an ack window. Drain so the ready flag clears.
            Event::RadioFrameReady => {
                let mut buf = [0u8; MAX_FRAME_LEN];
                if let Ok(n) = self.transport.receive(&mut buf) {
                    debug!("transmitter: dropping unsolicited {n}-byte frame");
                }
                self.transport.start_listening();
            }
        }
    }

    fn handle_console_line(
        &mut self,
        line: &str,
        mailbox: &mut impl CommandMailbox,
        idle: &mut impl IdleService,
    ) {
        let now = self.clock.now_ms();
        let Some(cmd) = self.console.process(line, now, &mut self.settings, mailbox) else {
            return;
        };

        if self.session.is_busy() {
            mailbox.reply("BUSY");
            return;
        }

        let ok = self.run_command(cmd, idle);
        let reply = match (cmd, ok) {
            (Command::GetStatus, true) => {
                if self.session.relay_belief() {
                    "STATUS: ON"
                } else {
                    "STATUS: OFF"
                }
            }
            (Command::RelayOn, true) => "RELAY ON OK",
            (Command::RelayOff, true) => "RELAY OFF OK",
            (_, false) => "NO LINK",
        };
        mailbox.reply(reply);
    }

    /// One full exchange with LED/panel/haptic side effects.
    fn run_command(&mut self, cmd: Command, idle: &mut impl IdleService) -> bool {
        let token = cmd.message().token();
        self.indicator.set_colour(StatusColour::Busy);
        self.panel.show("SENDING", token);

        match self
            .session
            .request(cmd, &mut self.transport, &self.clock, idle)
        {
            Ok(true) => {
                self.indicator.set_colour(StatusColour::Ok);
                self.indicator.haptic_pulse();
                let state = if self.session.relay_belief() { "ON" } else { "OFF" };
                self.panel.show("LINK OK", state);
                true
            }
            Ok(false) => {
                self.indicator.set_colour(StatusColour::Idle);
                self.panel.show("NO LINK", token);
                false
            }
            Err(e) => {
                self.indicator.set_colour(StatusColour::Busy);
                self.panel.show("RADIO FAIL", token);
                log::warn!("transmitter: {token} not transmitted ({e})");
                false
            }
        }
    }
}
