//! Receiver-role orchestrator.
//!
//! Restores the persisted relay state at boot, then hands every
//! received frame to the [`Responder`] and mirrors the outcome on the
//! LED and panel: green while the relay is energised, blue while idle.

use log::info;

use crate::config::ProtocolConfig;
use crate::link::{Handled, LinkTransport, Responder};

use super::ports::{Clock, IndicatorPort, RelayPort, StatusColour, StatusPanel, StoragePort};
use super::settings::SettingsStore;

pub struct ReceiverApp<T, C, S, R, I, P>
where
    T: LinkTransport,
    C: Clock,
    S: StoragePort,
    R: RelayPort,
    I: IndicatorPort,
    P: StatusPanel,
{
    responder: Responder,
    settings: SettingsStore<S>,
    transport: T,
    clock: C,
    relay: R,
    indicator: I,
    panel: P,
}

impl<T, C, S, R, I, P> ReceiverApp<T, C, S, R, I, P>
where
    T: LinkTransport,
    C: Clock,
    S: StoragePort,
    R: RelayPort,
    I: IndicatorPort,
    P: StatusPanel,
{
    pub fn new(
        cfg: ProtocolConfig,
        transport: T,
        clock: C,
        settings: SettingsStore<S>,
        relay: R,
        indicator: I,
        panel: P,
    ) -> Self {
        Self {
            responder: Responder::new(cfg),
            settings,
            transport,
            clock,
            relay,
            indicator,
            panel,
        }
    }

    /// Startup: re-apply the last committed relay state (a power cut
    /// must not silently drop the load), then start listening.
    pub fn boot(&mut self) {
        let restore = self.settings.relay_on();
        info!(
            "receiver: restoring relay {}",
            if restore { "ON" } else { "OFF" }
        );
        if restore {
            self.relay.set_on();
        } else {
            self.relay.set_off();
        }
        self.show_relay_state();
        self.transport.start_listening();
    }

    /// One main-loop iteration: handle a pending frame, if any.
    pub fn poll(&mut self) -> Option<Handled> {
        let handled = self.responder.poll(
            &mut self.transport,
            &mut self.relay,
            &mut self.settings,
            &self.clock,
        )?;

        match handled {
            Handled::RelayOn { .. } | Handled::RelayOff => self.show_relay_state(),
            Handled::StatusQuery { on } => {
                self.panel
                    .show("QUERY", if on { "reported ON" } else { "reported OFF" });
            }
            Handled::Unrecognized => {}
        }
        Some(handled)
    }

    pub fn relay_is_on(&self) -> bool {
        self.relay.is_on()
    }

    fn show_relay_state(&mut self) {
        if self.relay.is_on() {
            self.indicator.set_colour(StatusColour::Ok);
            self.panel.show("RELAY", "ON");
        } else {
            self.indicator.set_colour(StatusColour::Idle);
            self.panel.show("RELAY", "OFF");
        }
    }
}
