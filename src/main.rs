//! RelayLink firmware entry point.
//!
//! One binary, two roles selected at build time, mirroring the two
//! boards in the field:
//!
//! - **transmitter** — handheld remote: button gestures and the BLE
//!   console drive protocol exchanges.
//! - **receiver** — fixed node: listens, actuates the relay,
//!   acknowledges.
//!
//! Both roles share the bring-up: logger, GPIO, NVS, radio. A radio
//! that will not initialise is fatal — the node signals it with an
//! endless red blink and waits for a power cycle.

#![deny(unused_must_use)]

#[cfg(all(feature = "transmitter", feature = "receiver"))]
compile_error!("features 'transmitter' and 'receiver' are mutually exclusive");

#[cfg(all(target_os = "espidf", not(any(feature = "transmitter", feature = "receiver"))))]
compile_error!("select a role: build with feature 'transmitter' or 'receiver'");

#[cfg(target_os = "espidf")]
mod firmware {
    use anyhow::Result;
    use esp_idf_hal::delay::{Delay, FreeRtos};
    use esp_idf_hal::gpio::PinDriver;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::prelude::*;
    use esp_idf_hal::rmt::config::TransmitConfig;
    use esp_idf_hal::rmt::TxRmtDriver;
    use esp_idf_hal::spi::{config as spi_config, SpiDeviceDriver, SpiDriverConfig};
    use log::{error, info};

    use relaylink::adapters::nvs::NvsAdapter;
    use relaylink::adapters::panel::LogPanel;
    use relaylink::adapters::sx126x::Sx126x;
    use relaylink::adapters::time::MonotonicClock;
    use relaylink::app::settings::SettingsStore;
    use relaylink::config::{ProtocolConfig, RadioProfile};
    use relaylink::drivers::hw_init;
    use relaylink::drivers::status_led::StatusLed;

    pub fn run() -> Result<()> {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;

        info!(
            "RelayLink v{} ({})",
            env!("CARGO_PKG_VERSION"),
            if cfg!(feature = "transmitter") {
                "transmitter"
            } else {
                "receiver"
            }
        );

        if let Err(e) = hw_init::init_gpio() {
            // Without working GPIO there is nothing left to signal with.
            error!("GPIO init failed: {e} — halting");
            #[allow(clippy::empty_loop)]
            loop {}
        }
        if let Err(e) = hw_init::init_isr_service() {
            error!("ISR service init failed: {e} — halting");
            #[allow(clippy::empty_loop)]
            loop {}
        }

        let p = Peripherals::take()?;

        // Status LED first: it is the failure annunciator for everything
        // after this point.
        let rmt_tx = TxRmtDriver::new(
            p.rmt.channel0,
            p.pins.gpio21,
            &TransmitConfig::new().clock_divider(1),
        )?;
        let mut led = StatusLed::new(rmt_tx);

        let nvs = match NvsAdapter::new() {
            Ok(n) => n,
            Err(e) => {
                error!("NVS init failed ({e}) — halting");
                fatal_blink(&mut led);
            }
        };
        let settings = SettingsStore::open(nvs);

        // Radio: SPI2 at 8 MHz, mode 0, plus the SX1268 control pins.
        let spi = SpiDeviceDriver::new_single(
            p.spi2,
            p.pins.gpio7,        // SCK
            p.pins.gpio8,        // MOSI
            Some(p.pins.gpio9),  // MISO
            Some(p.pins.gpio13), // NSS
            &SpiDriverConfig::new(),
            &spi_config::Config::new()
                .baudrate(8.MHz().into())
                .data_mode(spi_config::MODE_0),
        )?;
        let reset = PinDriver::output(p.pins.gpio12)?;
        let busy = PinDriver::input(p.pins.gpio11)?;
        let tx_en = PinDriver::output(p.pins.gpio2)?;
        let rx_en = PinDriver::output(p.pins.gpio1)?;

        let radio = match Sx126x::init(
            spi,
            reset,
            busy,
            tx_en,
            rx_en,
            Delay::new_default(),
            RadioProfile::default(),
        ) {
            Ok(r) => r,
            Err(e) => {
                error!("radio init failed ({e}) — node is dead, signalling");
                fatal_blink(&mut led);
            }
        };

        let cfg = ProtocolConfig::default();
        let clock = MonotonicClock::new();
        let panel = LogPanel::new();

        #[cfg(feature = "transmitter")]
        run_transmitter(cfg, radio, clock, settings, led, panel);

        #[cfg(feature = "receiver")]
        run_receiver(cfg, radio, clock, settings, led, panel);
    }

    /// Endless red blink: the unmistakable "radio is dead" signal.
    /// Never returns; the user power-cycles or reflashes.
    fn fatal_blink(led: &mut StatusLed) -> ! {
        use relaylink::app::ports::StatusColour;
        loop {
            led.set(StatusColour::Busy);
            FreeRtos::delay_ms(250);
            led.set(StatusColour::Black);
            FreeRtos::delay_ms(250);
        }
    }

    #[cfg(feature = "transmitter")]
    fn run_transmitter(
        cfg: ProtocolConfig,
        radio: impl relaylink::link::LinkTransport,
        clock: MonotonicClock,
        settings: SettingsStore<NvsAdapter>,
        led: StatusLed,
        panel: LogPanel,
    ) -> ! {
        use relaylink::adapters::ble::BleConsole;
        use relaylink::adapters::indicator::LedIndicator;
        use relaylink::app::ports::IdleFn;
        use relaylink::app::transmitter::TransmitterApp;
        use relaylink::drivers::button::{Button, ButtonGesture};
        use relaylink::drivers::haptics::Vibro;
        use relaylink::events::{drain_events, push_event, Event};
        use relaylink::pins;

        let indicator = LedIndicator::new(led, Some(Vibro::new()));
        let loop_clock = MonotonicClock::new();
        let mut button = Button::new(|| !hw_init::gpio_read(pins::BUTTON_GPIO));
        let mut ble = BleConsole::new();
        ble.start();

        let mut app = TransmitterApp::new(cfg, radio, clock, settings, indicator, panel);

        // Gestures completing while an exchange blocks are serviced (so
        // the classifier stays sane) but deliberately dropped — one
        // in-flight exchange at a time.
        app.boot(&mut IdleFn(|now: u32| {
            if button.tick(now).is_some() {
                info!("button: gesture ignored, exchange in flight");
            }
        }));

        info!("transmitter: ready");
        loop {
            let now = loop_clock.now_ms();
            if let Some(gesture) = button.tick(now) {
                push_event(match gesture {
                    ButtonGesture::ShortClick => Event::ButtonShortPress,
                    ButtonGesture::LongClick => Event::ButtonLongPress,
                    ButtonGesture::DoubleClick => Event::ButtonDoublePress,
                });
            }

            drain_events(|event| {
                app.handle_event(
                    event,
                    &mut ble,
                    &mut IdleFn(|now: u32| {
                        if button.tick(now).is_some() {
                            info!("button: gesture ignored, exchange in flight");
                        }
                    }),
                );
            });

            FreeRtos::delay_ms(10);
        }
    }

    #[cfg(feature = "receiver")]
    fn run_receiver(
        cfg: ProtocolConfig,
        radio: impl relaylink::link::LinkTransport,
        clock: MonotonicClock,
        settings: SettingsStore<NvsAdapter>,
        led: StatusLed,
        panel: LogPanel,
    ) -> ! {
        use relaylink::adapters::indicator::LedIndicator;
        use relaylink::app::receiver::ReceiverApp;
        use relaylink::drivers::relay::RelayDriver;

        let indicator = LedIndicator::new(led, None);
        let relay = RelayDriver::new();

        let mut app = ReceiverApp::new(cfg, radio, clock, settings, relay, indicator, panel);
        app.boot();

        info!("receiver: ready");
        loop {
            // The DIO1 latch is checked directly; the queued event is
            // only the wake-up.
            while relaylink::events::pop_event().is_some() {}
            while app.poll().is_some() {}
            FreeRtos::delay_ms(5);
        }
    }
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("this binary targets ESP-IDF; build with the espidf feature for the board");
}
