//! SX1268 radio transport.
//!
//! Command-level driver for the Semtech SX126x family, generic over the
//! `embedded-hal` 1.0 SPI and GPIO traits so the wiring is supplied by
//! the board code and the logic is target-independent. Implements
//! [`LinkTransport`] for the link core.
//!
//! The E22-400M30S module routes TX through an external RF switch, so
//! every mode change also steers the TXEN/RXEN pair. DIO1 is the only
//! interrupt line: it fires on TxDone, RxDone, and timeout, and the ISR
//! latches a flag the main loop consumes through `data_ready()`.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{Operation, SpiDevice};
use log::{debug, info, warn};

use crate::config::RadioProfile;
use crate::error::{Error, Result};
use crate::link::{LinkTransport, ReceiveError, SendError, MAX_FRAME_LEN};

// ── Opcodes ──────────────────────────────────────────────────

const OP_SET_STANDBY: u8 = 0x80;
const OP_SET_TX: u8 = 0x83;
const OP_SET_RX: u8 = 0x82;
const OP_SET_PACKET_TYPE: u8 = 0x8A;
const OP_SET_RF_FREQUENCY: u8 = 0x86;
const OP_SET_PA_CONFIG: u8 = 0x95;
const OP_SET_TX_PARAMS: u8 = 0x8E;
const OP_SET_BUFFER_BASE: u8 = 0x8F;
const OP_SET_MODULATION_PARAMS: u8 = 0x8B;
const OP_SET_PACKET_PARAMS: u8 = 0x8C;
const OP_SET_DIO_IRQ_PARAMS: u8 = 0x08;
const OP_WRITE_REGISTER: u8 = 0x0D;
const OP_WRITE_BUFFER: u8 = 0x0E;
const OP_READ_BUFFER: u8 = 0x1E;
const OP_GET_IRQ_STATUS: u8 = 0x12;
const OP_CLEAR_IRQ_STATUS: u8 = 0x02;
const OP_GET_RX_BUFFER_STATUS: u8 = 0x13;

const PACKET_TYPE_LORA: u8 = 0x01;
const STANDBY_RC: u8 = 0x00;

const REG_LORA_SYNC_WORD: u16 = 0x0740;
const REG_OCP: u16 = 0x08E7;

// IRQ bits.
const IRQ_TX_DONE: u16 = 0x0001;
const IRQ_RX_DONE: u16 = 0x0002;
const IRQ_CRC_ERR: u16 = 0x0040;
const IRQ_TIMEOUT: u16 = 0x0200;
const IRQ_ALL: u16 = 0x03FF;

/// SetTx timeout, in 15.625 µs steps. 0x7D00 = 500 ms — generous; a
/// 10-byte frame at SF9/125 kHz is on the air for well under 200 ms.
const TX_TIMEOUT_STEPS: u32 = 0x7D00;

/// Transmit-complete poll budget (1 ms per step).
const TX_POLL_BUDGET_MS: u32 = 600;

/// BUSY-line settle budget (10 µs per step).
const BUSY_POLL_BUDGET: u32 = 10_000;

/// DIO1 rising-edge latch. Written by the ISR, consumed by the main
/// loop; `data_ready()` takes `&self` so a pin read cannot back it.
static RADIO_IRQ: AtomicBool = AtomicBool::new(false);

/// Register on the DIO1 rising edge. Lock-free; ISR-safe.
pub fn radio_irq_handler() {
    RADIO_IRQ.store(true, Ordering::Release);
}

/// Internal bus-level fault; call sites map it to the right error type.
struct Bus;

pub struct Sx126x<SPI, RST, BUSY, TXEN, RXEN, D> {
    spi: SPI,
    reset: RST,
    busy: BUSY,
    tx_en: TXEN,
    rx_en: RXEN,
    delay: D,
    profile: RadioProfile,
}

impl<SPI, RST, BUSY, TXEN, RXEN, D> Sx126x<SPI, RST, BUSY, TXEN, RXEN, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    BUSY: InputPin,
    TXEN: OutputPin,
    RXEN: OutputPin,
    D: DelayNs,
{
    /// Hard-reset the chip and program the full radio profile. Both
    /// nodes must run the same profile or they will never hear each
    /// other.
    pub fn init(
        spi: SPI,
        reset: RST,
        busy: BUSY,
        tx_en: TXEN,
        rx_en: RXEN,
        delay: D,
        profile: RadioProfile,
    ) -> Result<Self> {
        let mut radio = Self {
            spi,
            reset,
            busy,
            tx_en,
            rx_en,
            delay,
            profile,
        };

        radio.hard_reset().map_err(|_| Error::Init("radio reset failed"))?;
        radio
            .configure()
            .map_err(|_| Error::Init("radio configuration failed"))?;

        info!(
            "sx126x: up at {} MHz, bw {} kHz, SF{}, CR 4/{}, {} dBm",
            radio.profile.frequency_mhz,
            radio.profile.bandwidth_khz,
            radio.profile.spreading_factor,
            radio.profile.coding_rate,
            radio.profile.output_power_dbm,
        );
        Ok(radio)
    }

    fn hard_reset(&mut self) -> core::result::Result<(), Bus> {
        self.reset.set_low().map_err(|_| Bus)?;
        self.delay.delay_ms(1);
        self.reset.set_high().map_err(|_| Bus)?;
        self.delay.delay_ms(5);
        self.wait_not_busy()
    }

    fn configure(&mut self) -> core::result::Result<(), Bus> {
        self.command(OP_SET_STANDBY, &[STANDBY_RC])?;
        self.command(OP_SET_PACKET_TYPE, &[PACKET_TYPE_LORA])?;

        // PLL step: freq_hz * 2^25 / 32 MHz.
        let freq_hz = u64::from(self.profile.frequency_mhz) * 1_000_000;
        let raw = (freq_hz << 25) / 32_000_000;
        let raw = raw as u32;
        self.command(OP_SET_RF_FREQUENCY, &raw.to_be_bytes())?;

        // SX1268 PA at full duty.
        self.command(OP_SET_PA_CONFIG, &[0x04, 0x07, 0x00, 0x01])?;
        // 200 µs ramp.
        self.command(
            OP_SET_TX_PARAMS,
            &[self.profile.output_power_dbm as u8, 0x04],
        )?;

        // Overcurrent protection, 2.5 mA per LSB.
        let ocp = (u32::from(self.profile.current_limit_ma) * 2 / 5) as u8;
        self.write_register(REG_OCP, &[ocp])?;

        self.command(OP_SET_BUFFER_BASE, &[0x00, 0x00])?;

        let ldro = u8::from(self.profile.spreading_factor >= 11 && self.profile.bandwidth_khz <= 125);
        self.command(
            OP_SET_MODULATION_PARAMS,
            &[
                self.profile.spreading_factor,
                bandwidth_code(self.profile.bandwidth_khz),
                self.profile.coding_rate - 4,
                ldro,
            ],
        )?;

        self.set_packet_len(MAX_FRAME_LEN as u8)?;

        // The 8-bit sync word spreads across two registers, each nibble
        // padded with 0x4.
        let sync = self.profile.sync_word;
        self.write_register(
            REG_LORA_SYNC_WORD,
            &[(sync & 0xF0) | 0x04, ((sync & 0x0F) << 4) | 0x04],
        )?;

        // TxDone, RxDone, and timeout, all routed to DIO1.
        let mask = (IRQ_TX_DONE | IRQ_RX_DONE | IRQ_TIMEOUT).to_be_bytes();
        self.command(
            OP_SET_DIO_IRQ_PARAMS,
            &[mask[0], mask[1], mask[0], mask[1], 0x00, 0x00, 0x00, 0x00],
        )?;

        self.clear_irqs()
    }

    /// Variable payload length; every other packet parameter is fixed.
    fn set_packet_len(&mut self, len: u8) -> core::result::Result<(), Bus> {
        let preamble = self.profile.preamble_symbols.to_be_bytes();
        self.command(
            OP_SET_PACKET_PARAMS,
            &[
                preamble[0],
                preamble[1],
                0x00, // explicit header
                len,
                0x01, // CRC on
                0x00, // standard IQ
            ],
        )
    }

    // ── SPI plumbing ─────────────────────────────────────────

    /// The chip holds BUSY high while it digests the previous command;
    /// clocking a new one in early corrupts it.
    fn wait_not_busy(&mut self) -> core::result::Result<(), Bus> {
        for _ in 0..BUSY_POLL_BUDGET {
            if !self.busy.is_high().map_err(|_| Bus)? {
                return Ok(());
            }
            self.delay.delay_us(10);
        }
        warn!("sx126x: BUSY stuck high");
        Err(Bus)
    }

    fn command(&mut self, opcode: u8, args: &[u8]) -> core::result::Result<(), Bus> {
        self.wait_not_busy()?;
        self.spi
            .transaction(&mut [Operation::Write(&[opcode]), Operation::Write(args)])
            .map_err(|_| Bus)
    }

    fn read_command(&mut self, opcode: u8, out: &mut [u8]) -> core::result::Result<(), Bus> {
        self.wait_not_busy()?;
        // First clocked-out byte is chip status; caller's buffer includes it.
        self.spi
            .transaction(&mut [Operation::Write(&[opcode]), Operation::Read(out)])
            .map_err(|_| Bus)
    }

    fn write_register(&mut self, addr: u16, data: &[u8]) -> core::result::Result<(), Bus> {
        self.wait_not_busy()?;
        let addr = addr.to_be_bytes();
        self.spi
            .transaction(&mut [
                Operation::Write(&[OP_WRITE_REGISTER, addr[0], addr[1]]),
                Operation::Write(data),
            ])
            .map_err(|_| Bus)
    }

    fn irq_status(&mut self) -> core::result::Result<u16, Bus> {
        let mut out = [0u8; 3];
        self.read_command(OP_GET_IRQ_STATUS, &mut out)?;
        Ok(u16::from_be_bytes([out[1], out[2]]))
    }

    fn clear_irqs(&mut self) -> core::result::Result<(), Bus> {
        RADIO_IRQ.store(false, Ordering::Release);
        self.command(OP_CLEAR_IRQ_STATUS, &IRQ_ALL.to_be_bytes())
    }

    fn rf_switch(&mut self, transmit: bool) -> core::result::Result<(), Bus> {
        if transmit {
            self.rx_en.set_low().map_err(|_| Bus)?;
            self.tx_en.set_high().map_err(|_| Bus)
        } else {
            self.tx_en.set_low().map_err(|_| Bus)?;
            self.rx_en.set_high().map_err(|_| Bus)
        }
    }

    fn write_payload(&mut self, frame: &[u8]) -> core::result::Result<(), Bus> {
        self.wait_not_busy()?;
        self.spi
            .transaction(&mut [
                Operation::Write(&[OP_WRITE_BUFFER, 0x00]),
                Operation::Write(frame),
            ])
            .map_err(|_| Bus)
    }

    fn arm_receive(&mut self) -> core::result::Result<(), Bus> {
        self.command(OP_SET_STANDBY, &[STANDBY_RC])?;
        self.rf_switch(false)?;
        self.set_packet_len(MAX_FRAME_LEN as u8)?;
        self.clear_irqs()?;
        // 0xFFFFFF = continuous receive, no timeout.
        self.command(OP_SET_RX, &[0xFF, 0xFF, 0xFF])
    }
}

/// LoRa bandwidth register code. Unknown values fall back to 125 kHz,
/// the profile default.
const fn bandwidth_code(khz: u32) -> u8 {
    match khz {
        7 => 0x00,
        15 => 0x01,
        31 => 0x02,
        62 => 0x03,
        250 => 0x05,
        500 => 0x06,
        _ => 0x04, // 125 kHz
    }
}

impl<SPI, RST, BUSY, TXEN, RXEN, D> LinkTransport for Sx126x<SPI, RST, BUSY, TXEN, RXEN, D>
where
    SPI: SpiDevice,
    RST: OutputPin,
    BUSY: InputPin,
    TXEN: OutputPin,
    RXEN: OutputPin,
    D: DelayNs,
{
    fn send(&mut self, frame: &[u8]) -> core::result::Result<(), SendError> {
        if frame.is_empty() || frame.len() > MAX_FRAME_LEN {
            return Err(SendError::TxFailed);
        }

        self.command(OP_SET_STANDBY, &[STANDBY_RC])
            .map_err(|Bus| SendError::Bus)?;
        self.rf_switch(true).map_err(|Bus| SendError::Bus)?;
        self.set_packet_len(frame.len() as u8)
            .map_err(|Bus| SendError::Bus)?;
        self.write_payload(frame).map_err(|Bus| SendError::Bus)?;
        self.clear_irqs().map_err(|Bus| SendError::Bus)?;

        let timeout = TX_TIMEOUT_STEPS.to_be_bytes();
        self.command(OP_SET_TX, &[timeout[1], timeout[2], timeout[3]])
            .map_err(|Bus| SendError::Bus)?;

        // Wait for TxDone. The DIO1 latch keeps SPI traffic off the bus
        // until the chip actually signals.
        for _ in 0..TX_POLL_BUDGET_MS {
            if RADIO_IRQ.load(Ordering::Acquire) {
                let irq = self.irq_status().map_err(|Bus| SendError::Bus)?;
                self.clear_irqs().map_err(|Bus| SendError::Bus)?;

                if irq & IRQ_TX_DONE != 0 {
                    debug!("sx126x: {} bytes on air", frame.len());
                    return Ok(());
                }
                if irq & IRQ_TIMEOUT != 0 {
                    warn!("sx126x: transmit timed out");
                    return Err(SendError::TxFailed);
                }
            }
            self.delay.delay_ms(1);
        }

        warn!("sx126x: no TxDone within budget");
        Err(SendError::TxFailed)
    }

    fn start_listening(&mut self) {
        if self.arm_receive().is_err() {
            warn!("sx126x: failed to enter receive mode");
        }
    }

    fn data_ready(&self) -> bool {
        RADIO_IRQ.load(Ordering::Acquire)
    }

    fn receive(&mut self, buf: &mut [u8]) -> core::result::Result<usize, ReceiveError> {
        RADIO_IRQ.store(false, Ordering::Release);

        let irq = self.irq_status().map_err(|Bus| ReceiveError::Bus)?;
        self.command(OP_CLEAR_IRQ_STATUS, &IRQ_ALL.to_be_bytes())
            .map_err(|Bus| ReceiveError::Bus)?;

        if irq & IRQ_CRC_ERR != 0 {
            return Err(ReceiveError::CrcFailed);
        }
        if irq & IRQ_RX_DONE == 0 {
            return Err(ReceiveError::Empty);
        }

        let mut status = [0u8; 3];
        self.read_command(OP_GET_RX_BUFFER_STATUS, &mut status)
            .map_err(|Bus| ReceiveError::Bus)?;
        let len = usize::from(status[1]).min(buf.len());
        let offset = status[2];

        self.wait_not_busy().map_err(|Bus| ReceiveError::Bus)?;
        self.spi
            .transaction(&mut [
                Operation::Write(&[OP_READ_BUFFER, offset, 0x00]),
                Operation::Read(&mut buf[..len]),
            ])
            .map_err(|_| ReceiveError::Bus)?;

        debug!("sx126x: received {len} bytes");
        Ok(len)
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct Pin;

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> core::result::Result<(), Infallible> {
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), Infallible> {
            Ok(())
        }
    }

    /// BUSY line double; `true` models a chip that never settles.
    struct BusyLine(bool);

    impl embedded_hal::digital::ErrorType for BusyLine {
        type Error = Infallible;
    }

    impl InputPin for BusyLine {
        fn is_high(&mut self) -> core::result::Result<bool, Infallible> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> core::result::Result<bool, Infallible> {
            Ok(!self.0)
        }
    }

    struct GoodSpi;

    impl embedded_hal::spi::ErrorType for GoodSpi {
        type Error = Infallible;
    }

    impl SpiDevice for GoodSpi {
        fn transaction(
            &mut self,
            _operations: &mut [Operation<'_, u8>],
        ) -> core::result::Result<(), Infallible> {
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn init_succeeds_on_a_responsive_chip() {
        let radio = Sx126x::init(
            GoodSpi,
            Pin,
            BusyLine(false),
            Pin,
            Pin,
            NoDelay,
            RadioProfile::default(),
        );
        assert!(radio.is_ok());
    }

    #[test]
    fn stuck_busy_line_fails_init_with_a_terminal_error() {
        let radio = Sx126x::init(
            GoodSpi,
            Pin,
            BusyLine(true),
            Pin,
            Pin,
            NoDelay,
            RadioProfile::default(),
        );
        assert_eq!(radio.err(), Some(Error::Init("radio reset failed")));
    }
}
