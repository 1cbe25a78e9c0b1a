//! CC2500 transceiver driver.
//!
//! The test-bed uses two CC2500 chips on the same SPI bus: one generates the
//! unmodulated carrier the tag reflects, the other receives the backscattered
//! frames. Both are driven by [`Cc2500`], which is generic over
//! `embedded-hal` 1.0 [`SpiDevice`] and [`DelayNs`] so it runs on any HAL.
//!
//! ## Access model
//!
//! | Access          | Bytes on the wire                      | Settle delay |
//! |-----------------|----------------------------------------|--------------|
//! | Command strobe  | `cmd`                                  | 1 ms         |
//! | Register write  | `addr, value`                          | 1 ms         |
//! | Register read   | `addr \| 0x80, -` -> `-, value`        | 1 ms         |
//! | Preset write    | `addr, value, addr, value, ...` (one CS) | none       |
//! | FIFO read       | `0xFF, ...` (burst)                    | none         |
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::delay::NoopDelay;
//! # use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction};
//! use backscatter::radio::Cc2500;
//!
//! # let spi = SpiMock::new(&[
//! #     Transaction::transaction_start(),
//! #     Transaction::write_vec(vec![0x35]),
//! #     Transaction::transaction_end(),
//! # ]);
//! let mut carrier = Cc2500::new(spi, NoopDelay::new());
//! carrier.start_carrier().unwrap();
//! # let (mut spi, _) = carrier.release();
//! # spi.done();
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};
use heapless::Vec;
use thiserror::Error;

use crate::consts::{REGISTER_SETTLE_MS, RX_BUFFER_LEN, RX_FIFO_PAYLOAD_MAX};
use crate::packet::{FifoStatus, ReceivedFrame, decode_frame};
use crate::report::Reported;

use super::codec::{Bandwidth, ChannelSpacing, Codec, DataRate, Deviation, Frequency};
use super::registers::{
    BURST, CARRIER_PRESET, CHANNR, DEVIATN, FIFO, FREQ0, FREQ1, FREQ2, MCSM1,
    MCSM1_RX_THEN_IDLE, MDMCFG0, MDMCFG1, MDMCFG3, MDMCFG4, PATABLE, READ, RECEIVER_PRESET,
    RXBYTES, RegisterField, SFRX, SIDLE, SRES, SRX, STX, TX_POWER_MAX, TxPower,
};

/// Register pairs sent per chip select in [`Cc2500::write_registers`].
const MAX_BURST_FIELDS: usize = 32;

/// Time the crystal needs after a manual reset, in µs.
const RESET_SETTLE_US: u32 = 100;

/// State of the radio as last commanded by the driver.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RadioMode {
    /// Powered, neither transmitting nor receiving.
    #[default]
    Idle,
    /// Listening for a sync word or receiving a packet.
    Rx,
    /// Transmitting; for the carrier chip this is the unmodulated tone.
    Tx,
}

/// Errors raised by [`Cc2500`].
#[derive(Debug, Error)]
pub enum RadioError<E> {
    /// The SPI transaction failed.
    #[error("SPI transaction failed")]
    Spi(E),
}

/// A CC2500 on an SPI bus.
///
/// ## Type Parameters
///
/// - `SPI`: the chip's [`SpiDevice`], which owns its chip select
/// - `D`: a [`DelayNs`] provider for the settle delays
#[derive(Debug)]
pub struct Cc2500<SPI, D> {
    spi: SPI,
    delay: D,
    mode: RadioMode,
}

impl<SPI, D> Cc2500<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Wraps an SPI device. No bytes are sent until a method is called.
    pub fn new(spi: SPI, delay: D) -> Self {
        Self {
            spi,
            delay,
            mode: RadioMode::Idle,
        }
    }

    /// Mode the chip was last put into.
    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Gives back the bus and the delay provider.
    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    fn settle(&mut self) {
        self.delay.delay_ms(REGISTER_SETTLE_MS);
    }

    /// Sends a command strobe.
    pub fn strobe(&mut self, command: u8) -> Result<(), RadioError<SPI::Error>> {
        self.spi.write(&[command]).map_err(RadioError::Spi)?;
        self.settle();
        match command {
            SRX => self.mode = RadioMode::Rx,
            STX => self.mode = RadioMode::Tx,
            SIDLE | SRES => self.mode = RadioMode::Idle,
            _ => {}
        }
        Ok(())
    }

    /// Writes one configuration register.
    pub fn write_register(&mut self, field: RegisterField) -> Result<(), RadioError<SPI::Error>> {
        self.spi
            .write(&[field.address, field.value])
            .map_err(RadioError::Spi)?;
        self.settle();
        Ok(())
    }

    /// Writes several registers with the chip selected only once.
    pub fn write_registers(&mut self, fields: &[RegisterField]) -> Result<(), RadioError<SPI::Error>> {
        for chunk in fields.chunks(MAX_BURST_FIELDS) {
            let mut buf: Vec<u8, { 2 * MAX_BURST_FIELDS }> = Vec::new();
            for field in chunk {
                // chunk size bounds the length
                let _ = buf.push(field.address);
                let _ = buf.push(field.value);
            }
            self.spi.write(&buf).map_err(RadioError::Spi)?;
        }
        Ok(())
    }

    /// Reads one configuration register.
    pub fn read_register(&mut self, address: u8) -> Result<u8, RadioError<SPI::Error>> {
        let mut buf = [address | READ, 0];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(RadioError::Spi)?;
        self.settle();
        Ok(buf[1])
    }

    /// Read-modify-write of one register. Returns the value written.
    pub fn modify_register<F>(&mut self, address: u8, f: F) -> Result<u8, RadioError<SPI::Error>>
    where
        F: FnOnce(u8) -> u8,
    {
        let value = f(self.read_register(address)?);
        self.write_register(RegisterField::new(address, value))?;
        Ok(value)
    }

    /// Manual reset, needed after a reset without a power cycle.
    ///
    /// Leaves the chip in IDLE with all registers at their defaults.
    pub fn reset(&mut self) -> Result<(), RadioError<SPI::Error>> {
        self.strobe(SRES)?;
        self.delay.delay_us(RESET_SETTLE_US);
        self.strobe(SIDLE)
    }

    /// Resets the chip and loads the receiver preset.
    pub fn setup_receiver(&mut self) -> Result<(), RadioError<SPI::Error>> {
        self.reset()?;
        self.write_registers(&RECEIVER_PRESET)?;
        info!("receiver configured");
        Ok(())
    }

    /// Resets the chip, loads the carrier preset and selects maximum power.
    pub fn setup_carrier(&mut self) -> Result<(), RadioError<SPI::Error>> {
        self.reset()?;
        self.write_registers(&CARRIER_PRESET)?;
        self.set_tx_power(TX_POWER_MAX)?;
        info!("carrier configured, {} dBm", TX_POWER_MAX.dbm);
        Ok(())
    }

    /// Programs the power amplifier table.
    pub fn set_tx_power(&mut self, power: TxPower) -> Result<(), RadioError<SPI::Error>> {
        self.spi
            .write(&[PATABLE | BURST, power.pa_value, power.pa_value])
            .map_err(RadioError::Spi)
    }

    /// Starts listening for a single packet.
    ///
    /// The chip returns to IDLE after the packet, and the RX FIFO is flushed
    /// before listening starts.
    pub fn start_listen(&mut self) -> Result<(), RadioError<SPI::Error>> {
        self.strobe(SIDLE)?;
        self.write_register(RegisterField::new(MCSM1, MCSM1_RX_THEN_IDLE))?;
        self.strobe(SFRX)?;
        self.strobe(SRX)
    }

    /// Stops listening.
    pub fn stop_listen(&mut self) -> Result<(), RadioError<SPI::Error>> {
        self.strobe(SIDLE)
    }

    /// Turns the carrier on.
    pub fn start_carrier(&mut self) -> Result<(), RadioError<SPI::Error>> {
        self.strobe(STX)
    }

    /// Turns the carrier off.
    pub fn stop_carrier(&mut self) -> Result<(), RadioError<SPI::Error>> {
        self.strobe(SIDLE)
    }

    /// Tunes to `hz` on channel 0 with the minimum channel spacing.
    pub fn set_frequency(&mut self, hz: u32) -> Result<Reported<Frequency>, RadioError<SPI::Error>> {
        self.strobe(SIDLE)?;
        let report = Frequency::encode(hz);
        let freq = report.value;
        let spacing = ChannelSpacing::default();
        let mdmcfg1 = self.read_register(MDMCFG1)?;
        self.write_registers(&[
            RegisterField::new(CHANNR, 0),
            RegisterField::new(FREQ2, freq.freq2()),
            RegisterField::new(FREQ1, freq.freq1()),
            RegisterField::new(FREQ0, freq.freq0()),
            RegisterField::new(MDMCFG1, spacing.mdmcfg1(mdmcfg1)),
            RegisterField::new(MDMCFG0, spacing.mdmcfg0()),
        ])?;
        debug!("frequency word {} -> {} Hz", freq.word, freq.to_hz());
        Ok(report)
    }

    /// Sets the channel spacing. Only relevant on channels other than 0.
    pub fn set_channel_spacing(
        &mut self,
        hz: u32,
    ) -> Result<Reported<ChannelSpacing>, RadioError<SPI::Error>> {
        self.strobe(SIDLE)?;
        let report = ChannelSpacing::encode(hz);
        let mdmcfg1 = self.read_register(MDMCFG1)?;
        self.write_registers(&[
            RegisterField::new(MDMCFG1, report.value.mdmcfg1(mdmcfg1)),
            RegisterField::new(MDMCFG0, report.value.mdmcfg0()),
        ])?;
        Ok(report)
    }

    /// Sets the symbol rate.
    pub fn set_data_rate(&mut self, baud: u32) -> Result<Reported<DataRate>, RadioError<SPI::Error>> {
        self.strobe(SIDLE)?;
        let report = DataRate::encode(baud);
        let mdmcfg4 = self.read_register(MDMCFG4)?;
        self.write_registers(&[
            RegisterField::new(MDMCFG4, report.value.mdmcfg4(mdmcfg4)),
            RegisterField::new(MDMCFG3, report.value.mdmcfg3()),
        ])?;
        debug!("data rate {} -> {} Baud", baud, report.value.to_hz());
        Ok(report)
    }

    /// Sets the FSK deviation.
    pub fn set_deviation(&mut self, hz: u32) -> Result<Reported<Deviation>, RadioError<SPI::Error>> {
        self.strobe(SIDLE)?;
        let report = Deviation::encode(hz);
        self.write_register(RegisterField::new(DEVIATN, report.value.deviatn()))?;
        debug!("deviation {} -> {} Hz", hz, report.value.to_hz());
        Ok(report)
    }

    /// Sets the channel filter bandwidth.
    pub fn set_filter_bandwidth(
        &mut self,
        hz: u32,
    ) -> Result<Reported<Bandwidth>, RadioError<SPI::Error>> {
        self.strobe(SIDLE)?;
        let report = Bandwidth::encode(hz);
        let fields = report.value;
        let _ = self.modify_register(MDMCFG4, |current| fields.mdmcfg4(current))?;
        debug!("filter bandwidth {} -> {} Hz", hz, fields.to_hz());
        Ok(report)
    }

    /// Reads the packet that just finished from the RX FIFO.
    ///
    /// The length comes from the FIFO status rather than the packet's own
    /// length byte, which may be corrupted. On overflow nothing is read and
    /// the returned frame has no payload.
    pub fn read_frame(&mut self) -> Result<ReceivedFrame, RadioError<SPI::Error>> {
        let mut status = [RXBYTES, 0];
        self.spi
            .transfer_in_place(&mut status)
            .map_err(RadioError::Spi)?;
        let fifo = FifoStatus::from(status[1]);
        if fifo.overflowed {
            warn!("RX FIFO overflow");
            return Ok(decode_frame(fifo, &[], [0, 0]));
        }

        let len = fifo
            .payload_len()
            .min(RX_FIFO_PAYLOAD_MAX)
            .min(RX_BUFFER_LEN);
        let mut payload = [0u8; RX_BUFFER_LEN];
        let mut appended = [0u8; 2];
        self.spi
            .transaction(&mut [
                Operation::Write(&[FIFO | READ | BURST]),
                Operation::Read(&mut payload[..len]),
                Operation::Read(&mut appended),
            ])
            .map_err(RadioError::Spi)?;
        Ok(decode_frame(fifo, &payload[..len], appended))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction};
    use std::vec;
    use std::vec::Vec as StdVec;

    fn write(bytes: &[u8]) -> [Transaction<u8>; 3] {
        [
            Transaction::transaction_start(),
            Transaction::write_vec(bytes.to_vec()),
            Transaction::transaction_end(),
        ]
    }

    fn read(address: u8, value: u8) -> [Transaction<u8>; 3] {
        [
            Transaction::transaction_start(),
            Transaction::transfer_in_place(vec![address | 0x80, 0], vec![0, value]),
            Transaction::transaction_end(),
        ]
    }

    fn expect(groups: &[&[Transaction<u8>]]) -> SpiMock<u8> {
        let all: StdVec<Transaction<u8>> = groups.iter().flat_map(|g| g.iter().cloned()).collect();
        SpiMock::new(&all)
    }

    fn finish(radio: Cc2500<SpiMock<u8>, NoopDelay>) {
        let (mut spi, _) = radio.release();
        spi.done();
    }

    #[test]
    fn test_start_listen_sequence() {
        let spi = expect(&[
            &write(&[SIDLE]),
            &write(&[MCSM1, 0x00]),
            &write(&[SFRX]),
            &write(&[SRX]),
        ]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        radio.start_listen().unwrap();
        assert_eq!(radio.mode(), RadioMode::Rx);
        finish(radio);
    }

    #[test]
    fn test_carrier_on_off() {
        let spi = expect(&[&write(&[STX]), &write(&[SIDLE])]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        radio.start_carrier().unwrap();
        assert_eq!(radio.mode(), RadioMode::Tx);
        radio.stop_carrier().unwrap();
        assert_eq!(radio.mode(), RadioMode::Idle);
        finish(radio);
    }

    #[test]
    fn test_setup_carrier_writes_preset_and_power() {
        let preset: StdVec<u8> = CARRIER_PRESET
            .iter()
            .flat_map(|f| [f.address, f.value])
            .collect();
        let spi = expect(&[
            &write(&[SRES]),
            &write(&[SIDLE]),
            &write(&preset),
            &write(&[0x7E, 0xFF, 0xFF]),
        ]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        radio.setup_carrier().unwrap();
        finish(radio);
    }

    #[test]
    fn test_set_data_rate_preserves_bandwidth_bits() {
        let spi = expect(&[
            &write(&[SIDLE]),
            &read(MDMCFG4, 0x8B),
            &write(&[MDMCFG4, 0x8B, MDMCFG3, 248]),
        ]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        let report = radio.set_data_rate(100_000).unwrap();
        assert_eq!(report.value.to_hz(), 99_975);
        assert!(!report.is_clean());
        finish(radio);
    }

    #[test]
    fn test_set_filter_bandwidth_preserves_data_rate_bits() {
        let spi = expect(&[
            &write(&[SIDLE]),
            &read(MDMCFG4, 0x0B),
            &write(&[MDMCFG4, 0x0B]),
        ]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        let report = radio.set_filter_bandwidth(794_444).unwrap();
        assert_eq!(report.value.to_hz(), 812_500);
        finish(radio);
    }

    #[test]
    fn test_set_deviation() {
        let spi = expect(&[&write(&[SIDLE]), &write(&[DEVIATN, 0x75])]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        let report = radio.set_deviation(347_222).unwrap();
        assert_eq!(report.value.to_hz(), 330_078);
        finish(radio);
    }

    #[test]
    fn test_set_frequency() {
        let spi = expect(&[
            &write(&[SIDLE]),
            &read(MDMCFG1, 0x23),
            &write(&[
                CHANNR, 0x00, FREQ2, 0x5E, FREQ1, 0x3B, FREQ0, 0x13, MDMCFG1, 0x20, MDMCFG0, 0x00,
            ]),
        ]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        let report = radio.set_frequency(2_450_000_000).unwrap();
        assert_eq!(report.value.word, 0x5E_3B13);
        finish(radio);
    }

    #[test]
    fn test_read_frame() {
        let mut payload = vec![0xAAu8; 22];
        payload[0] = 15;
        payload[1] = 5;
        let spi = SpiMock::new(&[
            Transaction::transaction_start(),
            Transaction::transfer_in_place(vec![0xFB, 0], vec![0, 24]),
            Transaction::transaction_end(),
            Transaction::transaction_start(),
            Transaction::write(0xFF),
            Transaction::read_vec(payload.clone()),
            Transaction::read_vec(vec![200, 0x80 | 0x2A]),
            Transaction::transaction_end(),
        ]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        let frame = radio.read_frame().unwrap();
        assert!(!frame.overflowed);
        assert!(frame.crc_ok);
        assert_eq!(frame.link_quality, 0x2A);
        assert_eq!(frame.rssi, -98);
        assert_eq!(frame.payload.as_slice(), payload.as_slice());
        finish(radio);
    }

    #[test]
    fn test_read_frame_overflow_skips_fifo() {
        let spi = SpiMock::new(&[
            Transaction::transaction_start(),
            Transaction::transfer_in_place(vec![0xFB, 0], vec![0, 0x82]),
            Transaction::transaction_end(),
        ]);
        let mut radio = Cc2500::new(spi, NoopDelay::new());
        let frame = radio.read_frame().unwrap();
        assert!(frame.overflowed);
        assert!(frame.payload.is_empty());
        assert!(!frame.crc_ok);
        finish(radio);
    }
}
