//! CC2500 register map, command strobes and preset tables.
//!
//! Only the registers this link touches are named. Presets are applied as a
//! whole with [`Cc2500::write_registers`](super::Cc2500::write_registers).

/// One register assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct RegisterField {
    /// Register address, `0x00..=0x2E`.
    pub address: u8,
    /// Value to write.
    pub value: u8,
}

impl RegisterField {
    /// Shorthand constructor.
    pub const fn new(address: u8, value: u8) -> Self {
        Self { address, value }
    }
}

/// Header bit selecting a read access.
pub const READ: u8 = 0x80;
/// Header bit selecting a burst access.
pub const BURST: u8 = 0x40;

/// GDO2 output pin configuration.
pub const IOCFG2: u8 = 0x00;
/// GDO0 output pin configuration.
pub const IOCFG0: u8 = 0x02;
/// Packet automation control.
pub const PKTCTRL0: u8 = 0x08;
/// Channel number.
pub const CHANNR: u8 = 0x0A;
/// Frequency synthesizer control.
pub const FSCTRL1: u8 = 0x0B;
/// Frequency control word, high byte.
pub const FREQ2: u8 = 0x0D;
/// Frequency control word, middle byte.
pub const FREQ1: u8 = 0x0E;
/// Frequency control word, low byte.
pub const FREQ0: u8 = 0x0F;
/// Filter bandwidth and data rate exponent.
pub const MDMCFG4: u8 = 0x10;
/// Data rate mantissa.
pub const MDMCFG3: u8 = 0x11;
/// Modulation format and sync mode.
pub const MDMCFG2: u8 = 0x12;
/// Preamble length and channel spacing exponent.
pub const MDMCFG1: u8 = 0x13;
/// Channel spacing mantissa.
pub const MDMCFG0: u8 = 0x14;
/// Modem deviation setting.
pub const DEVIATN: u8 = 0x15;
/// Main radio control state machine, RX/TX exit states.
pub const MCSM1: u8 = 0x17;
/// Main radio control state machine, calibration.
pub const MCSM0: u8 = 0x18;
/// Frequency offset compensation.
pub const FOCCFG: u8 = 0x19;
/// Bit synchronization.
pub const BSCFG: u8 = 0x1A;
/// AGC control.
pub const AGCCTRL2: u8 = 0x1B;
/// AGC control.
pub const AGCCTRL1: u8 = 0x1C;
/// AGC control.
pub const AGCCTRL0: u8 = 0x1D;
/// Front end RX configuration.
pub const FREND1: u8 = 0x21;
/// Front end TX configuration.
pub const FREND0: u8 = 0x22;
/// Frequency synthesizer calibration.
pub const FSCAL1: u8 = 0x25;
/// Frequency synthesizer calibration.
pub const FSCAL0: u8 = 0x26;
/// Power amplifier table.
pub const PATABLE: u8 = 0x3E;
/// RX FIFO.
pub const FIFO: u8 = 0x3F;
/// RX FIFO status, read as a burst status register.
pub const RXBYTES: u8 = 0x3B | READ | BURST;

/// Reset chip.
pub const SRES: u8 = 0x30;
/// Enable RX.
pub const SRX: u8 = 0x34;
/// Enable TX.
pub const STX: u8 = 0x35;
/// Exit RX/TX and enter IDLE.
pub const SIDLE: u8 = 0x36;
/// Flush the RX FIFO.
pub const SFRX: u8 = 0x3A;

/// `MCSM1` value that drops back to IDLE after each received packet.
pub const MCSM1_RX_THEN_IDLE: u8 = 0x00;

/// 2-FSK receiver, variable length packets with CRC, GDO0 asserted on sync
/// word. Base frequency 2456.6 MHz, 98.6 kBaud, 355 kHz deviation, 812 kHz
/// filter.
pub const RECEIVER_PRESET: [RegisterField; 20] = [
    RegisterField::new(IOCFG0, 0x06),
    RegisterField::new(PKTCTRL0, 0x05),
    RegisterField::new(FSCTRL1, 0x0A),
    RegisterField::new(FREQ1, 0x7C),
    RegisterField::new(FREQ0, 0x08),
    RegisterField::new(MDMCFG4, 0x0B),
    RegisterField::new(MDMCFG3, 0xF1),
    RegisterField::new(MDMCFG2, 0x03),
    RegisterField::new(MDMCFG1, 0x23),
    RegisterField::new(MDMCFG0, 0xFF),
    RegisterField::new(DEVIATN, 0x76),
    RegisterField::new(MCSM0, 0x18),
    RegisterField::new(FOCCFG, 0x1D),
    RegisterField::new(BSCFG, 0x1C),
    RegisterField::new(AGCCTRL2, 0xC7),
    RegisterField::new(AGCCTRL1, 0x00),
    RegisterField::new(AGCCTRL0, 0xB0),
    RegisterField::new(FREND1, 0xB6),
    RegisterField::new(FSCAL1, 0x00),
    RegisterField::new(FSCAL0, 0x11),
];

/// Unmodulated carrier at 2450 MHz.
pub const CARRIER_PRESET: [RegisterField; 16] = [
    RegisterField::new(IOCFG2, 0x0B),
    RegisterField::new(IOCFG0, 0x0C),
    RegisterField::new(PKTCTRL0, 0x12),
    RegisterField::new(FSCTRL1, 0x0B),
    RegisterField::new(FREQ1, 0x3B),
    RegisterField::new(FREQ0, 0x13),
    RegisterField::new(MDMCFG4, 0x78),
    RegisterField::new(MDMCFG3, 0x93),
    RegisterField::new(MDMCFG2, 0xB0),
    RegisterField::new(DEVIATN, 0x44),
    RegisterField::new(MCSM0, 0x18),
    RegisterField::new(FOCCFG, 0x16),
    RegisterField::new(AGCCTRL2, 0x43),
    RegisterField::new(FREND0, 0x11),
    RegisterField::new(FSCAL1, 0x00),
    RegisterField::new(FSCAL0, 0x11),
];

/// Output power setting of the power amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TxPower {
    /// Output power in dBm.
    pub dbm: i8,
    /// `PATABLE` entry producing it.
    pub pa_value: u8,
}

const fn tx(dbm: i8, pa_value: u8) -> TxPower {
    TxPower { dbm, pa_value }
}

/// Supported output powers, weakest first.
pub const TX_POWER: [TxPower; 18] = [
    tx(-55, 0x00),
    tx(-30, 0x50),
    tx(-28, 0x44),
    tx(-26, 0xC0),
    tx(-24, 0x84),
    tx(-22, 0x81),
    tx(-20, 0x46),
    tx(-18, 0x93),
    tx(-16, 0x55),
    tx(-14, 0x8D),
    tx(-12, 0xC6),
    tx(-10, 0x97),
    tx(-8, 0x6E),
    tx(-6, 0x7F),
    tx(-4, 0xA9),
    tx(-2, 0xBB),
    tx(0, 0xFE),
    tx(1, 0xFF),
];

/// Strongest available output power, +1 dBm.
pub const TX_POWER_MAX: TxPower = TX_POWER[TX_POWER.len() - 1];

/// Strongest table entry not exceeding `dbm`, or the weakest one.
pub fn tx_power_at_most(dbm: i8) -> TxPower {
    TX_POWER
        .iter()
        .rev()
        .find(|p| p.dbm <= dbm)
        .copied()
        .unwrap_or(TX_POWER[0])
}
