//! Radio side of the test-bed: receiver settings, register codec and the
//! CC2500 driver used both as carrier generator and as receiver.
//!
//! - [`RadioConfig`]: receiver settings derived from the backscatter timing
//! - [`codec`]: Hz to register field conversions, both directions
//! - [`registers`]: register map, command strobes and preset tables
//! - [`driver`]: [`Cc2500`](driver::Cc2500) over `embedded-hal` SPI

use core::fmt;

use libm::{fabs, round};

use crate::consts::{CC1352_MAX_DEVIATION_HZ, CC2500_MAX_DEVIATION_HZ};
use crate::report::{Advisory, Reported};
use crate::timing::SymbolTiming;

pub mod codec;
pub mod driver;
pub mod registers;

pub use driver::{Cc2500, RadioError};

/// Receiver the frames are meant for.
///
/// Each chip family expects its own sync word after the preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ReceiverChip {
    /// TI CC2500, 2.4 GHz transceiver.
    #[default]
    Cc2500,
    /// TI CC1352, multi-band wireless MCU.
    Cc1352,
}

impl ReceiverChip {
    /// Part name.
    pub const fn name(self) -> &'static str {
        match self {
            ReceiverChip::Cc2500 => "CC2500",
            ReceiverChip::Cc1352 => "CC1352",
        }
    }

    /// Preamble plus sync word the receiver locks onto.
    pub const fn sync_header(self) -> [u8; 8] {
        match self {
            ReceiverChip::Cc2500 => [0xaa, 0xaa, 0xaa, 0xaa, 0xd3, 0x91, 0xd3, 0x91],
            ReceiverChip::Cc1352 => [0xaa, 0xaa, 0xaa, 0xaa, 0x93, 0x0b, 0x51, 0xde],
        }
    }

    /// Largest deviation the chip demodulates, in Hz.
    pub const fn max_deviation(self) -> u32 {
        match self {
            ReceiverChip::Cc2500 => CC2500_MAX_DEVIATION_HZ,
            ReceiverChip::Cc1352 => CC1352_MAX_DEVIATION_HZ,
        }
    }
}

/// Receiver settings matching a backscatter waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct RadioConfig {
    /// Symbol rate in Baud.
    pub baudrate: u32,
    /// Centre of the two tones relative to the carrier, in Hz.
    pub center_offset: u32,
    /// Distance of each tone from the centre, in Hz.
    pub deviation: u32,
    /// Smallest channel filter that passes both tones, in Hz.
    pub min_rx_bandwidth: u32,
}

impl RadioConfig {
    /// Derives the receiver settings from the two toggle periods.
    ///
    /// Pure: the same inputs always give the same output. Advisories are raised
    /// when the deviation exceeds a receiver's ceiling or when symbol 0 sits on
    /// the higher tone.
    ///
    /// # Arguments
    /// - `timing`: the operator's dividers
    /// - `baud`: the baud rate actually produced by the sequencer
    /// - `clock_hz`: sequencer clock
    ///
    /// Synthesis only calls this with dividers of at least 2. A zero divider
    /// gives a zero tone instead of panicking.
    pub fn from_timing(timing: &SymbolTiming, baud: u32, clock_hz: u32) -> Reported<Self> {
        let tone0 = clock_hz.checked_div(u32::from(timing.divider0)).unwrap_or(0);
        let tone1 = clock_hz.checked_div(u32::from(timing.divider1)).unwrap_or(0);
        let center = ((u64::from(tone0) + u64::from(tone1)) / 2) as u32;
        let exact1 = f64::from(clock_hz) / f64::from(timing.divider1);
        let deviation = fabs(round(exact1 - f64::from(center))) as u32;

        let mut report = Reported::new(Self {
            baudrate: baud,
            center_offset: center,
            deviation,
            min_rx_bandwidth: baud.saturating_add(deviation.saturating_mul(2)),
        });
        for chip in [ReceiverChip::Cc2500, ReceiverChip::Cc1352] {
            if deviation > chip.max_deviation() {
                report.raise(Advisory::DeviationCeiling { chip, deviation });
            }
        }
        if timing.divider0 < timing.divider1 {
            report.raise(Advisory::DividerOrder {
                divider0: timing.divider0,
                divider1: timing.divider1,
            });
        }
        report
    }

    /// Absolute receiver frequency for a carrier at `carrier_hz`.
    pub const fn receiver_frequency(&self, carrier_hz: u32) -> u32 {
        carrier_hz.saturating_add(self.center_offset)
    }
}

impl fmt::Display for RadioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Computed baseband settings:")?;
        writeln!(f, "- baudrate: {}", self.baudrate)?;
        writeln!(f, "- center offset: {}", self.center_offset)?;
        writeln!(f, "- deviation: {}", self.deviation)?;
        writeln!(f, "- RX bandwidth: {}", self.min_rx_bandwidth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SEQUENCER_CLOCK_HZ;

    #[test]
    fn test_default_config() {
        let report = RadioConfig::from_timing(
            &SymbolTiming::new(20, 18, 100_000),
            100_000,
            SEQUENCER_CLOCK_HZ,
        );
        assert!(report.is_clean());
        assert_eq!(
            report.value,
            RadioConfig {
                baudrate: 100_000,
                center_offset: 6_597_222,
                deviation: 347_222,
                min_rx_bandwidth: 794_444,
            }
        );
        assert_eq!(report.value.receiver_frequency(2_450_000_000), 2_456_597_222);
    }

    #[test]
    fn test_config_is_pure() {
        let timing = SymbolTiming::new(36, 32, 250_000);
        let a = RadioConfig::from_timing(&timing, 250_000, SEQUENCER_CLOCK_HZ);
        let b = RadioConfig::from_timing(&timing, 250_000, SEQUENCER_CLOCK_HZ);
        assert_eq!(a, b);
    }

    #[test]
    fn test_deviation_ceilings() {
        // tones at 12.5 MHz and 10.416 MHz, deviation ~1.04 MHz
        let report =
            RadioConfig::from_timing(&SymbolTiming::new(12, 10, 100_000), 100_000, SEQUENCER_CLOCK_HZ);
        assert_eq!(report.value.deviation, 1_041_667);
        assert_eq!(
            report.advisories.as_slice(),
            &[
                Advisory::DeviationCeiling {
                    chip: ReceiverChip::Cc2500,
                    deviation: 1_041_667
                },
                Advisory::DeviationCeiling {
                    chip: ReceiverChip::Cc1352,
                    deviation: 1_041_667
                },
            ]
        );
    }

    #[test]
    fn test_divider_order_advisory() {
        let report =
            RadioConfig::from_timing(&SymbolTiming::new(18, 20, 100_000), 100_000, SEQUENCER_CLOCK_HZ);
        assert!(report.advisories.contains(&Advisory::DividerOrder {
            divider0: 18,
            divider1: 20
        }));
    }

    #[test]
    fn test_zero_divider_gives_zero_tone() {
        let config =
            RadioConfig::from_timing(&SymbolTiming::new(0, 20, 100_000), 100_000, SEQUENCER_CLOCK_HZ)
                .value;
        assert_eq!(config.center_offset, 3_125_000);
        assert_eq!(config.deviation, 3_125_000);

        let config =
            RadioConfig::from_timing(&SymbolTiming::new(20, 0, 100_000), 100_000, SEQUENCER_CLOCK_HZ)
                .value;
        assert_eq!(config.center_offset, 3_125_000);
    }

    #[test]
    fn test_sync_headers() {
        assert_eq!(ReceiverChip::Cc2500.sync_header()[4..], [0xd3, 0x91, 0xd3, 0x91]);
        assert_eq!(ReceiverChip::Cc1352.sync_header()[4..], [0x93, 0x0b, 0x51, 0xde]);
    }
}
