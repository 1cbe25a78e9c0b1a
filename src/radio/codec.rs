//! Conversions between physical quantities and CC2500 register fields.
//!
//! Every frequency-like register of the CC2500 is a mantissa/exponent pair
//! scaled by the crystal frequency `f_xosc`:
//!
//! | Quantity        | Register fields            | Value                                       |
//! |-----------------|----------------------------|---------------------------------------------|
//! | Frequency       | `FREQ[22:0]`               | `f_xosc / 2^16 * FREQ`                       |
//! | Channel spacing | `CHANSPC_E:2`, `CHANSPC_M:8` | `f_xosc / 2^18 * (256 + m) * 2^e`         |
//! | Data rate       | `DRATE_E:4`, `DRATE_M:8`   | `(256 + m) * 2^e / 2^28 * f_xosc`            |
//! | Deviation       | `DEVIATION_E:3`, `DEVIATION_M:3` | `f_xosc / 2^17 * (8 + m) * 2^e`        |
//! | Filter bandwidth| `CHANBW_E:2`, `CHANBW_M:2` | `f_xosc / (8 * (4 + m) * 2^e)`               |
//!
//! Encoding rounds towards the register value just below the request, except
//! for the filter bandwidth, which never ends up narrower than requested.
//! [`Codec::encode`] raises a [`Quantized`](Advisory::Quantized) advisory
//! whenever the achieved value differs from the requested one.

use libm::{floor, log2};

use crate::consts::CC2500_XOSC_HZ;
use crate::report::{Advisory, Quantity, Reported};

const XOSC: f64 = CC2500_XOSC_HZ as f64;

fn pow2(exponent: u8) -> f64 {
    f64::from(1u32 << exponent)
}

fn clamp_field(value: f64, max: u8) -> u8 {
    if value <= 0.0 {
        0
    } else if value >= f64::from(max) {
        max
    } else {
        value as u8
    }
}

/// A register encoding of a physical quantity.
pub trait Codec: Copy + Sized {
    /// Quantity reported in advisories.
    const QUANTITY: Quantity;

    /// Closest representable fields for `hz`.
    fn from_hz(hz: u32) -> Self;

    /// Value the fields produce.
    fn to_hz(self) -> u32;

    /// Encodes `hz` and reports any quantization.
    fn encode(hz: u32) -> Reported<Self> {
        let fields = Self::from_hz(hz);
        let achieved = fields.to_hz();
        let mut report = Reported::new(fields);
        if achieved != hz {
            report.raise(Advisory::Quantized {
                quantity: Self::QUANTITY,
                requested: hz,
                achieved,
            });
        }
        report
    }
}

/// Base frequency word, `FREQ2:FREQ1:FREQ0`.
///
/// `FREQ2` only holds 7 bits, so the word is 23 bits wide and requests above
/// `f_xosc * 2^7` wrap around. The test-bed always listens on channel 0, so the channel spacing does not
/// contribute to the frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Frequency {
    /// Frequency control word.
    pub word: u32,
}

impl Frequency {
    /// `FREQ2` register value.
    pub const fn freq2(self) -> u8 {
        ((self.word >> 16) & 0x7F) as u8
    }

    /// `FREQ1` register value.
    pub const fn freq1(self) -> u8 {
        (self.word >> 8) as u8
    }

    /// `FREQ0` register value.
    pub const fn freq0(self) -> u8 {
        self.word as u8
    }
}

impl Codec for Frequency {
    const QUANTITY: Quantity = Quantity::Frequency;

    fn from_hz(hz: u32) -> Self {
        let word = (u64::from(hz) << 16) / u64::from(CC2500_XOSC_HZ);
        Self {
            word: (word as u32) & 0x007F_FFFF,
        }
    }

    fn to_hz(self) -> u32 {
        ((u64::from(CC2500_XOSC_HZ) * u64::from(self.word)) >> 16) as u32
    }
}

/// Channel spacing, `MDMCFG1[1:0]` and `MDMCFG0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct ChannelSpacing {
    /// `CHANSPC_E`, 0..=3.
    pub exponent: u8,
    /// `CHANSPC_M`.
    pub mantissa: u8,
}

impl ChannelSpacing {
    /// `MDMCFG1` with the exponent merged into `current`.
    pub const fn mdmcfg1(self, current: u8) -> u8 {
        (current & 0xF0) | (self.exponent & 0x03)
    }

    /// `MDMCFG0` register value.
    pub const fn mdmcfg0(self) -> u8 {
        self.mantissa
    }
}

impl Codec for ChannelSpacing {
    const QUANTITY: Quantity = Quantity::ChannelSpacing;

    fn from_hz(hz: u32) -> Self {
        let hz = f64::from(hz);
        let exponent = clamp_field(floor(log2(hz * pow2(10) / XOSC)), 3);
        let mantissa = clamp_field(
            floor(hz * pow2(18) / (XOSC * pow2(exponent)) - 256.0),
            u8::MAX,
        );
        Self { exponent, mantissa }
    }

    fn to_hz(self) -> u32 {
        floor(XOSC / pow2(18) * (256.0 + f64::from(self.mantissa)) * pow2(self.exponent)) as u32
    }
}

/// Symbol rate, `MDMCFG4[3:0]` and `MDMCFG3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct DataRate {
    /// `DRATE_E`, 0..=15.
    pub exponent: u8,
    /// `DRATE_M`.
    pub mantissa: u8,
}

impl DataRate {
    /// `MDMCFG4` with the exponent merged into `current`.
    ///
    /// The upper nibble holds the filter bandwidth and is preserved.
    pub const fn mdmcfg4(self, current: u8) -> u8 {
        (current & 0xF0) | (self.exponent & 0x0F)
    }

    /// `MDMCFG3` register value.
    pub const fn mdmcfg3(self) -> u8 {
        self.mantissa
    }
}

impl Codec for DataRate {
    const QUANTITY: Quantity = Quantity::DataRate;

    fn from_hz(baud: u32) -> Self {
        let baud = f64::from(baud);
        let exponent = clamp_field(floor(log2(baud * pow2(20) / XOSC)), 15);
        let mantissa = clamp_field(
            floor(baud * pow2(28) / (XOSC * pow2(exponent)) - 256.0),
            u8::MAX,
        );
        Self { exponent, mantissa }
    }

    fn to_hz(self) -> u32 {
        floor((256.0 + f64::from(self.mantissa)) * pow2(self.exponent) * XOSC / pow2(28)) as u32
    }
}

/// FSK deviation, `DEVIATN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Deviation {
    /// `DEVIATION_E`, 0..=7.
    pub exponent: u8,
    /// `DEVIATION_M`, 0..=7.
    pub mantissa: u8,
}

impl Deviation {
    /// `DEVIATN` register value.
    pub const fn deviatn(self) -> u8 {
        ((self.exponent & 0x07) << 4) | (self.mantissa & 0x07)
    }
}

impl Codec for Deviation {
    const QUANTITY: Quantity = Quantity::Deviation;

    fn from_hz(hz: u32) -> Self {
        let hz = f64::from(hz);
        let exponent = clamp_field(floor(log2(hz * pow2(14) / XOSC)), 7);
        let mantissa = clamp_field(floor(hz * pow2(17) / (pow2(exponent) * XOSC) - 8.0), 7);
        Self { exponent, mantissa }
    }

    fn to_hz(self) -> u32 {
        floor(XOSC * (8.0 + f64::from(self.mantissa)) * pow2(self.exponent) / pow2(17)) as u32
    }
}

/// Channel filter bandwidth, `MDMCFG4[7:4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Bandwidth {
    /// `CHANBW_E`, 0..=3.
    pub exponent: u8,
    /// `CHANBW_M`, 0..=3.
    pub mantissa: u8,
}

impl Bandwidth {
    /// `MDMCFG4` with the bandwidth merged into `current`.
    ///
    /// The lower nibble holds the data rate exponent and is preserved.
    pub const fn mdmcfg4(self, current: u8) -> u8 {
        ((self.exponent & 0x03) << 6) | ((self.mantissa & 0x03) << 4) | (current & 0x0F)
    }
}

impl Codec for Bandwidth {
    const QUANTITY: Quantity = Quantity::Bandwidth;

    fn from_hz(hz: u32) -> Self {
        let hz = f64::from(hz.max(1));
        let exponent = clamp_field(floor(log2(XOSC / (32.0 * hz))), 3);
        let mantissa = clamp_field(floor(XOSC / (8.0 * hz * pow2(exponent)) - 4.0), 3);
        Self { exponent, mantissa }
    }

    fn to_hz(self) -> u32 {
        floor(XOSC / (8.0 * (4.0 + f64::from(self.mantissa)) * pow2(self.exponent))) as u32
    }
}
