//! Advisory diagnostics carried alongside successful results.
//!
//! Nothing in the synthesizer or the codec fails because a value is merely
//! suboptimal. Such conditions are collected as [`Advisory`] entries inside a
//! [`Reported`] value, logged at `warn` level as they are raised, and left for
//! the caller to inspect. Hard failures use `Result::Err` instead.

use core::fmt;

use heapless::Vec;

use crate::radio::ReceiverChip;
use crate::timing::Symbol;

/// Maximum number of advisories a single operation can raise.
pub const MAX_ADVISORIES: usize = 8;

/// Physical quantity handled by the radio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Quantity {
    /// Carrier / centre frequency.
    Frequency,
    /// Symbol rate.
    DataRate,
    /// FSK frequency deviation.
    Deviation,
    /// Channel filter bandwidth.
    Bandwidth,
    /// Channel spacing.
    ChannelSpacing,
}

impl Quantity {
    /// Short lowercase name used in log and console output.
    pub const fn name(self) -> &'static str {
        match self {
            Quantity::Frequency => "frequency",
            Quantity::DataRate => "data rate",
            Quantity::Deviation => "deviation",
            Quantity::Bandwidth => "bandwidth",
            Quantity::ChannelSpacing => "channel spacing",
        }
    }
}

/// A non-fatal condition worth telling the operator about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Advisory {
    /// A clock divider is odd; the toggle pattern will be asymmetric.
    OddDivider {
        /// Symbol the divider belongs to.
        symbol: Symbol,
        /// The offending divider.
        divider: u16,
    },
    /// The requested baud rate is not an integer fraction of the clock.
    BaudSubstituted {
        /// Baud rate asked for.
        requested: u32,
        /// Closest achievable baud rate, used instead.
        achieved: u32,
    },
    /// The deviation exceeds what a receiver chip can demodulate.
    DeviationCeiling {
        /// Receiver whose limit is exceeded.
        chip: ReceiverChip,
        /// Computed deviation in Hz.
        deviation: u32,
    },
    /// Symbol 0 was given the higher toggle frequency.
    DividerOrder {
        /// Divider for symbol 0.
        divider0: u16,
        /// Divider for symbol 1.
        divider1: u16,
    },
    /// A register encoding could not represent the value exactly.
    Quantized {
        /// Which quantity was encoded.
        quantity: Quantity,
        /// Value asked for.
        requested: u32,
        /// Value the register fields produce.
        achieved: u32,
    },
}

impl Advisory {
    fn log(&self) {
        match *self {
            Advisory::OddDivider { divider, .. } => {
                warn!("clock divider {} is odd; the waveform may be distorted", divider)
            }
            Advisory::BaudSubstituted { requested, achieved } => {
                warn!("{} Baud is not achievable, using {} Baud", requested, achieved)
            }
            Advisory::DeviationCeiling { chip, deviation } => {
                warn!(
                    "deviation {} Hz exceeds the {} limit",
                    deviation,
                    chip.name()
                )
            }
            Advisory::DividerOrder { divider0, divider1 } => {
                warn!(
                    "symbol 0 (divider {}) is mapped to a higher frequency than symbol 1 (divider {})",
                    divider0,
                    divider1
                )
            }
            Advisory::Quantized {
                quantity,
                requested,
                achieved,
            } => {
                debug!("{} {} Hz quantized to {} Hz", quantity.name(), requested, achieved)
            }
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Advisory::OddDivider { symbol, divider } => write!(
                f,
                "WARNING: the clock divider d{} = {} is not even",
                symbol.index(),
                divider
            ),
            Advisory::BaudSubstituted { requested, achieved } => write!(
                f,
                "WARNING: {} Baud is not achievable, using {} Baud",
                requested, achieved
            ),
            Advisory::DeviationCeiling { chip, deviation } => write!(
                f,
                "WARNING: the deviation {} Hz is too large for the {}",
                deviation,
                chip.name()
            ),
            Advisory::DividerOrder { .. } => write!(
                f,
                "WARNING: symbol 0 has been assigned to a larger frequency than symbol 1"
            ),
            Advisory::Quantized {
                quantity,
                requested,
                achieved,
            } => write!(
                f,
                "{}: requested {} Hz, achieved {} Hz",
                quantity.name(),
                requested,
                achieved
            ),
        }
    }
}

/// A successful result with zero or more advisories attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reported<T> {
    /// The result itself.
    pub value: T,
    /// Advisories raised while producing `value`.
    pub advisories: Vec<Advisory, MAX_ADVISORIES>,
}

impl<T> Reported<T> {
    /// Wraps a value with no advisories.
    pub fn new(value: T) -> Self {
        Self {
            value,
            advisories: Vec::new(),
        }
    }

    /// Records and logs an advisory.
    ///
    /// Advisories beyond [`MAX_ADVISORIES`] are logged but not kept.
    pub fn raise(&mut self, advisory: Advisory) {
        advisory.log();
        let _ = self.advisories.push(advisory);
    }

    /// Appends the advisories of another report, keeping its value aside.
    pub fn absorb<U>(&mut self, other: Reported<U>) -> U {
        for advisory in other.advisories {
            let _ = self.advisories.push(advisory);
        }
        other.value
    }

    /// `true` when nothing was raised.
    pub fn is_clean(&self) -> bool {
        self.advisories.is_empty()
    }

    /// Transforms the value, keeping the advisories.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Reported<U> {
        Reported {
            value: f(self.value),
            advisories: self.advisories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_clean() {
        let report = Reported::new(7u32);
        assert!(report.is_clean());
        assert_eq!(report.value, 7);
    }

    #[test]
    fn test_absorb_moves_advisories() {
        let mut outer = Reported::new(());
        let mut inner = Reported::new(3u8);
        inner.raise(Advisory::DividerOrder {
            divider0: 18,
            divider1: 20,
        });
        let value = outer.absorb(inner);
        assert_eq!(value, 3);
        assert_eq!(outer.advisories.len(), 1);
    }

    #[test]
    fn test_overflowing_advisories_are_dropped() {
        let mut report = Reported::new(());
        for i in 0..(MAX_ADVISORIES as u32 + 3) {
            report.raise(Advisory::Quantized {
                quantity: Quantity::DataRate,
                requested: i,
                achieved: 0,
            });
        }
        assert_eq!(report.advisories.len(), MAX_ADVISORIES);
    }
}
