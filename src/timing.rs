//! Symbol timing planner.
//!
//! Derives, for each of the two symbols, how many full antenna toggle periods
//! fit into one symbol at the requested baud rate and how the leftover cycles
//! are split so the symbol ends exactly on time.
//!
//! All quantities are counted in cycles of the sequencer clock
//! ([`SEQUENCER_CLOCK_HZ`](crate::consts::SEQUENCER_CLOCK_HZ)):
//!
//! | Quantity        | Formula                                         |
//! |-----------------|-------------------------------------------------|
//! | `symbol_cycles` | `floor(clock / baud) - 4`                       |
//! | `full_periods`  | `symbol_cycles / divider`                       |
//! | `remainder`     | `symbol_cycles % divider`                       |
//! | `tail_high`     | `min(remainder, divider / 2)`                   |
//! | `tail_low`      | `remainder - tail_high`                         |
//!
//! The planner emits no instructions; see [`crate::pio`] for that.

use libm::round;
use thiserror::Error;

use crate::consts::{SYMBOL_OVERHEAD_CYCLES, TX_MARGIN_MS};
use crate::report::{Advisory, Reported};

/// One of the two transmitted symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Symbol {
    /// Logical `0`.
    Zero,
    /// Logical `1`.
    One,
}

impl Symbol {
    /// `0` or `1`.
    pub const fn index(self) -> u8 {
        match self {
            Symbol::Zero => 0,
            Symbol::One => 1,
        }
    }
}

/// Timing parameters chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct SymbolTiming {
    /// Toggle period of symbol 0 in clock cycles. Should be even.
    pub divider0: u16,
    /// Toggle period of symbol 1 in clock cycles. Should be even.
    pub divider1: u16,
    /// Requested symbol rate.
    pub baud: u32,
}

impl SymbolTiming {
    /// Bundles the three timing parameters.
    pub const fn new(divider0: u16, divider1: u16, baud: u32) -> Self {
        Self {
            divider0,
            divider1,
            baud,
        }
    }

    /// Divider of the given symbol.
    pub const fn divider(&self, symbol: Symbol) -> u16 {
        match symbol {
            Symbol::Zero => self.divider0,
            Symbol::One => self.divider1,
        }
    }
}

/// Timing parameters that cannot produce a waveform at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TimingError {
    /// A baud rate of zero was requested.
    #[error("the baud rate must be positive")]
    ZeroBaud,
    /// A divider below two leaves no room for a high and a low half.
    #[error("clock divider {divider} is too small, it must be at least 2")]
    DividerTooSmall {
        /// The offending divider.
        divider: u16,
    },
    /// The symbol is shorter than the fixed control-flow overhead.
    #[error("{baud} Baud leaves no cycles per symbol for toggling")]
    BaudTooHigh {
        /// Baud rate after correction.
        baud: u32,
    },
    /// Not even one toggle period fits into the symbol.
    #[error("clock divider {divider} is longer than the {symbol_cycles}-cycle symbol")]
    DividerExceedsSymbol {
        /// The offending divider.
        divider: u16,
        /// Usable cycles per symbol.
        symbol_cycles: u32,
    },
}

/// Cycle budget for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct SymbolPlan {
    /// Toggle period in clock cycles.
    pub divider: u16,
    /// Number of complete toggle periods per symbol.
    pub full_periods: u32,
    /// Cycles left after the full periods.
    pub remainder: u32,
    /// Part of the remainder spent with the antenna switched on.
    pub tail_high: u32,
    /// Part of the remainder spent with the antenna switched off.
    pub tail_low: u32,
}

impl SymbolPlan {
    fn new(divider: u16, symbol_cycles: u32) -> Result<Self, TimingError> {
        let d = u32::from(divider);
        let full_periods = symbol_cycles / d;
        if full_periods == 0 {
            return Err(TimingError::DividerExceedsSymbol {
                divider,
                symbol_cycles,
            });
        }
        let remainder = symbol_cycles % d;
        let tail_high = remainder.min(d / 2);
        Ok(Self {
            divider,
            full_periods,
            remainder,
            tail_high,
            tail_low: remainder - tail_high,
        })
    }

    /// Cycles the antenna is on within one full period.
    pub const fn high_cycles(&self) -> u32 {
        self.divider as u32 / 2
    }

    /// Delay cycles of the "off" instruction within one full period.
    ///
    /// One cycle less than the high half; the loop jump supplies the last one.
    pub const fn low_cycles(&self) -> u32 {
        self.divider as u32 / 2 - 1
    }

    /// Value loaded into the loop counter.
    ///
    /// `JMP x--` still branches when `x` is zero, so the count is one short.
    pub const fn repeat_count(&self) -> u32 {
        self.full_periods - 1
    }
}

/// Complete timing plan for both symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TimingPlan {
    /// Baud rate actually produced (possibly corrected).
    pub baud: u32,
    /// Usable cycles per symbol after the fixed overhead.
    pub symbol_cycles: u32,
    /// Budget for symbol 0.
    pub zero: SymbolPlan,
    /// Budget for symbol 1.
    pub one: SymbolPlan,
}

impl TimingPlan {
    /// Budget for the given symbol.
    pub const fn symbol(&self, symbol: Symbol) -> &SymbolPlan {
        match symbol {
            Symbol::Zero => &self.zero,
            Symbol::One => &self.one,
        }
    }
}

/// Closest baud rate that divides the clock into a whole number of cycles.
///
/// # Arguments
/// - `clock_hz`: sequencer clock in Hz
/// - `baud`: requested symbol rate, must be non-zero
///
/// # Returns
/// `baud` itself if it divides `clock_hz`, otherwise
/// `round(clock_hz / round(clock_hz / baud))`.
pub fn achievable_baud(clock_hz: u32, baud: u32) -> u32 {
    if clock_hz % baud == 0 {
        return baud;
    }
    let clock = clock_hz as f64;
    let cycles = round(clock / baud as f64);
    round(clock / cycles) as u32
}

/// Plans both symbols for the given timing.
///
/// # Returns
/// - `Ok`: the plan, with advisories for odd dividers and baud substitution
/// - `Err`: the parameters cannot produce a waveform
pub fn plan(timing: &SymbolTiming, clock_hz: u32) -> Result<Reported<TimingPlan>, TimingError> {
    if timing.baud == 0 {
        return Err(TimingError::ZeroBaud);
    }
    for divider in [timing.divider0, timing.divider1] {
        if divider < 2 {
            return Err(TimingError::DividerTooSmall { divider });
        }
    }

    let mut advisories = Reported::new(());
    for symbol in [Symbol::Zero, Symbol::One] {
        let divider = timing.divider(symbol);
        if divider % 2 != 0 {
            advisories.raise(Advisory::OddDivider { symbol, divider });
        }
    }

    let baud = achievable_baud(clock_hz, timing.baud);
    if baud != timing.baud {
        advisories.raise(Advisory::BaudSubstituted {
            requested: timing.baud,
            achieved: baud,
        });
    }

    let cycles_per_symbol = clock_hz / baud;
    if cycles_per_symbol <= SYMBOL_OVERHEAD_CYCLES {
        return Err(TimingError::BaudTooHigh { baud });
    }
    let symbol_cycles = cycles_per_symbol - SYMBOL_OVERHEAD_CYCLES;

    let plan = TimingPlan {
        baud,
        symbol_cycles,
        zero: SymbolPlan::new(timing.divider0, symbol_cycles)?,
        one: SymbolPlan::new(timing.divider1, symbol_cycles)?,
    };
    Ok(advisories.map(|()| plan))
}

/// Time the sequencer needs to shift out `words` FIFO words, plus margin.
///
/// # Arguments
/// - `words`: number of 32-bit words pushed to the sequencer
/// - `baud`: symbol rate in effect
///
/// # Returns
/// `ceil(words * 32 / baud)` in milliseconds plus [`TX_MARGIN_MS`].
pub fn tx_duration_ms(words: usize, baud: u32) -> u32 {
    let bits_ms = words as u64 * 32 * 1_000;
    let air_ms = bits_ms.div_ceil(u64::from(baud.max(1)));
    air_ms as u32 + TX_MARGIN_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SEQUENCER_CLOCK_HZ;

    #[test]
    fn test_plan_default_timing() {
        let report = plan(&SymbolTiming::new(20, 18, 100_000), SEQUENCER_CLOCK_HZ).unwrap();
        assert!(report.is_clean());
        let p = report.value;
        assert_eq!(p.baud, 100_000);
        assert_eq!(p.symbol_cycles, 1246);
        // 1246 = 62 * 20 + 6
        assert_eq!(p.zero.full_periods, 62);
        assert_eq!(p.zero.remainder, 6);
        assert_eq!(p.zero.tail_high, 6);
        assert_eq!(p.zero.tail_low, 0);
        assert_eq!(p.zero.repeat_count(), 61);
        // 1246 = 69 * 18 + 4
        assert_eq!(p.one.full_periods, 69);
        assert_eq!(p.one.remainder, 4);
        assert_eq!(p.one.repeat_count(), 68);
    }

    #[test]
    fn test_remainder_split_caps_high_half() {
        // 2496 usable cycles: 2496 % 38 = 26 -> 19 high, 7 low
        let p = plan(&SymbolTiming::new(40, 38, 50_000), SEQUENCER_CLOCK_HZ)
            .unwrap()
            .value;
        assert_eq!(p.one.remainder, 26);
        assert_eq!(p.one.tail_high, 19);
        assert_eq!(p.one.tail_low, 7);
        assert_eq!(p.zero.remainder, 16);
        assert_eq!(p.zero.tail_high, 16);
        assert_eq!(p.zero.tail_low, 0);
    }

    #[test]
    fn test_baud_substitution_is_advisory() {
        let report = plan(&SymbolTiming::new(20, 18, 115_200), SEQUENCER_CLOCK_HZ).unwrap();
        assert_eq!(report.value.baud, 115_207);
        assert_eq!(
            report.advisories[0],
            Advisory::BaudSubstituted {
                requested: 115_200,
                achieved: 115_207
            }
        );
    }

    #[test]
    fn test_odd_dividers_are_advisory() {
        let report = plan(&SymbolTiming::new(21, 19, 100_000), SEQUENCER_CLOCK_HZ).unwrap();
        assert_eq!(report.advisories.len(), 2);
        assert!(matches!(
            report.advisories[0],
            Advisory::OddDivider {
                symbol: Symbol::Zero,
                divider: 21
            }
        ));
    }

    #[test]
    fn test_invalid_timing_is_rejected() {
        assert_eq!(
            plan(&SymbolTiming::new(20, 18, 0), SEQUENCER_CLOCK_HZ),
            Err(TimingError::ZeroBaud)
        );
        assert_eq!(
            plan(&SymbolTiming::new(0, 18, 100_000), SEQUENCER_CLOCK_HZ),
            Err(TimingError::DividerTooSmall { divider: 0 })
        );
        assert_eq!(
            plan(&SymbolTiming::new(20, 18, 40_000_000), SEQUENCER_CLOCK_HZ),
            Err(TimingError::BaudTooHigh { baud: 41_666_667 })
        );
        assert!(matches!(
            plan(&SymbolTiming::new(2000, 18, 100_000), SEQUENCER_CLOCK_HZ),
            Err(TimingError::DividerExceedsSymbol { divider: 2000, .. })
        ));
    }

    #[test]
    fn test_achievable_baud() {
        assert_eq!(achievable_baud(125_000_000, 100_000), 100_000);
        assert_eq!(achievable_baud(125_000_000, 125_000), 125_000);
        assert_eq!(achievable_baud(125_000_000, 300_000), 299_760);
    }

    #[test]
    fn test_tx_duration() {
        // 6 words * 32 bit at 100 kBaud = 1.92 ms -> 2 ms + margin
        assert_eq!(tx_duration_ms(6, 100_000), 2 + TX_MARGIN_MS);
        assert_eq!(tx_duration_ms(6, 1_000), 192 + TX_MARGIN_MS);
    }
}
