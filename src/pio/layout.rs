//! First synthesis pass: instruction counts and label addresses.
//!
//! Everything here is closed-form arithmetic over the timing plan, so the
//! program size is known, and checked against the instruction store, before a
//! single word is emitted.
//!
//! ```text
//!  0  set pins, 1 side 1        ; antenna on while idle
//!  1  out isr, 32               ; symbol-0 repeat count
//!  2  out y, 32                 ; symbol-1 repeat count
//!  3  get_symbol: out x, 1
//!  4  jmp !x, send_0
//!  5  send_1: mov x, y
//!     loop_1: <high chain> <low chain> jmp x--, loop_1
//!             <tail high chain> <tail low chain> jmp get_symbol
//!     send_0: mov x, isr
//!     loop_0: <high chain> <low chain> jmp x--, loop_0
//!             <tail high chain> <tail low chain> jmp get_symbol
//! ```

use crate::timing::{SymbolPlan, TimingPlan};

use super::AntennaMode;

/// Instructions before `get_symbol`.
pub const PROLOGUE_LEN: u32 = 3;
/// Address of `get_symbol`.
pub const GET_SYMBOL: u32 = PROLOGUE_LEN;
/// Address of `send_1`, right after `out x, 1` and `jmp !x`.
pub const SEND_1: u32 = GET_SYMBOL + 2;

/// Number of chained `SET` instructions needed to spend `delay` cycles.
///
/// Each instruction covers at most `cap` cycles (one for execution plus up to
/// `cap - 1` delay). A zero delay needs no instruction.
pub const fn instruction_count(delay: u32, cap: u32) -> u32 {
    if delay % cap == 0 {
        delay / cap
    } else {
        delay / cap + 1
    }
}

/// Splits a delay into per-instruction delay operands.
///
/// Yields `min(cap, remaining) - 1` until the whole delay is spent, so the
/// operands plus one cycle each sum to the requested delay.
#[derive(Debug, Clone)]
pub struct DelayChain {
    remaining: u32,
    cap: u32,
}

impl DelayChain {
    /// Chain for `delay` cycles with at most `cap` cycles per instruction.
    pub const fn new(delay: u32, cap: u32) -> Self {
        Self {
            remaining: delay,
            cap,
        }
    }
}

impl Iterator for DelayChain {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        let chunk = self.remaining.min(self.cap);
        self.remaining -= chunk;
        Some((chunk - 1) as u8)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = instruction_count(self.remaining, self.cap) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for DelayChain {}

/// Length of one symbol block, including its leading `mov`.
///
/// `mov` + high chain + low chain + `jmp x--` + tail high + tail low + `jmp`.
pub fn block_len(symbol: &SymbolPlan, cap: u32) -> u32 {
    1 + instruction_count(symbol.high_cycles(), cap)
        + instruction_count(symbol.low_cycles(), cap)
        + 1
        + instruction_count(symbol.tail_high, cap)
        + instruction_count(symbol.tail_low, cap)
        + 1
}

/// Label addresses and total length of a program.
///
/// Addresses are kept as `u32` so an oversized layout can still be reported
/// before anything is narrowed to the 5-bit jump field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Layout {
    /// Start of the symbol-1 block (`mov x, y`).
    pub send_1: u32,
    /// Start of the symbol-1 toggle loop.
    pub loop_1: u32,
    /// Start of the symbol-0 block (`mov x, isr`).
    pub send_0: u32,
    /// Start of the symbol-0 toggle loop.
    pub loop_0: u32,
    /// Total number of instructions.
    pub length: u32,
}

impl Layout {
    /// Computes the layout for a timing plan in the given antenna mode.
    pub fn new(plan: &TimingPlan, mode: AntennaMode) -> Self {
        let cap = mode.max_delay();
        let send_0 = SEND_1 + block_len(&plan.one, cap);
        Self {
            send_1: SEND_1,
            loop_1: SEND_1 + 1,
            send_0,
            loop_0: send_0 + 1,
            length: send_0 + block_len(&plan.zero, cap),
        }
    }
}
