//! Instruction word encoding for the waveform sequencer.
//!
//! The sequencer executes 16-bit words laid out as
//!
//! ```text
//!  15..13   12..8                    7..0
//! +-------+------------------------+----------------+
//! |opcode | side-set + delay       | operands       |
//! +-------+------------------------+----------------+
//! ```
//!
//! The 5 bits in `12..8` are shared between the optional side-set and the
//! delay. With one antenna all 5 bits are delay (up to 32 cycles). With two
//! antennas bit 12 enables the side-set, bit 11 carries the second pin's
//! level, and only bits `10..8` remain for the delay (up to 8 cycles).
//!
//! Only the handful of instructions the backscatter program uses are modelled.

use core::fmt;

use super::AntennaMode;

const OP_JMP: u16 = 0x0000;
const OP_OUT: u16 = 0x6000;
const OP_MOV: u16 = 0xA000;
const OP_SET: u16 = 0xE000;
const OP_MASK: u16 = 0xE000;

const SIDE_SET_ENABLE: u16 = 0x1000;
const SIDE_SET_HIGH: u16 = 0x0800;

/// Largest jump target the 5-bit address field can hold.
pub const MAX_JMP_TARGET: u8 = 0x1F;

/// Registers addressed by `OUT` and `MOV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Register {
    /// Scratch register X, used as the loop counter.
    X,
    /// Scratch register Y, holds the symbol-1 repeat count.
    Y,
    /// Input shift register, holds the symbol-0 repeat count.
    Isr,
}

impl Register {
    const fn bits(self) -> u16 {
        match self {
            Register::X => 0b001,
            Register::Y => 0b010,
            Register::Isr => 0b110,
        }
    }

    const fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0b001 => Some(Register::X),
            0b010 => Some(Register::Y),
            0b110 => Some(Register::Isr),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Register::X => "x",
            Register::Y => "y",
            Register::Isr => "isr",
        }
    }
}

/// Branch condition of a `JMP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Condition {
    /// Unconditional.
    Always,
    /// Taken when X is zero.
    NotX,
    /// Taken when X is non-zero; X is decremented either way.
    XDec,
}

impl Condition {
    const fn bits(self) -> u16 {
        match self {
            Condition::Always => 0x00,
            Condition::NotX => 0x20,
            Condition::XDec => 0x40,
        }
    }

    const fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0x00 => Some(Condition::Always),
            0x20 => Some(Condition::NotX),
            0x40 => Some(Condition::XDec),
            _ => None,
        }
    }
}

/// A sequencer instruction before bit packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Instruction {
    /// Drive the antenna pin (and, with two antennas, the side-set pin).
    ///
    /// `delay` extra cycles are spent after the instruction executes.
    SetPins {
        /// Pin level.
        high: bool,
        /// Extra cycles, `0..AntennaMode::max_delay()`.
        delay: u8,
    },
    /// Shift `bits` bits from the output shift register into `dest`.
    ///
    /// A count of 32 is encoded as 0.
    Out {
        /// Destination register.
        dest: Register,
        /// Number of bits, `1..=32`.
        bits: u8,
    },
    /// Branch to an absolute instruction address.
    Jmp {
        /// Branch condition.
        condition: Condition,
        /// Target address, `0..=31`.
        target: u8,
    },
    /// Copy `src` into `dest`.
    Mov {
        /// Destination register.
        dest: Register,
        /// Source register.
        src: Register,
    },
}

impl Instruction {
    /// Packs the instruction into a 16-bit word for the given antenna mode.
    pub fn encode(self, mode: AntennaMode) -> u16 {
        match self {
            Instruction::SetPins { high, delay } => {
                let side = match mode {
                    AntennaMode::Single => 0,
                    AntennaMode::Dual if high => SIDE_SET_ENABLE | SIDE_SET_HIGH,
                    AntennaMode::Dual => SIDE_SET_ENABLE,
                };
                let delay = (u16::from(delay) & mode.delay_mask()) << 8;
                OP_SET | side | delay | u16::from(high)
            }
            Instruction::Out { dest, bits } => {
                OP_OUT | (dest.bits() << 5) | (u16::from(bits) & 0x1F)
            }
            Instruction::Jmp { condition, target } => {
                OP_JMP | condition.bits() | (u16::from(target) & u16::from(MAX_JMP_TARGET))
            }
            Instruction::Mov { dest, src } => OP_MOV | (dest.bits() << 5) | src.bits(),
        }
    }

    /// Recovers an instruction from a word produced by [`Instruction::encode`].
    ///
    /// Returns `None` for words outside the modelled subset.
    pub fn decode(word: u16, mode: AntennaMode) -> Option<Self> {
        match word & OP_MASK {
            OP_SET => Some(Instruction::SetPins {
                high: (word & 0x1F) != 0,
                delay: ((word >> 8) & mode.delay_mask()) as u8,
            }),
            OP_OUT => {
                let bits = (word & 0x1F) as u8;
                Some(Instruction::Out {
                    dest: Register::from_bits((word >> 5) & 0x7)?,
                    bits: if bits == 0 { 32 } else { bits },
                })
            }
            OP_JMP => Some(Instruction::Jmp {
                condition: Condition::from_bits(word & 0xE0)?,
                target: (word & u16::from(MAX_JMP_TARGET)) as u8,
            }),
            OP_MOV => Some(Instruction::Mov {
                dest: Register::from_bits((word >> 5) & 0x7)?,
                src: Register::from_bits(word & 0x7)?,
            }),
            _ => None,
        }
    }

    /// Clock cycles the instruction occupies, including its delay.
    pub fn cycles(self) -> u32 {
        match self {
            Instruction::SetPins { delay, .. } => 1 + u32::from(delay),
            _ => 1,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::SetPins { high, delay } => {
                let level = u8::from(high);
                write!(f, "set pins, {} side {} [{}]", level, level, delay)
            }
            Instruction::Out { dest, bits } => write!(f, "out {}, {}", dest.name(), bits),
            Instruction::Jmp { condition, target } => match condition {
                Condition::Always => write!(f, "jmp {}", target),
                Condition::NotX => write!(f, "jmp !x, {}", target),
                Condition::XDec => write!(f, "jmp x--, {}", target),
            },
            Instruction::Mov { dest, src } => write!(f, "mov {}, {}", dest.name(), src.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prologue_words() {
        let mode = AntennaMode::Dual;
        assert_eq!(
            Instruction::SetPins { high: true, delay: 0 }.encode(mode),
            0xF801
        );
        assert_eq!(
            Instruction::Out {
                dest: Register::Isr,
                bits: 32
            }
            .encode(mode),
            0x60C0
        );
        assert_eq!(
            Instruction::Out {
                dest: Register::Y,
                bits: 32
            }
            .encode(mode),
            0x6040
        );
        assert_eq!(
            Instruction::Out {
                dest: Register::X,
                bits: 1
            }
            .encode(mode),
            0x6021
        );
        assert_eq!(
            Instruction::Mov {
                dest: Register::X,
                src: Register::Y
            }
            .encode(mode),
            0xA022
        );
        assert_eq!(
            Instruction::Mov {
                dest: Register::X,
                src: Register::Isr
            }
            .encode(mode),
            0xA026
        );
    }

    #[test]
    fn test_encode_set_pins_per_mode() {
        let low = Instruction::SetPins {
            high: false,
            delay: 7,
        };
        assert_eq!(low.encode(AntennaMode::Dual), 0xF700);
        assert_eq!(low.encode(AntennaMode::Single), 0xE700);

        let high = Instruction::SetPins {
            high: true,
            delay: 31,
        };
        assert_eq!(high.encode(AntennaMode::Single), 0xFF01);
    }

    #[test]
    fn test_encode_jumps() {
        let jmp = |condition, target| Instruction::Jmp { condition, target };
        assert_eq!(jmp(Condition::Always, 3).encode(AntennaMode::Single), 0x0003);
        assert_eq!(jmp(Condition::NotX, 17).encode(AntennaMode::Single), 0x0031);
        assert_eq!(jmp(Condition::XDec, 6).encode(AntennaMode::Single), 0x0046);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let instructions = [
            Instruction::SetPins {
                high: true,
                delay: 5,
            },
            Instruction::SetPins {
                high: false,
                delay: 0,
            },
            Instruction::Out {
                dest: Register::Isr,
                bits: 32,
            },
            Instruction::Jmp {
                condition: Condition::XDec,
                target: 30,
            },
            Instruction::Mov {
                dest: Register::X,
                src: Register::Y,
            },
        ];
        for mode in [AntennaMode::Single, AntennaMode::Dual] {
            for instruction in instructions {
                assert_eq!(
                    Instruction::decode(instruction.encode(mode), mode),
                    Some(instruction)
                );
            }
        }
    }

    #[test]
    fn test_decode_rejects_unmodelled_words() {
        // WAIT opcode
        assert_eq!(Instruction::decode(0x2000, AntennaMode::Single), None);
    }
}
