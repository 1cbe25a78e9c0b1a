//! Waveform program synthesis and the backscatter transmitter.
//!
//! The tag imprints symbols onto an external carrier by toggling its antenna
//! switch. Symbol 0 toggles with period `divider0`, symbol 1 with `divider1`,
//! both counted in sequencer clock cycles. The reflected signal therefore
//! appears at two offsets from the carrier and a standard 2-FSK receiver can
//! demodulate it.
//!
//! This module compiles a [`SymbolTiming`] into a [`WaveformProgram`] for a
//! programmable I/O sequencer and drives that sequencer through the
//! [`Sequencer`] trait:
//!
//! - [`encoding`]: 16-bit instruction words
//! - [`layout`]: first pass, instruction counts and labels
//! - [`synth`]: second pass, emission, plus [`synthesize`]
//!
//! ## Example
//!
//! ```rust
//! use backscatter::consts::SEQUENCER_CLOCK_HZ;
//! use backscatter::pio::{AntennaMode, synthesize};
//! use backscatter::timing::SymbolTiming;
//!
//! let report = synthesize(
//!     &SymbolTiming::new(20, 18, 100_000),
//!     AntennaMode::Dual,
//!     SEQUENCER_CLOCK_HZ,
//! )
//! .unwrap();
//! assert_eq!(report.value.program.length(), 20);
//! assert_eq!(report.value.radio.deviation, 347_222);
//! ```

use core::fmt;

use heapless::Vec;
use nb::block;
use thiserror::Error;

use crate::consts::INSTRUCTION_MEMORY_LEN;
use crate::radio::RadioConfig;
use crate::report::Reported;
use crate::timing::{SymbolTiming, TimingError};

pub mod encoding;
pub mod layout;
pub mod synth;

pub use synth::{Synthesis, synthesize};

use encoding::Instruction;

/// How many antenna switches the sequencer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum AntennaMode {
    /// One pin; the full 5-bit delay field is available.
    Single,
    /// Two pins, the second one driven through side-set; 3 delay bits remain.
    #[default]
    Dual,
}

impl AntennaMode {
    /// Largest number of cycles one instruction can occupy.
    pub const fn max_delay(self) -> u32 {
        match self {
            AntennaMode::Single => 32,
            AntennaMode::Dual => 8,
        }
    }

    /// Side-set pins used by the program.
    pub const fn side_set_pins(self) -> u8 {
        match self {
            AntennaMode::Single => 0,
            AntennaMode::Dual => 1,
        }
    }

    pub(crate) const fn delay_mask(self) -> u16 {
        (self.max_delay() - 1) as u16
    }
}

/// Hard synthesis failures. Nothing is loaded when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SynthesisError {
    /// The timing parameters cannot produce a waveform.
    #[error(transparent)]
    Timing(#[from] TimingError),
    /// The program would not fit the instruction store.
    #[error("the program needs {required} instructions but only {capacity} are available")]
    ProgramTooLarge {
        /// Instructions the layout needs.
        required: u32,
        /// Size of the instruction store.
        capacity: usize,
    },
}

/// A compiled program ready to be loaded into the sequencer.
///
/// The program is self-looping: it wraps from its last instruction back to
/// the first, and the two repeat counts must be pushed into the FIFO right
/// after loading (symbol 0 first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformProgram {
    instructions: Vec<u16, INSTRUCTION_MEMORY_LEN>,
    mode: AntennaMode,
    repeat_counts: [u32; 2],
}

impl WaveformProgram {
    pub(crate) fn new(
        instructions: Vec<u16, INSTRUCTION_MEMORY_LEN>,
        mode: AntennaMode,
        repeat_counts: [u32; 2],
    ) -> Self {
        Self {
            instructions,
            mode,
            repeat_counts,
        }
    }

    /// Encoded instruction words.
    pub fn instructions(&self) -> &[u16] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn length(&self) -> u8 {
        self.instructions.len() as u8
    }

    /// First instruction executed after a wrap.
    pub fn wrap_start(&self) -> u8 {
        0
    }

    /// Last instruction before wrapping to [`wrap_start`](Self::wrap_start).
    pub fn wrap_end(&self) -> u8 {
        self.wrap_start() + self.length().saturating_sub(1)
    }

    /// Antenna mode the words were encoded for.
    pub fn mode(&self) -> AntennaMode {
        self.mode
    }

    /// Loop counter values for symbol 0 and symbol 1, in push order.
    pub fn repeat_counts(&self) -> [u32; 2] {
        self.repeat_counts
    }
}

impl fmt::Display for WaveformProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (address, &word) in self.instructions.iter().enumerate() {
            write!(f, "{:2}: {:04x}", address, word)?;
            if let Some(instruction) = Instruction::decode(word, self.mode) {
                write!(f, "  {}", instruction)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A programmable I/O sequencer able to run a [`WaveformProgram`].
///
/// Implemented by the board support code on top of the HAL's state machine
/// API. Words pushed through [`push`](Sequencer::push) are shifted out MSB
/// first, one bit per symbol.
pub trait Sequencer {
    /// Error raised by the underlying peripheral.
    type Error;

    /// Stops the running program, if any, and installs `program`.
    ///
    /// Wrapping, side-set and pin configuration follow
    /// [`WaveformProgram::mode`] and the wrap bounds. The sequencer must be
    /// running and waiting for FIFO data when this returns.
    fn load(&mut self, program: &WaveformProgram) -> Result<(), Self::Error>;

    /// Pushes one word into the transmit FIFO.
    ///
    /// Returns `WouldBlock` while the FIFO is full.
    fn push(&mut self, word: u32) -> nb::Result<(), Self::Error>;
}

/// Failure while (re)configuring the transmitter.
#[derive(Debug, Error)]
pub enum BackscatterError<E> {
    /// The requested timing cannot be compiled; the running program is kept.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    /// The sequencer refused the program or the repeat counts.
    #[error("sequencer error")]
    Sequencer(E),
}

/// Backscatter transmitter driving a [`Sequencer`].
///
/// Owns the sequencer and the program currently loaded into it. A new program
/// only replaces the old one once it has been synthesized successfully.
#[derive(Debug)]
pub struct Backscatter<S> {
    sequencer: S,
    mode: AntennaMode,
    active: Option<Synthesis>,
}

impl<S: Sequencer> Backscatter<S> {
    /// Wraps a sequencer. Nothing is loaded until [`configure`](Self::configure).
    pub fn new(sequencer: S, mode: AntennaMode) -> Self {
        Self {
            sequencer,
            mode,
            active: None,
        }
    }

    /// Compiles and loads a program for `timing`.
    ///
    /// # Returns
    /// - `Ok`: the receiver configuration matching the new waveform, with the
    ///   synthesis advisories
    /// - `Err(Synthesis)`: nothing was touched, the previous program keeps
    ///   running
    /// - `Err(Sequencer)`: the peripheral failed while loading
    pub fn configure(
        &mut self,
        timing: &SymbolTiming,
        clock_hz: u32,
    ) -> Result<Reported<RadioConfig>, BackscatterError<S::Error>> {
        let report = synthesize(timing, self.mode, clock_hz)?;
        let mut outer = Reported::new(());
        let synthesis = outer.absorb(report);

        self.sequencer
            .load(&synthesis.program)
            .map_err(BackscatterError::Sequencer)?;
        for count in synthesis.program.repeat_counts() {
            block!(self.sequencer.push(count)).map_err(BackscatterError::Sequencer)?;
        }
        info!(
            "loaded {} instructions, {} Baud",
            synthesis.program.length(),
            synthesis.plan.baud
        );

        let radio = synthesis.radio;
        self.active = Some(synthesis);
        Ok(outer.map(|()| radio))
    }

    /// Shifts `words` out through the sequencer, blocking while the FIFO is full.
    pub fn send(&mut self, words: &[u32]) -> Result<(), S::Error> {
        for &word in words {
            block!(self.sequencer.push(word))?;
        }
        Ok(())
    }

    /// Result of the last successful [`configure`](Self::configure).
    pub fn active(&self) -> Option<&Synthesis> {
        self.active.as_ref()
    }

    /// Antenna mode used for the next synthesis.
    pub fn mode(&self) -> AntennaMode {
        self.mode
    }

    /// Changes the antenna mode. Takes effect on the next [`configure`](Self::configure).
    pub fn set_mode(&mut self, mode: AntennaMode) {
        self.mode = mode;
    }

    /// Gives the sequencer back.
    pub fn release(self) -> S {
        self.sequencer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SEQUENCER_CLOCK_HZ;
    use std::vec::Vec as StdVec;

    #[derive(Debug, Default)]
    struct FakeSequencer {
        loaded: StdVec<StdVec<u16>>,
        pushed: StdVec<u32>,
        stalls: usize,
    }

    impl Sequencer for FakeSequencer {
        type Error = ();

        fn load(&mut self, program: &WaveformProgram) -> Result<(), ()> {
            self.loaded.push(program.instructions().to_vec());
            Ok(())
        }

        fn push(&mut self, word: u32) -> nb::Result<(), ()> {
            if self.stalls > 0 {
                self.stalls -= 1;
                return Err(nb::Error::WouldBlock);
            }
            self.pushed.push(word);
            Ok(())
        }
    }

    #[test]
    fn test_configure_loads_and_pushes_repeat_counts() {
        let mut tx = Backscatter::new(FakeSequencer::default(), AntennaMode::Dual);
        let report = tx
            .configure(&SymbolTiming::new(20, 18, 100_000), SEQUENCER_CLOCK_HZ)
            .unwrap();
        assert_eq!(report.value.baudrate, 100_000);

        let sequencer = tx.release();
        assert_eq!(sequencer.loaded.len(), 1);
        assert_eq!(sequencer.loaded[0].len(), 20);
        assert_eq!(sequencer.pushed, [61, 68]);
    }

    #[test]
    fn test_failed_configure_keeps_program() {
        let mut tx = Backscatter::new(FakeSequencer::default(), AntennaMode::Dual);
        let _ = tx
            .configure(&SymbolTiming::new(20, 18, 100_000), SEQUENCER_CLOCK_HZ)
            .unwrap();
        let before = tx.active().cloned();

        let result = tx.configure(&SymbolTiming::new(120, 100, 50_000), SEQUENCER_CLOCK_HZ);
        assert!(matches!(
            result,
            Err(BackscatterError::Synthesis(SynthesisError::ProgramTooLarge { .. }))
        ));
        assert_eq!(tx.active().cloned(), before);

        let sequencer = tx.release();
        assert_eq!(sequencer.loaded.len(), 1);
        assert_eq!(sequencer.pushed.len(), 2);
    }

    #[test]
    fn test_send_waits_for_fifo_space() {
        let sequencer = FakeSequencer {
            stalls: 3,
            ..Default::default()
        };
        let mut tx = Backscatter::new(sequencer, AntennaMode::Single);
        tx.send(&[0xAAAA_AAAA, 0xD391_D391]).unwrap();
        assert_eq!(tx.release().pushed, [0xAAAA_AAAA, 0xD391_D391]);
    }

    #[test]
    fn test_program_listing() {
        let synthesis = synthesize(
            &SymbolTiming::new(20, 18, 100_000),
            AntennaMode::Dual,
            SEQUENCER_CLOCK_HZ,
        )
        .unwrap()
        .value;
        let listing = std::format!("{}", synthesis.program);
        let mut lines = listing.lines();
        assert_eq!(lines.next(), Some(" 0: f801  set pins, 1 side 1 [0]"));
        assert_eq!(lines.next(), Some(" 1: 60c0  out isr, 32"));
        assert_eq!(lines.nth(2), Some(" 4: 002c  jmp !x, 12"));
        assert_eq!(listing.lines().count(), 20);
    }
}
