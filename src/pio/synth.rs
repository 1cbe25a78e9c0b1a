//! Second synthesis pass: instruction emission.
//!
//! `emit` turns a [`TimingPlan`] and its already validated [`Layout`] into
//! encoded words. [`synthesize`] runs both passes and derives the matching
//! receiver configuration.

use heapless::Vec;

use crate::consts::INSTRUCTION_MEMORY_LEN;
use crate::radio::RadioConfig;
use crate::report::Reported;
use crate::timing::{SymbolPlan, SymbolTiming, TimingPlan, plan};

use super::encoding::{Condition, Instruction, Register};
use super::layout::{DelayChain, GET_SYMBOL, Layout};
use super::{AntennaMode, SynthesisError, WaveformProgram};

/// Everything produced by one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// Program ready to be loaded.
    pub program: WaveformProgram,
    /// The timing it realizes.
    pub plan: TimingPlan,
    /// Receiver settings matching the two toggle frequencies.
    pub radio: RadioConfig,
}

type Words = Vec<u16, INSTRUCTION_MEMORY_LEN>;

fn push(words: &mut Words, instruction: Instruction, mode: AntennaMode) {
    // the layout pass already bounded the length
    let _ = words.push(instruction.encode(mode));
}

fn push_chain(words: &mut Words, delay: u32, high: bool, mode: AntennaMode) {
    for operand in DelayChain::new(delay, mode.max_delay()) {
        push(
            words,
            Instruction::SetPins {
                high,
                delay: operand,
            },
            mode,
        );
    }
}

fn jmp(condition: Condition, target: u32) -> Instruction {
    Instruction::Jmp {
        condition,
        target: target as u8,
    }
}

fn emit_block(
    words: &mut Words,
    symbol: &SymbolPlan,
    source: Register,
    loop_start: u32,
    mode: AntennaMode,
) {
    push(
        words,
        Instruction::Mov {
            dest: Register::X,
            src: source,
        },
        mode,
    );
    push_chain(words, symbol.high_cycles(), true, mode);
    push_chain(words, symbol.low_cycles(), false, mode);
    push(words, jmp(Condition::XDec, loop_start), mode);
    push_chain(words, symbol.tail_high, true, mode);
    push_chain(words, symbol.tail_low, false, mode);
    push(words, jmp(Condition::Always, GET_SYMBOL), mode);
}

/// Emits the program words for a layout that fits the instruction store.
pub(crate) fn emit(
    plan: &TimingPlan,
    layout: &Layout,
    mode: AntennaMode,
) -> Vec<u16, INSTRUCTION_MEMORY_LEN> {
    let mut words = Words::new();

    push(
        &mut words,
        Instruction::SetPins {
            high: true,
            delay: 0,
        },
        mode,
    );
    push(
        &mut words,
        Instruction::Out {
            dest: Register::Isr,
            bits: 32,
        },
        mode,
    );
    push(
        &mut words,
        Instruction::Out {
            dest: Register::Y,
            bits: 32,
        },
        mode,
    );

    // get_symbol
    push(
        &mut words,
        Instruction::Out {
            dest: Register::X,
            bits: 1,
        },
        mode,
    );
    push(&mut words, jmp(Condition::NotX, layout.send_0), mode);

    emit_block(&mut words, &plan.one, Register::Y, layout.loop_1, mode);
    emit_block(&mut words, &plan.zero, Register::Isr, layout.loop_0, mode);

    words
}

/// Compiles a symbol timing into a waveform program.
///
/// # Arguments
/// - `timing`: dividers and baud rate chosen by the operator
/// - `mode`: one or two antennas, which fixes the per-instruction delay cap
/// - `clock_hz`: sequencer clock
///
/// # Returns
/// - `Ok`: the program, its timing plan and the matching [`RadioConfig`], with
///   every advisory raised on the way
/// - `Err`: the timing is unusable or the program does not fit the
///   [`INSTRUCTION_MEMORY_LEN`] instruction store
pub fn synthesize(
    timing: &SymbolTiming,
    mode: AntennaMode,
    clock_hz: u32,
) -> Result<Reported<Synthesis>, SynthesisError> {
    let mut report = Reported::new(());
    let plan = report.absorb(plan(timing, clock_hz)?);

    let layout = Layout::new(&plan, mode);
    if layout.length > INSTRUCTION_MEMORY_LEN as u32 {
        warn!(
            "program needs {} instructions, only {} available",
            layout.length,
            INSTRUCTION_MEMORY_LEN
        );
        return Err(SynthesisError::ProgramTooLarge {
            required: layout.length,
            capacity: INSTRUCTION_MEMORY_LEN,
        });
    }

    let words = emit(&plan, &layout, mode);
    debug!("synthesized {} instructions", words.len());
    let program = WaveformProgram::new(
        words,
        mode,
        [plan.zero.repeat_count(), plan.one.repeat_count()],
    );

    let radio = report.absorb(RadioConfig::from_timing(timing, plan.baud, clock_hz));
    Ok(report.map(|()| Synthesis {
        program,
        plan,
        radio,
    }))
}
