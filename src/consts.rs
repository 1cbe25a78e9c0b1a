//! Constants used across the backscatter test-bed.
//!
//! This module defines the clock rates, sequencer limits, frame layout and
//! queue depths shared by the synthesizer, the radio codec and the main loop.
//!
//! ## Key Concepts
//!
//! - **Sequencer clock**: every delay in the synthesized waveform is counted in
//!   cycles of [`SEQUENCER_CLOCK_HZ`].
//! - **Symbol overhead**: each symbol spends [`SYMBOL_OVERHEAD_CYCLES`] on
//!   control flow (`OUT`, `JMP`, `MOV`, `JMP`) that does not toggle the antenna.
//! - **Radio reference**: the CC2500 derives every frequency-like register
//!   from its crystal, [`CC2500_XOSC_HZ`].
//! - **Framing**: an 8-byte sync header, a length byte and a sequence number
//!   precede a fixed-size payload.

/// Clock feeding the waveform sequencer, in Hz (RP2040 system clock).
pub const SEQUENCER_CLOCK_HZ: u32 = 125_000_000;

/// Cycles per symbol spent on `OUT x`, `JMP !x`, `MOV x` and the closing `JMP`.
pub const SYMBOL_OVERHEAD_CYCLES: u32 = 4;

/// Capacity of the sequencer's instruction store, in 16-bit words.
pub const INSTRUCTION_MEMORY_LEN: usize = 32;

/// Crystal frequency of the CC2500 in Hz.
pub const CC2500_XOSC_HZ: u32 = 26_000_000;

/// Largest frequency deviation the CC2500 can demodulate, in Hz.
pub const CC2500_MAX_DEVIATION_HZ: u32 = 380_000;

/// Largest frequency deviation the CC1352 can demodulate, in Hz.
pub const CC1352_MAX_DEVIATION_HZ: u32 = 1_000_000;

/// Frequency of the unmodulated carrier, in Hz.
pub const CARRIER_FREQUENCY_HZ: u32 = 2_450_000_000;

/// Length of the fixed sync sequence at the start of every frame.
pub const SYNC_HEADER_LEN: usize = 8;

/// Sync header plus the length and sequence bytes.
pub const HEADER_LEN: usize = SYNC_HEADER_LEN + 2;

/// Number of payload bytes carried per frame.
pub const PAYLOAD_LEN: usize = 14;

/// Total frame size on air (excluding the preamble generated by the radio).
pub const FRAME_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

/// Number of 32-bit FIFO words needed for one frame.
pub const FRAME_WORDS: usize = FRAME_LEN.div_ceil(4);

/// Size of the receive buffer handed to the radio driver.
pub const RX_BUFFER_LEN: usize = 64;

/// Largest number of bytes read from the RX FIFO in one burst.
///
/// The CC2500 FIFO holds 64 bytes, two of which are the appended status.
pub const RX_FIFO_PAYLOAD_MAX: usize = 62;

/// Depth of the receive event queue filled from the GDO0 interrupt.
pub const EVENT_QUEUE_LEN: usize = 20;

/// Depth of the operator command queue.
pub const COMMAND_QUEUE_LEN: usize = 10;

/// Longest accepted command line, in bytes.
pub const COMMAND_LINE_LEN: usize = 100;

/// Settle time the radio needs after each single register transaction, in ms.
pub const REGISTER_SETTLE_MS: u32 = 1;

/// Extra time added to the computed air time before the carrier is stopped, in ms.
pub const TX_MARGIN_MS: u32 = 3;

/// Time between two transmit opportunities, in ms.
pub const TX_INTERVAL_MS: u32 = 250;

/// Default divider for symbol 0 (the larger of the two).
pub const DEFAULT_DIVIDER0: u16 = 20;

/// Default divider for symbol 1 (the smaller of the two).
pub const DEFAULT_DIVIDER1: u16 = 18;

/// Default requested symbol rate.
pub const DEFAULT_BAUD: u32 = 100_000;
