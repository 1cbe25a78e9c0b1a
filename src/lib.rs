//! # backscatter
//!
//! A portable, no_std core for an FSK backscatter test-bed: a tag toggles its
//! antenna switch from a programmable I/O sequencer, one CC2500 supplies the
//! carrier, and a second CC2500 receives the reflected frames.
//!
//! The crate provides:
//! - a waveform synthesizer that compiles two toggle periods and a baud rate
//!   into a sequencer program of at most 32 instructions
//! - the receiver settings (offset, deviation, filter) matching that waveform
//! - a two-way codec between Hz and CC2500 register fields
//! - a CC2500 driver over `embedded-hal` 1.0 SPI
//! - frame assembly, FIFO status decoding and frame logging
//! - an interrupt-safe receive-event queue and the test-bed main loop
//!
//! ## Crate features
//! | Feature     | Description |
//! |-------------|-------------|
//! | `std`       | Builds against `std`; `critical-section` uses its `std` implementation |
//! | `defmt-0-3` | Uses `defmt` logging and derives `defmt::Format` on public types |
//! | `log`       | Uses `log` logging |
//!
//! Without `log` or `defmt-0-3` all logging compiles away.
//!
//! ## Usage
//!
//! ```rust
//! use backscatter::consts::SEQUENCER_CLOCK_HZ;
//! use backscatter::packet::{build_default_frame, pack_frame};
//! use backscatter::pio::{AntennaMode, synthesize};
//! use backscatter::radio::ReceiverChip;
//! use backscatter::timing::SymbolTiming;
//!
//! let report = synthesize(
//!     &SymbolTiming::new(20, 18, 100_000),
//!     AntennaMode::Dual,
//!     SEQUENCER_CLOCK_HZ,
//! )
//! .unwrap();
//! let synthesis = report.value;
//! assert_eq!(synthesis.radio.center_offset, 6_597_222);
//!
//! let frame = build_default_frame(0, &[0u8; 14], ReceiverChip::Cc2500).unwrap();
//! let words = pack_frame(&frame);
//! assert_eq!(words.len(), 6);
//! ```
//!
//! On hardware, implement [`pio::Sequencer`] for the PIO state machine, wrap
//! both radios in [`radio::Cc2500`] and hand everything to
//! [`testbed::Testbed`]. Feed GDO0 edges through [`gdo0_edge!`] and console
//! bytes through [`command::LineReader::forward`].
//!
//! ## Integration Notes
//!
//! - The receive-event and command queues are `critical_section` protected;
//!   the target must provide a critical-section implementation
//! - Each radio owns its chip select; never share a [`radio::Cc2500`] across
//!   the interrupt boundary
//! - Synthesis never touches the sequencer when it fails, so a rejected
//!   configuration leaves the running waveform intact

#![deny(
    bad_style,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    while_true,
    missing_docs
)]
#![warn(
    unused,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub use critical_section;
pub use heapless;

pub mod command;
pub mod consts;
pub mod events;
pub mod packet;
pub mod payload;
pub mod pio;
pub mod radio;
pub mod report;
pub mod testbed;
pub mod timing;
