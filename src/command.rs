//! Operator commands arriving line by line over a serial console.
//!
//! | Line                | Effect                                          |
//! |---------------------|-------------------------------------------------|
//! | `h`                 | print help and the current configuration       |
//! | `s`                 | start receiving                                 |
//! | `t`                 | stop receiving                                  |
//! | `c A B C D`         | receiver: centre Hz, deviation Hz, Baud, filter Hz |
//! | `b A B C`           | backscatter: divider 0, divider 1, Baud         |
//!
//! Lines are read in one context ([`LineReader`]), queued ([`CommandQueue`])
//! and executed by the main loop. The values currently in effect live in
//! [`SharedSettings`] so either side can report them.

use core::cell::Cell;
use core::fmt;
use core::str::{self, FromStr};

use critical_section::Mutex;
use heapless::Vec;

use crate::consts::{
    CARRIER_FREQUENCY_HZ, COMMAND_LINE_LEN, COMMAND_QUEUE_LEN, DEFAULT_BAUD, DEFAULT_DIVIDER0,
    DEFAULT_DIVIDER1, TX_INTERVAL_MS,
};
use crate::events::EventQueue;
use crate::radio::RadioConfig;
use crate::timing::SymbolTiming;

/// One parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Command {
    /// `h`
    Help,
    /// `s`
    StartReceive,
    /// `t`
    StopReceive,
    /// `c center deviation baudrate bandwidth`
    ConfigureReceiver {
        /// Absolute receive frequency in Hz.
        center: u32,
        /// Deviation in Hz.
        deviation: u32,
        /// Data rate in Baud.
        baudrate: u32,
        /// Channel filter bandwidth in Hz.
        bandwidth: u32,
    },
    /// `b divider0 divider1 baud`
    ConfigureBackscatter {
        /// Toggle period of symbol 0, in sequencer cycles.
        divider0: u16,
        /// Toggle period of symbol 1, in sequencer cycles.
        divider1: u16,
        /// Symbol rate in Baud.
        baud: u32,
    },
    /// Anything that did not parse.
    Invalid,
}

/// Parses one line.
///
/// The first token must be a single command letter, followed by exactly the
/// number of unsigned integers that command takes. Never panics; anything
/// else yields [`Command::Invalid`].
pub fn parse_command(line: &str) -> Command {
    let mut tokens = line.split_ascii_whitespace();
    let Some(name) = tokens.next() else {
        return Command::Invalid;
    };
    let mut letters = name.chars();
    let (Some(letter), None) = (letters.next(), letters.next()) else {
        return Command::Invalid;
    };
    let Some(args) = numbers::<4>(tokens) else {
        return Command::Invalid;
    };

    match (letter, args.as_slice()) {
        ('h', []) => Command::Help,
        ('s', []) => Command::StartReceive,
        ('t', []) => Command::StopReceive,
        ('c', &[center, deviation, baudrate, bandwidth]) => Command::ConfigureReceiver {
            center,
            deviation,
            baudrate,
            bandwidth,
        },
        ('b', &[divider0, divider1, baud]) => {
            match (u16::try_from(divider0), u16::try_from(divider1)) {
                (Ok(divider0), Ok(divider1)) => Command::ConfigureBackscatter {
                    divider0,
                    divider1,
                    baud,
                },
                _ => Command::Invalid,
            }
        }
        _ => Command::Invalid,
    }
}

/// Parses at most `N` unsigned integers; `None` on junk or too many.
fn numbers<'a, const N: usize>(tokens: impl Iterator<Item = &'a str>) -> Option<Vec<u32, N>> {
    let mut values = Vec::new();
    for token in tokens {
        values.push(u32::from_str(token).ok()?).ok()?;
    }
    Some(values)
}

/// Commands waiting for the main loop.
pub type CommandQueue = EventQueue<Command, COMMAND_QUEUE_LEN>;

/// Collects console bytes into lines.
#[derive(Debug, Default)]
pub struct LineReader<const N: usize = COMMAND_LINE_LEN> {
    line: Vec<u8, N>,
    overlong: bool,
}

impl<const N: usize> LineReader<N> {
    /// Empty reader.
    pub const fn new() -> Self {
        Self {
            line: Vec::new(),
            overlong: false,
        }
    }

    /// Consumes one byte.
    ///
    /// # Returns
    /// The parsed command when `byte` ends a non-empty line. Overlong or
    /// non-UTF-8 lines parse as [`Command::Invalid`].
    pub fn push(&mut self, byte: u8) -> Option<Command> {
        if byte != b'\n' && byte != b'\r' {
            if self.line.push(byte).is_err() {
                self.overlong = true;
            }
            return None;
        }
        if self.line.is_empty() && !self.overlong {
            return None;
        }
        let command = match str::from_utf8(&self.line) {
            Ok(text) if !self.overlong => parse_command(text.trim()),
            _ => Command::Invalid,
        };
        self.line.clear();
        self.overlong = false;
        Some(command)
    }

    /// Feeds `byte` and queues any completed command.
    ///
    /// A full queue drops the command.
    pub fn forward<const Q: usize>(&mut self, byte: u8, queue: &EventQueue<Command, Q>) {
        if let Some(command) = self.push(byte) {
            if !queue.try_push(command) {
                warn!("command queue full, dropping command");
            }
        }
    }
}

/// Configuration currently in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Settings {
    /// Receive frequency in Hz.
    pub center: u32,
    /// Receiver deviation in Hz.
    pub deviation: u32,
    /// Receiver data rate in Baud.
    pub baudrate: u32,
    /// Receiver channel filter in Hz.
    pub min_rx_bandwidth: u32,
    /// Backscatter toggle period of symbol 0.
    pub divider0: u16,
    /// Backscatter toggle period of symbol 1.
    pub divider1: u16,
    /// Backscatter symbol rate in Baud.
    pub baud: u32,
    /// Pause between transmissions in ms.
    pub tx_interval_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Settings {
    /// Start-up configuration: 20/18 dividers at 100 kBaud.
    pub const DEFAULT: Settings = Settings {
        center: 2_456_597_222,
        deviation: 347_222,
        baudrate: DEFAULT_BAUD,
        min_rx_bandwidth: 794_444,
        divider0: DEFAULT_DIVIDER0,
        divider1: DEFAULT_DIVIDER1,
        baud: DEFAULT_BAUD,
        tx_interval_ms: TX_INTERVAL_MS,
    };

    /// The backscatter part as sequencer timing.
    pub const fn timing(&self) -> SymbolTiming {
        SymbolTiming::new(self.divider0, self.divider1, self.baud)
    }

    /// Takes the receiver part from a synthesized configuration.
    pub fn apply_radio(&mut self, config: &RadioConfig) {
        self.center = config.receiver_frequency(CARRIER_FREQUENCY_HZ);
        self.deviation = config.deviation;
        self.baudrate = config.baudrate;
        self.min_rx_bandwidth = config.min_rx_bandwidth;
    }
}

/// [`Settings`] shared between contexts.
///
/// Readers copy a snapshot out, writers replace it; the lock is held only
/// for the copy.
pub struct SharedSettings {
    inner: Mutex<Cell<Settings>>,
}

impl fmt::Debug for SharedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedSettings")
            .field(&self.snapshot())
            .finish()
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(Settings::DEFAULT)
    }
}

impl SharedSettings {
    /// Wraps `settings`; usable in a `static`.
    pub const fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(Cell::new(settings)),
        }
    }

    /// Copy of the current values.
    pub fn snapshot(&self) -> Settings {
        critical_section::with(|cs| self.inner.borrow(cs).get())
    }

    /// Replaces all values.
    pub fn store(&self, settings: Settings) {
        critical_section::with(|cs| self.inner.borrow(cs).set(settings));
    }

    /// Applies `f` to the current values.
    pub fn update<F: FnOnce(&mut Settings)>(&self, f: F) {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let mut settings = cell.get();
            f(&mut settings);
            cell.set(settings);
        });
    }
}

/// Writes the command overview followed by the current configuration.
pub fn write_help<W: fmt::Write>(out: &mut W, settings: &Settings) -> fmt::Result {
    writeln!(out, "The configuration can be changed using the following commands:")?;
    writeln!(out, "   h (print this help message)")?;
    writeln!(out, "   s (start receiving)")?;
    writeln!(out, "   t (terminate/stop receiving)")?;
    writeln!(
        out,
        "   c A B C D (configure receiver A=center, B=deviation, C=baud, D=bandwidth all in Hz)"
    )?;
    writeln!(
        out,
        "   b A B C (configure backscatter A=divider0, B=divider1, C=baud)"
    )?;
    writeln!(out)?;
    writeln!(out, "The current receiver configuration is:")?;
    writeln!(
        out,
        "  c {} {} {} {}",
        settings.center, settings.deviation, settings.baudrate, settings.min_rx_bandwidth
    )?;
    writeln!(out)?;
    writeln!(out, "The current backscatter configuration is:")?;
    writeln!(
        out,
        "  b {} {} {}",
        settings.divider0, settings.divider1, settings.baud
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "The backscattering runs continuously every {} ms.",
        settings.tx_interval_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("h"), Command::Help);
        assert_eq!(parse_command("  s "), Command::StartReceive);
        assert_eq!(parse_command("t"), Command::StopReceive);
    }

    #[test]
    fn test_parse_configuration() {
        assert_eq!(
            parse_command("c 2456597222 347222 100000 794444"),
            Command::ConfigureReceiver {
                center: 2_456_597_222,
                deviation: 347_222,
                baudrate: 100_000,
                bandwidth: 794_444,
            }
        );
        assert_eq!(
            parse_command("b 36 32 250000"),
            Command::ConfigureBackscatter {
                divider0: 36,
                divider1: 32,
                baud: 250_000,
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for line in [
            "",
            "zzz",
            "x",
            "h 1",
            "c 1 2 3",
            "c 1 2 3 4 5",
            "b 20 18",
            "b 20 18 -5",
            "b 70000 18 100000",
            "b twenty 18 100000",
            "hs",
        ] {
            assert_eq!(parse_command(line), Command::Invalid, "{line:?}");
        }
    }

    #[test]
    fn test_line_reader() {
        let mut reader: LineReader = LineReader::new();
        let mut commands = std::vec::Vec::new();
        for &byte in b"\r\nh\r\n\nb 20 18 100000\nzzz\r" {
            if let Some(command) = reader.push(byte) {
                commands.push(command);
            }
        }
        assert_eq!(
            commands,
            [
                Command::Help,
                Command::ConfigureBackscatter {
                    divider0: 20,
                    divider1: 18,
                    baud: 100_000
                },
                Command::Invalid,
            ]
        );
    }

    #[test]
    fn test_overlong_line_is_invalid() {
        let mut reader: LineReader<4> = LineReader::new();
        for &byte in b"b 20 18 100000" {
            assert_eq!(reader.push(byte), None);
        }
        assert_eq!(reader.push(b'\n'), Some(Command::Invalid));
        for &byte in b"s\n" {
            if let Some(command) = reader.push(byte) {
                assert_eq!(command, Command::StartReceive);
            }
        }
    }

    #[test]
    fn test_forward_drops_when_full() {
        let queue: EventQueue<Command, 2> = EventQueue::new();
        let mut reader: LineReader = LineReader::new();
        for &byte in b"h\ns\nt\n" {
            reader.forward(byte, &queue);
        }
        assert_eq!(queue.pop(), Some(Command::Help));
        assert_eq!(queue.pop(), Some(Command::StartReceive));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_invalid_command_leaves_settings_alone() {
        let shared = SharedSettings::default();
        let before = shared.snapshot();
        if let Command::ConfigureBackscatter { divider0, .. } = parse_command("zzz") {
            shared.update(|s| s.divider0 = divider0);
        }
        assert_eq!(shared.snapshot(), before);
    }

    #[test]
    fn test_shared_settings() {
        let shared = SharedSettings::new(Settings::DEFAULT);
        shared.update(|s| s.baud = 50_000);
        assert_eq!(shared.snapshot().baud, 50_000);
        assert_eq!(shared.snapshot().timing(), SymbolTiming::new(20, 18, 50_000));
        shared.store(Settings::DEFAULT);
        assert_eq!(shared.snapshot(), Settings::default());
    }

    #[test]
    fn test_help_text() {
        let mut out = String::new();
        write_help(&mut out, &Settings::DEFAULT).unwrap();
        assert!(out.starts_with("The configuration can be changed"));
        assert!(out.contains("  c 2456597222 347222 100000 794444\n"));
        assert!(out.contains("  b 20 18 100000\n"));
        assert!(out.ends_with("every 250 ms.\n"));
    }

    #[test]
    fn test_default_settings_match_synthesis() {
        let config = RadioConfig::from_timing(
            &Settings::DEFAULT.timing(),
            DEFAULT_BAUD,
            crate::consts::SEQUENCER_CLOCK_HZ,
        );
        let mut settings = Settings::DEFAULT;
        settings.apply_radio(&config.value);
        assert_eq!(settings, Settings::DEFAULT);
    }
}
