//! The test-bed main loop.
//!
//! One [`Testbed`] owns the backscatter transmitter, the carrier radio and
//! the receiver radio. Each [`step`](Testbed::step) handles at most one
//! operator command and one receive event, then transmits a frame if the
//! receiver is idle:
//!
//! ```text
//!   command? ──▶ execute
//!   event:  RxStarted  ──▶ busy, no transmission
//!           RxFinished ──▶ read + log frame, re-arm ──┐
//!           None       ───────────────────────────────┴──▶ transmit, wait interval
//!   settle 1 ms
//! ```
//!
//! The radios are reached through [`CarrierControl`] and [`ReceiverControl`],
//! both implemented for [`Cc2500`]; the loop only ever blocks in register
//! I/O and in the fixed waits around a transmission.

use core::convert::Infallible;
use core::fmt::{self, Write};

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use thiserror::Error;

use crate::command::{Command, CommandQueue, SharedSettings, write_help};
use crate::consts::{CARRIER_FREQUENCY_HZ, PAYLOAD_LEN, SEQUENCER_CLOCK_HZ};
use crate::events::{ReceiveEvent, ReceiveEvents, ReceiverState};
use crate::packet::{FrameLog, ReceivedFrame, build_default_frame, pack_frame};
use crate::payload::PayloadGenerator;
use crate::pio::{Backscatter, BackscatterError, Sequencer, SynthesisError};
use crate::radio::{Cc2500, RadioConfig, RadioError, ReceiverChip};
use crate::report::Reported;
use crate::timing::{SymbolTiming, tx_duration_ms};

/// Pause at the end of every loop iteration, in ms.
const LOOP_SETTLE_MS: u32 = 1;
/// Time the carrier needs to come up before the tag starts, in ms.
const CARRIER_SETTLE_MS: u32 = 1;

/// Radio producing the unmodulated carrier.
pub trait CarrierControl {
    /// Bus error.
    type Error;

    /// Brings the radio up idle, tuned to `frequency_hz`.
    fn setup(&mut self, frequency_hz: u32) -> Result<Reported<()>, Self::Error>;
    /// Carrier on.
    fn start_carrier(&mut self) -> Result<(), Self::Error>;
    /// Carrier off.
    fn stop_carrier(&mut self) -> Result<(), Self::Error>;
}

/// Receiver settings in Hz and Baud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct ReceiverTuning {
    /// Absolute receive frequency.
    pub center: u32,
    /// FSK deviation.
    pub deviation: u32,
    /// Data rate.
    pub baudrate: u32,
    /// Channel filter bandwidth.
    pub bandwidth: u32,
}

impl ReceiverTuning {
    /// Tuning matching a backscatter waveform reflected off `carrier_hz`.
    pub const fn from_radio(config: &RadioConfig, carrier_hz: u32) -> Self {
        Self {
            center: config.receiver_frequency(carrier_hz),
            deviation: config.deviation,
            baudrate: config.baudrate,
            bandwidth: config.min_rx_bandwidth,
        }
    }
}

/// Radio receiving the backscattered frames.
pub trait ReceiverControl {
    /// Bus error.
    type Error;

    /// Brings the radio up idle with the receiver defaults.
    fn setup(&mut self) -> Result<(), Self::Error>;
    /// Programs frequency, deviation, data rate and filter. Leaves the radio idle.
    fn tune(&mut self, tuning: &ReceiverTuning) -> Result<Reported<()>, Self::Error>;
    /// Listens for the next frame.
    fn start_listen(&mut self) -> Result<(), Self::Error>;
    /// Stops listening.
    fn stop_listen(&mut self) -> Result<(), Self::Error>;
    /// Fetches the frame that just completed.
    fn read_frame(&mut self) -> Result<ReceivedFrame, Self::Error>;
}

impl<SPI: SpiDevice, D: DelayNs> CarrierControl for Cc2500<SPI, D> {
    type Error = RadioError<SPI::Error>;

    fn setup(&mut self, frequency_hz: u32) -> Result<Reported<()>, Self::Error> {
        self.setup_carrier()?;
        Ok(self.set_frequency(frequency_hz)?.map(|_| ()))
    }

    fn start_carrier(&mut self) -> Result<(), Self::Error> {
        Cc2500::start_carrier(self)
    }

    fn stop_carrier(&mut self) -> Result<(), Self::Error> {
        Cc2500::stop_carrier(self)
    }
}

impl<SPI: SpiDevice, D: DelayNs> ReceiverControl for Cc2500<SPI, D> {
    type Error = RadioError<SPI::Error>;

    fn setup(&mut self) -> Result<(), Self::Error> {
        self.setup_receiver()
    }

    fn tune(&mut self, tuning: &ReceiverTuning) -> Result<Reported<()>, Self::Error> {
        let mut report = Reported::new(());
        let _ = report.absorb(self.set_frequency(tuning.center)?);
        let _ = report.absorb(self.set_deviation(tuning.deviation)?);
        let _ = report.absorb(self.set_data_rate(tuning.baudrate)?);
        let _ = report.absorb(self.set_filter_bandwidth(tuning.bandwidth)?);
        Ok(report)
    }

    fn start_listen(&mut self) -> Result<(), Self::Error> {
        Cc2500::start_listen(self)
    }

    fn stop_listen(&mut self) -> Result<(), Self::Error> {
        Cc2500::stop_listen(self)
    }

    fn read_frame(&mut self) -> Result<ReceivedFrame, Self::Error> {
        Cc2500::read_frame(self)
    }
}

/// Monotonic time source.
pub trait Uptime {
    /// Microseconds since boot.
    fn now_us(&self) -> u64;
}

impl<F: Fn() -> u64> Uptime for F {
    fn now_us(&self) -> u64 {
        self()
    }
}

/// Failures that stop the main loop.
#[derive(Debug, Error)]
pub enum TestbedError<S, C, R> {
    /// The start-up timing cannot be synthesized.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    /// The sequencer failed.
    #[error("sequencer error")]
    Sequencer(S),
    /// The carrier radio failed.
    #[error("carrier radio error")]
    Carrier(C),
    /// The receiver radio failed.
    #[error("receiver radio error")]
    Receiver(R),
}

impl<S, C, R> From<BackscatterError<S>> for TestbedError<S, C, R> {
    fn from(err: BackscatterError<S>) -> Self {
        match err {
            BackscatterError::Synthesis(e) => TestbedError::Synthesis(e),
            BackscatterError::Sequencer(e) => TestbedError::Sequencer(e),
        }
    }
}

/// [`TestbedError`] for a given set of peripherals.
pub type StepError<S, C, R> = TestbedError<
    <S as Sequencer>::Error,
    <C as CarrierControl>::Error,
    <R as ReceiverControl>::Error,
>;

/// State shared with interrupt handlers and the console reader.
#[derive(Debug, Clone, Copy)]
pub struct Shared<'a> {
    /// Fed by the GDO0 edge handler.
    pub events: &'a ReceiveEvents,
    /// Fed by the console line reader.
    pub commands: &'a CommandQueue,
    /// Configuration in effect, for reporting.
    pub settings: &'a SharedSettings,
}

/// The assembled test-bed.
pub struct Testbed<'a, S, C, R, D, U, W> {
    backscatter: Backscatter<S>,
    carrier: C,
    receiver: R,
    delay: D,
    uptime: U,
    console: W,
    shared: Shared<'a>,
    chip: ReceiverChip,
    payload: PayloadGenerator,
    state: ReceiverState,
    listening: bool,
    seq: u8,
}

impl<'a, S, C, R, D, U, W> Testbed<'a, S, C, R, D, U, W>
where
    S: Sequencer,
    C: CarrierControl,
    R: ReceiverControl,
    D: DelayNs,
    U: Uptime,
    W: Write,
{
    /// Assembles the test-bed. Nothing is touched until [`start`](Self::start).
    pub fn new(
        backscatter: Backscatter<S>,
        carrier: C,
        receiver: R,
        delay: D,
        uptime: U,
        console: W,
        shared: Shared<'a>,
    ) -> Self {
        Self {
            backscatter,
            carrier,
            receiver,
            delay,
            uptime,
            console,
            shared,
            chip: ReceiverChip::default(),
            payload: PayloadGenerator::new(),
            state: ReceiverState::Idle,
            listening: false,
            seq: 0,
        }
    }

    /// Selects which sync word the transmitted frames carry.
    pub fn set_receiver_chip(&mut self, chip: ReceiverChip) {
        self.chip = chip;
    }

    /// Sequence number of the next frame.
    pub fn sequence(&self) -> u8 {
        self.seq
    }

    /// Receiver state as tracked from events.
    pub fn receiver_state(&self) -> ReceiverState {
        self.state
    }

    /// `true` while the receiver is armed.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// The backscatter transmitter.
    pub fn backscatter(&self) -> &Backscatter<S> {
        &self.backscatter
    }

    /// Synthesizes the configured waveform, brings up both radios and
    /// starts listening.
    ///
    /// # Returns
    /// The receiver configuration in use, with all advisories raised on the
    /// way.
    pub fn start(&mut self) -> Result<Reported<RadioConfig>, StepError<S, C, R>> {
        let timing = self.shared.settings.snapshot().timing();
        let mut report = self.backscatter.configure(&timing, SEQUENCER_CLOCK_HZ)?;
        self.write_advisories(&report);
        let _ = write!(self.console, "{}", report.value);

        let carrier = self
            .carrier
            .setup(CARRIER_FREQUENCY_HZ)
            .map_err(TestbedError::Carrier)?;
        self.write_advisories(&carrier);
        let _ = report.absorb(carrier);
        self.delay.delay_ms(CARRIER_SETTLE_MS);

        self.receiver.setup().map_err(TestbedError::Receiver)?;
        let tuning = ReceiverTuning::from_radio(&report.value, CARRIER_FREQUENCY_HZ);
        let tuned = self
            .receiver
            .tune(&tuning)
            .map_err(TestbedError::Receiver)?;
        self.write_advisories(&tuned);
        let _ = report.absorb(tuned);
        self.delay.delay_ms(LOOP_SETTLE_MS);

        self.listen()?;
        let radio = report.value;
        self.shared.settings.update(|s| s.apply_radio(&radio));
        info!("started listening on {} Hz", tuning.center);
        let _ = writeln!(self.console, "started listening");
        Ok(report)
    }

    /// One main-loop iteration.
    pub fn step(&mut self) -> Result<(), StepError<S, C, R>> {
        if let Some(command) = self.shared.commands.pop() {
            self.execute(command)?;
        }

        let event = self.shared.events.poll();
        self.state = self.state.next(event);
        match event {
            ReceiveEvent::RxStarted => {}
            ReceiveEvent::RxFinished => {
                self.receive()?;
                self.transmit_opportunity()?;
            }
            ReceiveEvent::None => self.transmit_opportunity()?,
        }
        self.delay.delay_ms(LOOP_SETTLE_MS);
        Ok(())
    }

    /// Runs [`step`](Self::step) until it fails.
    pub fn run(&mut self) -> Result<Infallible, StepError<S, C, R>> {
        loop {
            self.step()?;
        }
    }

    fn listen(&mut self) -> Result<(), StepError<S, C, R>> {
        self.receiver
            .start_listen()
            .map_err(TestbedError::Receiver)?;
        self.listening = true;
        self.state = ReceiverState::Idle;
        Ok(())
    }

    fn receive(&mut self) -> Result<(), StepError<S, C, R>> {
        let time_us = self.uptime.now_us();
        let frame = self
            .receiver
            .read_frame()
            .map_err(TestbedError::Receiver)?;
        let _ = writeln!(
            self.console,
            "{}",
            FrameLog {
                time_us,
                frame: &frame
            }
        );
        if self.listening {
            self.listen()?;
        }
        Ok(())
    }

    fn transmit_opportunity(&mut self) -> Result<(), StepError<S, C, R>> {
        let baud = self.backscatter.active().map(|s| s.plan.baud);
        if let Some(baud) = baud.filter(|_| self.state.is_ready()) {
            self.transmit(baud)?;
        }
        let interval = self.shared.settings.snapshot().tx_interval_ms;
        self.delay.delay_ms(interval);
        Ok(())
    }

    fn transmit(&mut self, baud: u32) -> Result<(), StepError<S, C, R>> {
        let mut payload = [0u8; PAYLOAD_LEN];
        self.payload.fill(&mut payload, true);
        let Some(frame) = build_default_frame(self.seq, &payload, self.chip) else {
            warn!("frame does not fit, skipping transmission");
            return Ok(());
        };
        let words = pack_frame(&frame);

        self.carrier
            .start_carrier()
            .map_err(TestbedError::Carrier)?;
        self.delay.delay_ms(CARRIER_SETTLE_MS);
        let sent = self.backscatter.send(&words);
        if sent.is_ok() {
            self.delay.delay_ms(tx_duration_ms(words.len(), baud));
        }
        self.carrier
            .stop_carrier()
            .map_err(TestbedError::Carrier)?;
        sent.map_err(TestbedError::Sequencer)?;

        debug!("sent frame {}", self.seq);
        self.seq = self.seq.wrapping_add(1);
        Ok(())
    }

    fn execute(&mut self, command: Command) -> Result<(), StepError<S, C, R>> {
        match command {
            Command::Help => {
                let settings = self.shared.settings.snapshot();
                let _ = write_help(&mut self.console, &settings);
            }
            Command::StartReceive => {
                self.listen()?;
                let _ = writeln!(self.console, "started listening");
            }
            Command::StopReceive => {
                self.receiver
                    .stop_listen()
                    .map_err(TestbedError::Receiver)?;
                self.listening = false;
                let _ = writeln!(self.console, "stopped listening");
            }
            Command::ConfigureReceiver {
                center,
                deviation,
                baudrate,
                bandwidth,
            } => {
                let tuning = ReceiverTuning {
                    center,
                    deviation,
                    baudrate,
                    bandwidth,
                };
                let report = self
                    .receiver
                    .tune(&tuning)
                    .map_err(TestbedError::Receiver)?;
                self.write_advisories(&report);
                self.shared.settings.update(|s| {
                    s.center = center;
                    s.deviation = deviation;
                    s.baudrate = baudrate;
                    s.min_rx_bandwidth = bandwidth;
                });
                if self.listening {
                    self.listen()?;
                }
                let _ = writeln!(self.console, "receiver reconfigured");
            }
            Command::ConfigureBackscatter {
                divider0,
                divider1,
                baud,
            } => {
                let timing = SymbolTiming::new(divider0, divider1, baud);
                match self.backscatter.configure(&timing, SEQUENCER_CLOCK_HZ) {
                    Ok(report) => {
                        self.write_advisories(&report);
                        let _ = write!(self.console, "{}", report.value);
                        self.shared.settings.update(|s| {
                            s.divider0 = divider0;
                            s.divider1 = divider1;
                            s.baud = baud;
                        });
                    }
                    Err(BackscatterError::Synthesis(e)) => {
                        warn!("backscatter configuration rejected");
                        let _ = writeln!(self.console, "ERROR: {}", e);
                    }
                    Err(BackscatterError::Sequencer(e)) => return Err(TestbedError::Sequencer(e)),
                }
            }
            Command::Invalid => {
                warn!("invalid command");
                let _ = writeln!(self.console, "invalid command, type h for help");
            }
        }
        Ok(())
    }

    fn write_advisories<T>(&mut self, report: &Reported<T>) {
        for advisory in &report.advisories {
            let _ = writeln!(self.console, "{}", advisory);
        }
    }
}

impl<S, C, R, D, U, W> fmt::Debug for Testbed<'_, S, C, R, D, U, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Testbed")
            .field("chip", &self.chip)
            .field("state", &self.state)
            .field("listening", &self.listening)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
