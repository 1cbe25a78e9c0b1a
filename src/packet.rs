//! Frame assembly for the backscatter uplink and decoding of what the
//! receiver reports.
//!
//! ## Frame layout
//!
//! ```text
//! +----------------------+--------+-----+-----------------+
//! | sync header (8)      | length | seq | payload (N)     |
//! +----------------------+--------+-----+-----------------+
//!                          1 + N
//! ```
//!
//! The header is a 4-byte `0xaa` preamble plus the receiver's sync word (see
//! [`ReceiverChip::sync_header`]). The receiver strips the header and appends
//! two status bytes (RSSI and CRC/LQI) to what it stores in its FIFO.

use core::fmt;

use heapless::Vec;

use crate::consts::{FRAME_LEN, FRAME_WORDS, HEADER_LEN, RX_BUFFER_LEN, SYNC_HEADER_LEN};
use crate::radio::ReceiverChip;

/// Offset subtracted from the raw RSSI, in dB (CC2500 at 250 kBaud and below).
const RSSI_OFFSET_DB: i32 = 70;

/// Assembles one frame: sync header, length byte, sequence number, payload.
///
/// # Arguments
/// - `seq`: sequence number, wraps at 256
/// - `payload`: at most `N - 10` bytes
/// - `header`: sync header of the target receiver
///
/// # Returns
/// `None` when the frame would not fit into `N` bytes.
pub fn build_frame<const N: usize>(
    seq: u8,
    payload: &[u8],
    header: &[u8; SYNC_HEADER_LEN],
) -> Option<Vec<u8, N>> {
    if payload.len() + HEADER_LEN > N || payload.len() >= usize::from(u8::MAX) {
        return None;
    }
    let mut frame = Vec::new();
    frame.extend_from_slice(header).ok()?;
    frame.push(1 + payload.len() as u8).ok()?;
    frame.push(seq).ok()?;
    frame.extend_from_slice(payload).ok()?;
    Some(frame)
}

/// Frame of the default size for `chip`.
pub fn build_default_frame(
    seq: u8,
    payload: &[u8],
    chip: ReceiverChip,
) -> Option<Vec<u8, FRAME_LEN>> {
    build_frame(seq, payload, &chip.sync_header())
}

/// Number of 32-bit words needed for `bytes` bytes.
pub const fn buffer_words(bytes: usize) -> usize {
    bytes.div_ceil(4)
}

/// Packs bytes big-endian into FIFO words, zero-padding the last one.
///
/// The sequencer shifts words out MSB first, so the first byte goes on air
/// first.
pub fn pack_words<const W: usize>(bytes: &[u8]) -> Vec<u32, W> {
    bytes
        .chunks(4)
        .take(W)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_be_bytes(word)
        })
        .collect()
}

/// Packs a default-size frame.
pub fn pack_frame(frame: &[u8]) -> Vec<u32, FRAME_WORDS> {
    pack_words(frame)
}

/// RX FIFO status byte (`RXBYTES`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct FifoStatus {
    /// The FIFO overflowed; its content is unusable.
    pub overflowed: bool,
    /// Bytes in the FIFO, including the two appended status bytes.
    pub bytes: u8,
}

impl FifoStatus {
    /// Payload bytes, i.e. without the two appended status bytes.
    pub fn payload_len(&self) -> usize {
        usize::from(self.bytes.saturating_sub(2))
    }
}

impl From<u8> for FifoStatus {
    fn from(raw: u8) -> Self {
        Self {
            overflowed: raw & 0x80 != 0,
            bytes: raw & 0x7F,
        }
    }
}

/// A packet as read back from the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceivedFrame {
    /// Bytes after the sync word: length, sequence number, payload.
    pub payload: Vec<u8, RX_BUFFER_LEN>,
    /// Received signal strength in dBm.
    pub rssi: i32,
    /// Link quality indicator, lower is better.
    pub link_quality: u8,
    /// The receiver's CRC check passed.
    pub crc_ok: bool,
    /// The RX FIFO overflowed, likely due to a corrupted length byte.
    pub overflowed: bool,
}

/// Converts the raw RSSI byte (two's complement, 0.5 dB steps) to dBm.
pub fn rssi_dbm(raw: u8) -> i32 {
    let raw = i32::from(raw);
    if raw >= 128 {
        (raw - 256) / 2 - RSSI_OFFSET_DB
    } else {
        raw / 2 - RSSI_OFFSET_DB
    }
}

/// Decodes a packet from the FIFO status, the payload bytes and the two
/// appended status bytes `[rssi, crc_ok << 7 | lqi]`.
///
/// An overflowed FIFO yields an empty frame with `crc_ok == false`.
pub fn decode_frame(status: FifoStatus, payload: &[u8], appended: [u8; 2]) -> ReceivedFrame {
    if status.overflowed {
        return ReceivedFrame {
            overflowed: true,
            ..Default::default()
        };
    }
    let len = payload.len().min(status.payload_len()).min(RX_BUFFER_LEN);
    let mut bytes = Vec::new();
    // len never exceeds the capacity
    let _ = bytes.extend_from_slice(&payload[..len]);
    ReceivedFrame {
        payload: bytes,
        rssi: rssi_dbm(appended[0]),
        link_quality: appended[1] & 0x7F,
        crc_ok: appended[1] & 0x80 != 0,
        overflowed: false,
    }
}

/// Time since boot, printed as `HH:MM:SS.mmm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(pub u64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let us = self.0;
        let hours = us / 3_600_000_000;
        let minutes = us % 3_600_000_000 / 60_000_000;
        let seconds = us % 60_000_000 / 1_000_000;
        let millis = us % 1_000_000 / 1_000;
        write!(f, "{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }
}

/// One console line describing a received frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameLog<'a> {
    /// When the frame was read, in µs since boot.
    pub time_us: u64,
    /// The frame.
    pub frame: &'a ReceivedFrame,
}

impl fmt::Display for FrameLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | ", Timestamp(self.time_us))?;
        if self.frame.overflowed {
            return write!(f, "packet overflow (possible length field corrupted) | CRC error");
        }
        for byte in &self.frame.payload {
            write!(f, "{:02x} ", byte)?;
        }
        let crc = if self.frame.crc_ok { "pass" } else { "error" };
        write!(f, "| {} CRC {}", self.frame.rssi, crc)
    }
}
