//! Deterministic test payloads.
//!
//! Samples are normally distributed 16-bit values drawn from a fixed-seed
//! linear congruential generator, so a receiver running the same generator
//! can check what it got. An optional 2-byte position index lets the receiver
//! resynchronise after lost frames.

use core::f64::consts::PI;

use libm::{cos, log, sqrt};

/// Seed the generator starts from and returns to when the position wraps.
pub const DEFAULT_SEED: u32 = 0xABCD;

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;

const SAMPLE_MEAN: f64 = 0x1FFF as f64;
const SAMPLE_SIGMA: f64 = 0x7FF as f64;
const SAMPLE_MAX: f64 = 0x3F_FFFF as f64;

/// Source of payload samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadGenerator {
    seed: u32,
    position: u16,
}

impl Default for PayloadGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadGenerator {
    /// Fresh generator at position 0.
    pub const fn new() -> Self {
        Self {
            seed: DEFAULT_SEED,
            position: 0,
        }
    }

    /// Byte index of the next sample in the generated stream.
    pub const fn position(&self) -> u16 {
        self.position
    }

    /// Next uniform 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        self.seed = self
            .seed
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.seed
    }

    fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u32()) / f64::from(u32::MAX)
    }

    /// Next sample, drawn with the Box-Muller transform.
    ///
    /// Advances the position by 2. When the position is 0 the seed is reset
    /// first, so the stream repeats every 32768 samples.
    pub fn next_sample(&mut self) -> u16 {
        if self.position == 0 {
            self.seed = DEFAULT_SEED;
        }
        self.position = self.position.wrapping_add(2);
        let u1 = self.next_unit();
        let u2 = self.next_unit();
        let radius = SAMPLE_SIGMA * sqrt(-2.0 * log(u1));
        let value = (radius * cos(2.0 * PI * u2) + SAMPLE_MEAN).clamp(0.0, SAMPLE_MAX);
        value as u32 as u16
    }

    /// Fills `buffer` with big-endian samples.
    ///
    /// # Arguments
    /// - `buffer`: destination, should have an even length
    /// - `include_index`: put the current position into the first two bytes
    pub fn fill(&mut self, buffer: &mut [u8], include_index: bool) {
        if buffer.len() % 2 != 0 {
            warn!("payload length {} is odd, last byte left untouched", buffer.len());
        }
        let data = if include_index && buffer.len() >= 2 {
            let (index, data) = buffer.split_at_mut(2);
            index.copy_from_slice(&self.position.to_be_bytes());
            data
        } else {
            buffer
        };
        for pair in data.chunks_exact_mut(2) {
            pair.copy_from_slice(&self.next_sample().to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_sequence() {
        let mut generator = PayloadGenerator::new();
        assert_eq!(generator.next_u32(), 0x47F0_5AC8);
    }

    #[test]
    fn test_first_samples() {
        let mut generator = PayloadGenerator::new();
        let samples: [u16; 4] = core::array::from_fn(|_| generator.next_sample());
        assert_eq!(samples, [4957, 8003, 6981, 9583]);
        assert_eq!(generator.position(), 8);
    }

    #[test]
    fn test_fill_with_index() {
        let mut generator = PayloadGenerator::new();
        let mut first = [0u8; 6];
        generator.fill(&mut first, true);
        assert_eq!(first, [0x00, 0x00, 0x13, 0x5D, 0x1F, 0x43]);

        let mut second = [0u8; 4];
        generator.fill(&mut second, true);
        assert_eq!(&second[..2], &[0x00, 0x04]);
    }

    #[test]
    fn test_fill_without_index() {
        let mut generator = PayloadGenerator::new();
        let mut buffer = [0u8; 5];
        generator.fill(&mut buffer, false);
        assert_eq!(buffer, [0x13, 0x5D, 0x1F, 0x43, 0x00]);
    }

    #[test]
    fn test_stream_repeats_after_wrap() {
        let mut generator = PayloadGenerator::new();
        let first = generator.next_sample();
        for _ in 1..32_768 {
            let _ = generator.next_sample();
        }
        assert_eq!(generator.position(), 0);
        assert_eq!(generator.next_sample(), first);
    }
}
