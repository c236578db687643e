//! Waveform generators
//!
//! This module contains the buffer synthesizers:
//! - Tone generator (50% square wave from a note number)
//! - Noise generator (hashed bi-level pattern for percussion)
//!
//! Every buffer is rendered up front at [`SAMPLE_RATE`], one tick-multiple
//! long minus a short silent tail, and handed out as stereo-interleaved
//! 16-bit PCM.

use crate::constants::{
    A4_FREQUENCY, A4_NOTE, FULL_SCALE, MAX_TRAILING_GAP, NOISE_CYCLES, NOISE_HASH_MULTIPLIER,
    OUTPUT_CHANNELS, SAMPLES_PER_TICK_TIMES_BPM, SAMPLE_RATE, TRAILING_GAP_TIMES_BPM,
};
use crate::score::NOTE_MASK;

/// Stereo-interleaved 16-bit PCM at [`SAMPLE_RATE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    samples: Vec<i16>,
}

impl PcmBuffer {
    /// Duplicate a mono signal to both output channels.
    pub fn from_mono<I: IntoIterator<Item = i16>>(mono: I) -> Self {
        let mono = mono.into_iter();
        let mut samples = Vec::with_capacity(mono.size_hint().0 * OUTPUT_CHANNELS as usize);
        for sample in mono {
            samples.push(sample);
            samples.push(sample);
        }
        Self { samples }
    }

    /// Interleaved samples (left, right, left, right, ...).
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Consume the buffer, returning the interleaved samples.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// Number of stereo frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / OUTPUT_CHANNELS as usize
    }

    /// Left channel only (identical to the right one).
    pub fn mono(&self) -> impl Iterator<Item = i16> + '_ {
        self.samples.iter().step_by(OUTPUT_CHANNELS as usize).copied()
    }

    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / SAMPLE_RATE as f64
    }
}

/// Samples in one tick at `bpm` (fractional for most tempos).
#[inline]
pub fn samples_per_tick(bpm: u8) -> f64 {
    SAMPLES_PER_TICK_TIMES_BPM as f64 / bpm.max(1) as f64
}

/// Silent tail cut from every buffer: `min(1500, floor(7.5 * rate / bpm))`.
#[inline]
pub fn trailing_gap(bpm: u8) -> u64 {
    (TRAILING_GAP_TIMES_BPM / bpm.max(1) as u64).min(MAX_TRAILING_GAP)
}

/// Frames in a buffer `duration_ticks` long, after the trailing gap.
///
/// The nominal length `duration * rate * 30 / bpm` is rounded up, then the
/// gap is removed. Short notes at fast tempos would go negative, so the
/// result is clamped to one frame.
pub fn buffer_len(duration_ticks: usize, bpm: u8) -> usize {
    let bpm = bpm.max(1) as u64;
    let nominal = (duration_ticks as u64 * SAMPLES_PER_TICK_TIMES_BPM).div_ceil(bpm);
    nominal.saturating_sub(trailing_gap(bpm as u8)).max(1) as usize
}

/// Equal-temperament frequency of `note` (A440 at 69). The top bit is
/// ignored.
pub fn note_frequency(note: u8) -> f64 {
    let semitones = (note & NOTE_MASK) as i32 - A4_NOTE;
    A4_FREQUENCY * 2f64.powf(semitones as f64 / 12.0)
}

/// Square wave tone generator
///
/// Emits `-FULL_SCALE` for the first half of each cycle and `+FULL_SCALE`
/// for the second half. The cycle is fractional, so edges follow the
/// exact phase of each sample index.
#[derive(Clone, Debug)]
pub struct ToneGenerator {
    /// Cycle length in samples
    cycle: f64,
    /// Next sample index
    index: usize,
}

impl ToneGenerator {
    /// Create a generator for `note`.
    pub fn new(note: u8) -> Self {
        Self {
            cycle: SAMPLE_RATE as f64 / note_frequency(note),
            index: 0,
        }
    }

    /// Cycle length in samples.
    pub fn period_samples(&self) -> f64 {
        self.cycle
    }

    /// Sample at an absolute index.
    #[inline]
    pub fn sample_at(&self, index: usize) -> i16 {
        if (index as f64) % self.cycle > self.cycle / 2.0 {
            FULL_SCALE
        } else {
            -FULL_SCALE
        }
    }
}

impl Iterator for ToneGenerator {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let sample = self.sample_at(self.index);
        self.index += 1;
        Some(sample)
    }
}

/// Percussion noise colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseVariant {
    /// Longest cycle, lowest perceived pitch.
    Low = 0,
    /// Medium cycle.
    Mid = 1,
    /// Shortest cycle, highest perceived pitch.
    High = 2,
}

impl NoiseVariant {
    /// All variants, low to high.
    pub const ALL: [NoiseVariant; 3] = [NoiseVariant::Low, NoiseVariant::Mid, NoiseVariant::High];

    /// Variant for a 0-based index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Samples per hash step.
    pub fn cycle(self) -> f64 {
        NOISE_CYCLES[self as usize]
    }
}

/// 1-bit integer hash used by the noise generator.
///
/// Two rounds of `x = ((x >> 16) ^ x) * 0x119de1f3`, each truncated to 32
/// bits, then a final `(x >> 16) ^ x`; the lowest bit is the output.
#[inline]
pub fn hash_bit(seed: u64) -> bool {
    let mut x = seed;
    x = (((x >> 16) ^ x).wrapping_mul(NOISE_HASH_MULTIPLIER)) & 0xffff_ffff;
    x = (((x >> 16) ^ x).wrapping_mul(NOISE_HASH_MULTIPLIER)) & 0xffff_ffff;
    x = (x >> 16) ^ x;
    x & 1 == 1
}

/// Hashed noise generator
///
/// Holds each hash output for one variant cycle, giving a deterministic
/// pseudo-random square pattern.
#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    variant: NoiseVariant,
    index: usize,
}

impl NoiseGenerator {
    /// Create a generator for `variant`.
    pub fn new(variant: NoiseVariant) -> Self {
        Self { variant, index: 0 }
    }

    /// Output bit at an absolute sample index.
    #[inline]
    pub fn bit_at(&self, index: usize) -> bool {
        noise_bit(index, self.variant)
    }
}

impl Iterator for NoiseGenerator {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let sample = if self.bit_at(self.index) {
            FULL_SCALE
        } else {
            -FULL_SCALE
        };
        self.index += 1;
        Some(sample)
    }
}

/// Noise bit for `sample_index` under `variant`.
#[inline]
pub fn noise_bit(sample_index: usize, variant: NoiseVariant) -> bool {
    let step = (sample_index as f64 / variant.cycle()).floor() as u64;
    hash_bit(step)
}

/// Render a square-wave note lasting `duration_ticks` ticks at `bpm`.
pub fn square(note: u8, duration_ticks: usize, bpm: u8) -> PcmBuffer {
    let len = buffer_len(duration_ticks, bpm);
    PcmBuffer::from_mono(ToneGenerator::new(note).take(len))
}

/// Render one tick of percussion noise at `bpm`.
pub fn noise(variant: NoiseVariant, bpm: u8) -> PcmBuffer {
    let len = buffer_len(1, bpm);
    PcmBuffer::from_mono(NoiseGenerator::new(variant).take(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn expected_len(d: u64, bpm: u64) -> usize {
        let nominal = (d * 44_100 * 30 + bpm - 1) / bpm;
        let gap = (330_750 / bpm).min(1_500);
        nominal.saturating_sub(gap).max(1) as usize
    }

    #[test]
    fn test_note_frequency_reference_points() {
        assert_relative_eq!(note_frequency(69), 440.0);
        assert_relative_eq!(note_frequency(81), 880.0);
        assert_relative_eq!(note_frequency(60), 261.625_565, epsilon = 1e-5);
        // Accent bit does not change pitch.
        assert_relative_eq!(note_frequency(69 | 0x80), 440.0);
    }

    #[test]
    fn test_trailing_gap() {
        assert_eq!(trailing_gap(1), 1_500);
        assert_eq!(trailing_gap(120), 1_500);
        assert_eq!(trailing_gap(221), 1_496);
        assert_eq!(trailing_gap(255), 1_297);
    }

    #[test]
    fn test_square_length_exact() {
        for &(note, d, bpm) in &[
            (60u8, 1usize, 120u8),
            (60, 8, 120),
            (64, 56, 120),
            (33, 1, 255),
            (100, 3, 255),
            (69, 1, 1),
            (12, 64, 1),
            (72, 5, 97),
        ] {
            let buffer = square(note, d, bpm);
            let want = expected_len(d as u64, bpm as u64);
            assert_eq!(buffer.frames(), want, "note {note} d {d} bpm {bpm}");
            assert_eq!(buffer.samples().len(), want * 2);
        }
        assert_eq!(square(60, 8, 120).frames(), 8 * 11_025 - 1_500);
        assert_eq!(square(60, 1, 255).frames(), 5_189 - 1_297);
    }

    #[test]
    fn test_buffer_len_never_zero() {
        assert_eq!(buffer_len(0, 120), 1);
        assert_eq!(buffer_len(0, 255), 1);
    }

    #[test]
    fn test_square_shape() {
        let buffer = square(69, 1, 120);
        let mono: Vec<i16> = buffer.mono().collect();
        let cycle = 44_100.0 / 440.0;
        assert_eq!(mono[0], -FULL_SCALE);
        assert_eq!(mono[50], -FULL_SCALE);
        assert_eq!(mono[51], FULL_SCALE);
        assert_eq!(mono[100], FULL_SCALE);
        assert_eq!(mono[101], -FULL_SCALE);
        let highs = mono.iter().filter(|&&s| s == FULL_SCALE).count() as f64;
        assert_relative_eq!(highs / mono.len() as f64, 0.5, epsilon = 0.01);
        assert_relative_eq!(ToneGenerator::new(69).period_samples(), cycle);
        let generator = ToneGenerator::new(57);
        assert_relative_eq!(generator.period_samples(), 2.0 * cycle, epsilon = 1e-9);
        assert_eq!(generator.take(4).count(), 4);
    }

    #[test]
    fn test_stereo_channels_identical() {
        let buffer = square(64, 2, 140);
        for frame in buffer.samples().chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_hash_bit_known_values() {
        let expected = [false, true, false, true, false, false, false, true];
        for (seed, &bit) in expected.iter().enumerate() {
            assert_eq!(hash_bit(seed as u64), bit, "seed {seed}");
        }
        let a: Vec<bool> = (0..64).map(hash_bit).collect();
        let b: Vec<bool> = (0..64).map(hash_bit).collect();
        assert_eq!(a, b);
        // Not constant.
        assert!(a.iter().any(|&bit| bit) && a.iter().any(|&bit| !bit));
    }

    #[test]
    fn test_noise_is_deterministic() {
        for variant in NoiseVariant::ALL {
            assert_eq!(noise(variant, 120), noise(variant, 120));
            for index in [0usize, 17, 45, 46, 1_000, 9_999] {
                assert_eq!(noise_bit(index, variant), noise_bit(index, variant));
            }
        }
    }

    #[test]
    fn test_noise_holds_bit_for_cycle() {
        let generator = NoiseGenerator::new(NoiseVariant::Low);
        // Indices 0..=45 share hash step 0.
        let first = generator.bit_at(0);
        assert!((0..=45).all(|i| generator.bit_at(i) == first));
    }

    #[test]
    fn test_noise_length_is_one_tick() {
        assert_eq!(noise(NoiseVariant::High, 120).frames(), 11_025 - 1_500);
        assert_eq!(noise(NoiseVariant::Low, 255).frames(), expected_len(1, 255));
    }

    #[test]
    fn test_noise_variant_cycles_ordered() {
        assert!(NoiseVariant::Low.cycle() > NoiseVariant::Mid.cycle());
        assert!(NoiseVariant::Mid.cycle() > NoiseVariant::High.cycle());
        assert_eq!(NoiseVariant::from_index(2), Some(NoiseVariant::High));
        assert_eq!(NoiseVariant::from_index(3), None);
    }
}
