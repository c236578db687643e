//! Player Constants
//!
//! Fixed timing, synthesis and layout constants shared by the decoder,
//! generators and scheduler.

/// Output sample rate in Hz. Every buffer is rendered at this rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Number of interleaved output channels (stereo).
pub const OUTPUT_CHANNELS: u16 = 2;

/// Positive full-scale sample value. Square and noise output swing between
/// `+FULL_SCALE` and `-FULL_SCALE`.
pub const FULL_SCALE: i16 = 32_767;

/// Seconds per tick is `TICK_SECONDS_PER_BPM / bpm`.
pub const TICK_SECONDS_PER_BPM: f64 = 30.0;

/// `SAMPLE_RATE * 30`: samples per tick multiplied by the tempo.
pub const SAMPLES_PER_TICK_TIMES_BPM: u64 = SAMPLE_RATE as u64 * 30;

/// `SAMPLE_RATE * 7.5`: trailing gap multiplied by the tempo.
pub const TRAILING_GAP_TIMES_BPM: u64 = 330_750;

/// Upper bound on the silent tail cut from every buffer.
pub const MAX_TRAILING_GAP: u64 = 1_500;

/// Ticks in one measure (and steps in one melodic block).
pub const TICKS_PER_MEASURE: usize = 64;

/// Ticks in one chord/percussion sub-cycle.
pub const TICKS_PER_BAR: usize = 8;

/// Number of melodic blocks stored in a score.
pub const BLOCK_COUNT: usize = 5;

/// Number of chord groups (and bass groups) in a score.
pub const CHORD_GROUPS: usize = 4;

/// Voices per chord or bass group.
pub const VOICES_PER_GROUP: usize = 3;

/// Note number of concert A.
pub const A4_NOTE: i32 = 69;

/// Frequency of concert A in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// Noise cycle lengths in samples, indexed by variant (low to high pitch).
pub const NOISE_CYCLES: [f64; 3] = [45.1584, 16.9344, 5.6448];

/// Multiplier used by the percussion hash.
pub const NOISE_HASH_MULTIPLIER: u64 = 0x119d_e1f3;

/// Default master volume applied on top of the channel levels.
pub const DEFAULT_MASTER_VOLUME: f32 = 0.3;

/// Default per-channel levels: melody, three chord voices, percussion, bass.
pub const DEFAULT_CHANNEL_VOLUMES: [f32; 6] = [0.2, 0.1, 0.1, 0.1, 0.2, 0.2];

/// Largest MIDI division expressible in ticks per quarter note.
pub const MAX_MIDI_TICKS_PER_BEAT: u16 = 0x7FFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_rates_match_sample_rate() {
        assert_eq!(SAMPLES_PER_TICK_TIMES_BPM, 1_323_000);
        assert_eq!(TRAILING_GAP_TIMES_BPM * 2, SAMPLE_RATE as u64 * 15);
    }

    #[test]
    fn test_noise_cycles_strictly_decreasing() {
        for pair in NOISE_CYCLES.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn test_measure_holds_whole_bars() {
        assert_eq!(TICKS_PER_MEASURE % TICKS_PER_BAR, 0);
        assert_eq!(TICKS_PER_MEASURE / TICKS_PER_BAR, CHORD_GROUPS * 2);
    }
}
