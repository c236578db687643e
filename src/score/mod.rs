//! Binary score format
//!
//! A score is a fixed-layout byte stream describing one looping accompaniment
//! (chords, bass, percussion) and a sequence of 64-step melodic blocks.
//!
//! Format details:
//! - Tempo: 1 byte (BPM, 1-255)
//! - Chord progression: 12 note bytes (4 chords x 3 voices)
//! - Chord pattern mask: 1 byte of boundary flags
//! - Bass notes: 12 note bytes (4 groups x 3 voices)
//! - Bass and beat patterns: 2 bytes each, eight 2-bit fields
//! - Block sequence: `index + 1` bytes terminated by 0x00
//! - Blocks: 5 x 64 step bytes (bit 7 accent, bits 0-6 note)

mod error;
pub mod parser;


pub use error::DecodeError;
pub use parser::{
    decode, encode_chord_pattern, pack_two_bit_fields, unpack_two_bit_fields, ScoreParser,
};

use crate::constants::{BLOCK_COUNT, CHORD_GROUPS, TICKS_PER_BAR, TICKS_PER_MEASURE, VOICES_PER_GROUP};
use bitflags::bitflags;

/// Step byte bit marking an accented (highlighted) note. Display only.
pub const ACCENT_FLAG: u8 = 0x80;

/// Step byte bits holding the note number.
pub const NOTE_MASK: u8 = 0x7F;

/// Byte terminating the block sequence.
pub const SEQUENCE_TERMINATOR: u8 = 0x00;

bitflags! {
    /// Chord pattern boundary flags.
    ///
    /// The mask byte is read MSB-first: flag 0 is bit 7 and is ignored, flag
    /// `p` (1..=7) marks a chord change before step `p` of the 8-step bar.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChordBoundaries: u8 {
        /// Change before step 1.
        const STEP_1 = 0b0100_0000;
        /// Change before step 2.
        const STEP_2 = 0b0010_0000;
        /// Change before step 3.
        const STEP_3 = 0b0001_0000;
        /// Change before step 4.
        const STEP_4 = 0b0000_1000;
        /// Change before step 5.
        const STEP_5 = 0b0000_0100;
        /// Change before step 6.
        const STEP_6 = 0b0000_0010;
        /// Change before step 7.
        const STEP_7 = 0b0000_0001;
    }
}

impl ChordBoundaries {
    /// Interpret a raw mask byte, dropping the unused top bit.
    pub fn from_mask(mask: u8) -> Self {
        Self::from_bits_truncate(mask)
    }

    /// Flag for a boundary before `position` (1..=7). Other positions yield
    /// an empty set.
    pub fn at(position: usize) -> Self {
        if (1..TICKS_PER_BAR).contains(&position) {
            Self::from_bits_truncate(0x80 >> position)
        } else {
            Self::empty()
        }
    }

    /// Expand the flags into run-lengths summing to 8.
    pub fn runs(self) -> Vec<u8> {
        let mut runs = Vec::with_capacity(TICKS_PER_BAR);
        let mut previous = 0;
        for position in 1..=TICKS_PER_BAR {
            if position == TICKS_PER_BAR || self.contains(Self::at(position)) {
                runs.push((position - previous) as u8);
                previous = position;
            }
        }
        runs
    }

    /// Build flags from run-lengths. Returns `None` unless every run is
    /// positive and they sum to exactly 8.
    pub fn from_runs(runs: &[u8]) -> Option<Self> {
        let mut flags = Self::empty();
        let mut position = 0usize;
        for &run in runs {
            if run == 0 {
                return None;
            }
            position += run as usize;
            if position > TICKS_PER_BAR {
                return None;
            }
            flags |= Self::at(position);
        }
        (position == TICKS_PER_BAR).then_some(flags)
    }
}

/// One 64-step melodic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block([u8; TICKS_PER_MEASURE]);

impl Block {
    /// An all-rest block.
    pub const SILENT: Block = Block([0; TICKS_PER_MEASURE]);

    /// Wrap raw step bytes.
    pub fn new(steps: [u8; TICKS_PER_MEASURE]) -> Self {
        Block(steps)
    }

    /// Raw step bytes.
    pub fn steps(&self) -> &[u8; TICKS_PER_MEASURE] {
        &self.0
    }

    /// Raw byte at `step`, accent bit included.
    #[inline]
    pub fn raw(&self, step: usize) -> u8 {
        self.0[step]
    }

    /// Note number at `step` (accent bit stripped).
    #[inline]
    pub fn note(&self, step: usize) -> u8 {
        self.0[step] & NOTE_MASK
    }

    /// Whether the step carries the accent flag.
    #[inline]
    pub fn is_accent(&self, step: usize) -> bool {
        self.0[step] & ACCENT_FLAG != 0
    }

    /// Whether a new note starts at `step`. Any nonzero byte starts a note,
    /// an accent with note number 0 included.
    #[inline]
    pub fn is_onset(&self, step: usize) -> bool {
        self.0[step] != 0
    }

    /// Ticks the note starting at `step` lasts: the step itself plus every
    /// following zero step, stopping at the end of the block.
    pub fn run_length(&self, step: usize) -> usize {
        1 + self.0[step + 1..]
            .iter()
            .take_while(|&&byte| byte == 0)
            .count()
    }

    /// Iterate over `(step, raw byte, duration)` for every note onset.
    pub fn onsets(&self) -> impl Iterator<Item = (usize, u8, usize)> + '_ {
        (0..TICKS_PER_MEASURE)
            .filter(|&step| self.is_onset(step))
            .map(|step| (step, self.0[step], self.run_length(step)))
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::SILENT
    }
}

/// A decoded score. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub(crate) tempo: u8,
    pub(crate) chord_progression: [u8; CHORD_GROUPS * VOICES_PER_GROUP],
    pub(crate) chord_mask: u8,
    pub(crate) chord_boundaries: ChordBoundaries,
    pub(crate) chord_pattern: Vec<u8>,
    pub(crate) bass_notes: [u8; CHORD_GROUPS * VOICES_PER_GROUP],
    pub(crate) bass_pattern: [u8; TICKS_PER_BAR],
    pub(crate) beat_pattern: [u8; TICKS_PER_BAR],
    pub(crate) block_sequence: Vec<u8>,
    pub(crate) blocks: [Block; BLOCK_COUNT],
}

impl Score {
    /// Tempo in beats per minute (1-255).
    pub fn tempo(&self) -> u8 {
        self.tempo
    }

    /// The 12 chord notes, chord-major.
    pub fn chord_progression(&self) -> &[u8; CHORD_GROUPS * VOICES_PER_GROUP] {
        &self.chord_progression
    }

    /// The three voices of chord `group` (0-3).
    pub fn chord(&self, group: usize) -> &[u8] {
        let start = (group % CHORD_GROUPS) * VOICES_PER_GROUP;
        &self.chord_progression[start..start + VOICES_PER_GROUP]
    }

    /// The chord pattern mask byte as stored in the file, top bit included.
    pub fn chord_mask(&self) -> u8 {
        self.chord_mask
    }

    /// Boundary flags the chord pattern was decoded from.
    pub fn chord_boundaries(&self) -> ChordBoundaries {
        self.chord_boundaries
    }

    /// Chord run-lengths, summing to 8.
    pub fn chord_pattern(&self) -> &[u8] {
        &self.chord_pattern
    }

    /// The 12 bass notes, group-major.
    pub fn bass_notes(&self) -> &[u8; CHORD_GROUPS * VOICES_PER_GROUP] {
        &self.bass_notes
    }

    /// Bass pattern: 0 rest, 1-3 voice within the active group.
    pub fn bass_pattern(&self) -> &[u8; TICKS_PER_BAR] {
        &self.bass_pattern
    }

    /// Percussion pattern: 0 rest, 1-3 noise variant plus one.
    pub fn beat_pattern(&self) -> &[u8; TICKS_PER_BAR] {
        &self.beat_pattern
    }

    /// Block index played in each measure after the lead-in.
    pub fn block_sequence(&self) -> &[u8] {
        &self.block_sequence
    }

    /// All five blocks.
    pub fn blocks(&self) -> &[Block; BLOCK_COUNT] {
        &self.blocks
    }

    /// Block `index`, if it exists.
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Block played in the last sequenced measure.
    pub fn last_block(&self) -> &Block {
        // Decoding rejects empty sequences and out-of-range entries.
        let index = self.block_sequence.last().copied().unwrap_or(0) as usize;
        &self.blocks[index]
    }

    /// Measures in the whole playback: lead-in, sequence, and ending.
    pub fn measure_count(&self) -> usize {
        self.block_sequence.len() + 2
    }

    /// Tick at which the scheduler stops.
    pub fn total_ticks(&self) -> usize {
        self.measure_count() * TICKS_PER_MEASURE
    }

    /// Total playback length in seconds.
    pub fn total_duration(&self) -> f64 {
        self.total_ticks() as f64 * crate::replayer::tick_duration(self.tempo)
    }

    /// Serialize back into the binary layout. The output matches the decoded
    /// input up to the last block; trailing bytes are not kept.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            31 + self.block_sequence.len() + BLOCK_COUNT * TICKS_PER_MEASURE,
        );
        out.push(self.tempo);
        out.extend_from_slice(&self.chord_progression);
        out.push(self.chord_mask);
        out.extend_from_slice(&self.bass_notes);
        out.extend_from_slice(&pack_two_bit_fields(&self.bass_pattern));
        out.extend_from_slice(&pack_two_bit_fields(&self.beat_pattern));
        out.extend(self.block_sequence.iter().map(|&index| index + 1));
        out.push(SEQUENCE_TERMINATOR);
        for block in &self.blocks {
            out.extend_from_slice(block.steps());
        }
        out
    }
}

/// Builder for authoring scores in code.
///
/// Starts from tempo 120, silent patterns, a single whole-bar chord and a
/// block sequence of `[0]`. [`ScoreBuilder::build`] runs the result through
/// the decoder so every invariant is checked the same way a file would be.
#[derive(Debug, Clone)]
pub struct ScoreBuilder {
    tempo: u8,
    chord_progression: [u8; CHORD_GROUPS * VOICES_PER_GROUP],
    chord_mask: u8,
    bass_notes: [u8; CHORD_GROUPS * VOICES_PER_GROUP],
    bass_pattern: [u8; TICKS_PER_BAR],
    beat_pattern: [u8; TICKS_PER_BAR],
    block_sequence: Vec<u8>,
    blocks: [Block; BLOCK_COUNT],
}

impl Default for ScoreBuilder {
    fn default() -> Self {
        Self {
            tempo: 120,
            chord_progression: [0; CHORD_GROUPS * VOICES_PER_GROUP],
            chord_mask: 0,
            bass_notes: [0; CHORD_GROUPS * VOICES_PER_GROUP],
            bass_pattern: [0; TICKS_PER_BAR],
            beat_pattern: [0; TICKS_PER_BAR],
            block_sequence: vec![0],
            blocks: [Block::SILENT; BLOCK_COUNT],
        }
    }
}

impl ScoreBuilder {
    /// Create a builder with default content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tempo.
    pub fn tempo(mut self, bpm: u8) -> Self {
        self.tempo = bpm;
        self
    }

    /// Set the 12 chord notes.
    pub fn chord_progression(mut self, notes: [u8; CHORD_GROUPS * VOICES_PER_GROUP]) -> Self {
        self.chord_progression = notes;
        self
    }

    /// Set the raw chord boundary mask.
    pub fn chord_mask(mut self, mask: u8) -> Self {
        self.chord_mask = mask;
        self
    }

    /// Set the 12 bass notes.
    pub fn bass_notes(mut self, notes: [u8; CHORD_GROUPS * VOICES_PER_GROUP]) -> Self {
        self.bass_notes = notes;
        self
    }

    /// Set the bass pattern (values are masked to 2 bits).
    pub fn bass_pattern(mut self, pattern: [u8; TICKS_PER_BAR]) -> Self {
        self.bass_pattern = pattern;
        self
    }

    /// Set the percussion pattern (values are masked to 2 bits).
    pub fn beat_pattern(mut self, pattern: [u8; TICKS_PER_BAR]) -> Self {
        self.beat_pattern = pattern;
        self
    }

    /// Set the block sequence (0-based block indices).
    pub fn block_sequence(mut self, sequence: &[u8]) -> Self {
        self.block_sequence = sequence.to_vec();
        self
    }

    /// Replace block `index` (0-4).
    pub fn block(mut self, index: usize, block: Block) -> Self {
        self.blocks[index] = block;
        self
    }

    /// Set a single step of block `index`.
    pub fn step(mut self, index: usize, step: usize, value: u8) -> Self {
        self.blocks[index].0[step] = value;
        self
    }

    /// Encode to bytes without validation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.tempo);
        out.extend_from_slice(&self.chord_progression);
        out.push(self.chord_mask);
        out.extend_from_slice(&self.bass_notes);
        out.extend_from_slice(&pack_two_bit_fields(&self.bass_pattern));
        out.extend_from_slice(&pack_two_bit_fields(&self.beat_pattern));
        out.extend(self.block_sequence.iter().map(|&index| index.wrapping_add(1)));
        out.push(SEQUENCE_TERMINATOR);
        for block in &self.blocks {
            out.extend_from_slice(block.steps());
        }
        out
    }

    /// Encode and decode, validating every invariant.
    pub fn build(&self) -> Result<Score, DecodeError> {
        decode(&self.to_bytes())
    }
}
