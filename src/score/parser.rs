//! Score decoder
//!
//! Reads the fixed field layout with `nom` combinators and turns every
//! short read into a [`DecodeError`] naming the field and its offset.

use super::{Block, ChordBoundaries, DecodeError, Score, SEQUENCE_TERMINATOR};
use crate::constants::{BLOCK_COUNT, CHORD_GROUPS, TICKS_PER_BAR, TICKS_PER_MEASURE, VOICES_PER_GROUP};
use log::debug;
use nom::bytes::complete::{tag, take, take_till};
use nom::number::complete::be_u8;

type NomError<'a> = nom::error::Error<&'a [u8]>;

const GROUP_NOTES: usize = CHORD_GROUPS * VOICES_PER_GROUP;

/// Decode a score from raw bytes.
///
/// Trailing bytes after the last block are ignored.
pub fn decode(data: &[u8]) -> Result<Score, DecodeError> {
    ScoreParser::new(data).parse()
}

/// Unpack two bytes into eight 2-bit fields, most-significant field first.
pub fn unpack_two_bit_fields(bytes: [u8; 2]) -> [u8; TICKS_PER_BAR] {
    let mut fields = [0u8; TICKS_PER_BAR];
    for (i, field) in fields.iter_mut().enumerate() {
        let shift = 6 - 2 * (i % 4);
        *field = (bytes[i / 4] >> shift) & 0b11;
    }
    fields
}

/// Pack eight 2-bit fields into two bytes. Values are masked to 2 bits.
pub fn pack_two_bit_fields(fields: &[u8; TICKS_PER_BAR]) -> [u8; 2] {
    let mut bytes = [0u8; 2];
    for (i, &field) in fields.iter().enumerate() {
        let shift = 6 - 2 * (i % 4);
        bytes[i / 4] |= (field & 0b11) << shift;
    }
    bytes
}

/// Encode chord run-lengths into a mask byte. `None` if the runs are not a
/// partition of 8 into positive parts.
pub fn encode_chord_pattern(runs: &[u8]) -> Option<u8> {
    ChordBoundaries::from_runs(runs).map(|flags| flags.bits())
}

/// Cursor over a score byte stream.
pub struct ScoreParser<'a> {
    data: &'a [u8],
    rest: &'a [u8],
}

impl<'a> ScoreParser<'a> {
    /// Create a parser positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, rest: data }
    }

    /// Current byte offset.
    pub fn offset(&self) -> usize {
        self.data.len() - self.rest.len()
    }

    fn byte(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        let offset = self.offset();
        let available = self.rest.len();
        let (rest, value) = be_u8::<_, NomError<'a>>(self.rest).map_err(|_| {
            DecodeError::Truncated {
                field,
                offset,
                needed: 1,
                available,
            }
        })?;
        self.rest = rest;
        Ok(value)
    }

    fn bytes<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let offset = self.offset();
        let available = self.rest.len();
        let (rest, slice) = take::<_, _, NomError<'a>>(N)(self.rest).map_err(|_| {
            DecodeError::Truncated {
                field,
                offset,
                needed: N,
                available,
            }
        })?;
        self.rest = rest;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn block_sequence(&mut self) -> Result<Vec<u8>, DecodeError> {
        let start = self.offset();
        let (rest, entries) =
            take_till::<_, _, NomError<'a>>(|byte| byte == SEQUENCE_TERMINATOR)(self.rest)
                .map_err(|_| DecodeError::MissingTerminator { offset: start })?;
        let (rest, _) = tag::<_, _, NomError<'a>>(&[SEQUENCE_TERMINATOR][..])(rest)
            .map_err(|_| DecodeError::MissingTerminator { offset: start })?;

        if entries.is_empty() {
            return Err(DecodeError::EmptyBlockSequence { offset: start });
        }

        let mut sequence = Vec::with_capacity(entries.len());
        for (position, &byte) in entries.iter().enumerate() {
            let index = byte as usize - 1;
            if index >= BLOCK_COUNT {
                return Err(DecodeError::BlockIndexOutOfRange {
                    position,
                    offset: start + position,
                    index,
                    available: BLOCK_COUNT,
                });
            }
            sequence.push(index as u8);
        }

        self.rest = rest;
        Ok(sequence)
    }

    /// Parse the full score.
    pub fn parse(mut self) -> Result<Score, DecodeError> {
        let tempo = self.byte("tempo")?;
        if tempo == 0 {
            return Err(DecodeError::ZeroTempo);
        }

        let chord_progression = self.bytes::<GROUP_NOTES>("chord progression")?;
        let chord_mask = self.byte("chord pattern mask")?;
        let chord_boundaries = ChordBoundaries::from_mask(chord_mask);
        let chord_pattern = chord_boundaries.runs();
        let bass_notes = self.bytes::<GROUP_NOTES>("bass notes")?;
        let bass_pattern = unpack_two_bit_fields(self.bytes::<2>("bass pattern")?);
        let beat_pattern = unpack_two_bit_fields(self.bytes::<2>("beat pattern")?);
        let block_sequence = self.block_sequence()?;

        let mut blocks = [Block::SILENT; BLOCK_COUNT];
        for (index, block) in blocks.iter_mut().enumerate() {
            let field = BLOCK_FIELDS[index];
            *block = Block::new(self.bytes::<TICKS_PER_MEASURE>(field)?);
        }

        if !self.rest.is_empty() {
            debug!("ignoring {} trailing bytes after blocks", self.rest.len());
        }
        debug!(
            "decoded score: {} BPM, chord runs {:?}, {} sequenced blocks",
            tempo,
            chord_pattern,
            block_sequence.len()
        );

        Ok(Score {
            tempo,
            chord_progression,
            chord_mask,
            chord_boundaries,
            chord_pattern,
            bass_notes,
            bass_pattern,
            beat_pattern,
            block_sequence,
            blocks,
        })
    }
}

const BLOCK_FIELDS: [&str; BLOCK_COUNT] = ["block 0", "block 1", "block 2", "block 3", "block 4"];
