//! Error types for score decoding.

use thiserror::Error;

/// Errors raised while decoding a binary score.
///
/// Every variant carries the byte offset (and field name where one applies)
/// so a malformed file can be diagnosed without a hex editor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended before a fixed-size field was complete.
    #[error("score truncated in {field} at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Offset where the field starts.
        offset: usize,
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the input.
        available: usize,
    },

    /// The block sequence ran to the end of the input without a 0x00 byte.
    #[error("block sequence starting at offset {offset} has no 0x00 terminator")]
    MissingTerminator {
        /// Offset where the block sequence starts.
        offset: usize,
    },

    /// Tempo byte is zero, which would make the tick duration infinite.
    #[error("tempo at offset 0 must be between 1 and 255 BPM, got 0")]
    ZeroTempo,

    /// The block sequence holds no entries.
    #[error("block sequence at offset {offset} is empty")]
    EmptyBlockSequence {
        /// Offset of the terminator byte.
        offset: usize,
    },

    /// A block sequence entry resolves to a block that does not exist.
    #[error("block sequence entry {position} at offset {offset} selects block {index}, only blocks 0..{available} exist")]
    BlockIndexOutOfRange {
        /// Position of the entry in the sequence.
        position: usize,
        /// Offset of the entry byte.
        offset: usize,
        /// Decoded block index (`byte - 1`).
        index: usize,
        /// Number of blocks in a score.
        available: usize,
    },
}

impl DecodeError {
    /// Whether this is a range violation rather than a structural defect.
    pub fn is_range_error(&self) -> bool {
        matches!(self, DecodeError::BlockIndexOutOfRange { .. })
    }

    /// Offset in the input the error points at, if any.
    pub fn offset(&self) -> Option<usize> {
        match self {
            DecodeError::Truncated { offset, .. }
            | DecodeError::MissingTerminator { offset }
            | DecodeError::EmptyBlockSequence { offset }
            | DecodeError::BlockIndexOutOfRange { offset, .. } => Some(*offset),
            DecodeError::ZeroTempo => Some(0),
        }
    }
}
