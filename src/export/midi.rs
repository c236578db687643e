//! MIDI export of blocks and the chord loop
//!
//! One score tick is half a beat. Every note has velocity 64.

use crate::constants::{
    BLOCK_COUNT, CHORD_GROUPS, MAX_MIDI_TICKS_PER_BEAT, TICKS_PER_BAR, VOICES_PER_GROUP,
};
use crate::score::{Block, Score, NOTE_MASK};
use crate::{PlayerError, Result};
use log::info;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::{Path, PathBuf};

/// Velocity of every exported note.
pub const EXPORT_VELOCITY: u8 = 64;

/// Score ticks per MIDI beat.
const TICKS_PER_BEAT: u32 = 2;

/// Chord loop repeats within one exported measure.
const CHORD_LOOP_REPEATS: u32 = 2;

/// A note in score ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiNote {
    /// Start tick
    pub start: u32,
    /// Length in ticks
    pub length: u32,
    /// Note number (0-127)
    pub key: u8,
}

/// Notes of one block: every onset lasts until the next onset or the end
/// of the block.
pub fn block_notes(block: &Block) -> Vec<MidiNote> {
    block
        .onsets()
        .map(|(step, raw, length)| MidiNote {
            start: step as u32,
            length: length as u32,
            key: raw & NOTE_MASK,
        })
        .collect()
}

/// Notes of one chord voice: the four chords laid out with the chord
/// pattern, one bar each, and the whole loop played twice.
pub fn chord_voice_notes(score: &Score, voice: usize) -> Vec<MidiNote> {
    let loop_ticks = (CHORD_GROUPS * TICKS_PER_BAR) as u32;
    let mut notes = Vec::new();
    for repeat in 0..CHORD_LOOP_REPEATS {
        for group in 0..CHORD_GROUPS {
            let key = score.chord_progression()[group * VOICES_PER_GROUP + voice] & NOTE_MASK;
            let mut offset = (group * TICKS_PER_BAR) as u32 + repeat * loop_ticks;
            for &run in score.chord_pattern() {
                notes.push(MidiNote {
                    start: offset,
                    length: run as u32,
                    key,
                });
                offset += run as u32;
            }
        }
    }
    notes.sort_by_key(|note| note.start);
    notes
}

/// Microseconds per beat for a tempo, clamped to the 24-bit meta field.
pub fn micros_per_beat(bpm: u8) -> u32 {
    (60_000_000 / bpm.max(1) as u32).min(0xFF_FFFF)
}

fn tempo_event(bpm: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::from(0_u32),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(micros_per_beat(bpm)))),
    }
}

/// MIDI tick of a score tick. Odd resolutions round half-beats down.
fn to_midi_ticks(score_tick: u32, ticks_per_beat: u16) -> u32 {
    score_tick * ticks_per_beat as u32 / TICKS_PER_BEAT
}

/// Build one track: tempo, then note on/off pairs. Note-offs sort before
/// note-ons at the same time.
fn build_track(notes: &[MidiNote], bpm: u8, ticks_per_beat: u16) -> Vec<TrackEvent<'static>> {
    let mut absolute: Vec<(u32, u8, MidiMessage)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let key = u7::from(note.key & NOTE_MASK);
        absolute.push((
            to_midi_ticks(note.start, ticks_per_beat),
            1,
            MidiMessage::NoteOn {
                key,
                vel: u7::from(EXPORT_VELOCITY),
            },
        ));
        absolute.push((
            to_midi_ticks(note.start + note.length, ticks_per_beat),
            0,
            MidiMessage::NoteOff {
                key,
                vel: u7::from(0),
            },
        ));
    }
    absolute.sort_by_key(|&(tick, order, _)| (tick, order));

    let mut track = Vec::with_capacity(absolute.len() + 2);
    track.push(tempo_event(bpm));
    let mut previous = 0_u32;
    for (tick, _, message) in absolute {
        track.push(TrackEvent {
            delta: u28::from(tick - previous),
            kind: TrackEventKind::Midi {
                channel: u4::from(0),
                message,
            },
        });
        previous = tick;
    }
    track.push(TrackEvent {
        delta: u28::from(0_u32),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

fn encode(tracks: Vec<Vec<TrackEvent<'static>>>, format: Format, ticks_per_beat: u16) -> Result<Vec<u8>> {
    let header = Header {
        format,
        timing: Timing::Metrical(u15::from(ticks_per_beat)),
    };
    let mut bytes = Vec::new();
    Smf { header, tracks }
        .write_std(&mut bytes)
        .map_err(|e| PlayerError::AudioFileError(format!("Failed to encode MIDI: {e}")))?;
    Ok(bytes)
}

fn check_resolution(ticks_per_beat: u16) -> Result<()> {
    if !(1..=MAX_MIDI_TICKS_PER_BEAT).contains(&ticks_per_beat) {
        return Err(PlayerError::ConfigError(format!(
            "MIDI resolution {ticks_per_beat} outside 1-{MAX_MIDI_TICKS_PER_BEAT}"
        )));
    }
    Ok(())
}

/// Encode block `index` as a single-track MIDI file.
pub fn block_to_midi(score: &Score, index: usize, ticks_per_beat: u16) -> Result<Vec<u8>> {
    check_resolution(ticks_per_beat)?;
    let block = score
        .block(index)
        .ok_or_else(|| PlayerError::Other(format!("no block {index}")))?;
    let track = build_track(&block_notes(block), score.tempo(), ticks_per_beat);
    encode(vec![track], Format::SingleTrack, ticks_per_beat)
}

/// Encode the chord loop as a three-track MIDI file, one track per voice.
pub fn chords_to_midi(score: &Score, ticks_per_beat: u16) -> Result<Vec<u8>> {
    check_resolution(ticks_per_beat)?;
    let tracks = (0..VOICES_PER_GROUP)
        .map(|voice| build_track(&chord_voice_notes(score, voice), score.tempo(), ticks_per_beat))
        .collect();
    encode(tracks, Format::Parallel, ticks_per_beat)
}

/// Write `block0.mid` .. `block4.mid` and `chords.mid` into `dir`,
/// creating it if needed. Returns the paths written.
pub fn export_midi<P: AsRef<Path>>(
    score: &Score,
    dir: P,
    ticks_per_beat: u16,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(BLOCK_COUNT + 1);
    for index in 0..BLOCK_COUNT {
        let path = dir.join(format!("block{index}.mid"));
        std::fs::write(&path, block_to_midi(score, index, ticks_per_beat)?)?;
        written.push(path);
    }
    let path = dir.join("chords.mid");
    std::fs::write(&path, chords_to_midi(score, ticks_per_beat)?)?;
    written.push(path);

    info!("wrote {} MIDI files to {}", written.len(), dir.display());
    Ok(written)
}
