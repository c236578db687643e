//! Terminal visualization helpers
//!
//! Text renderings of a [`PlaybackSnapshot`] for the status line.

use crate::constants::TICKS_PER_MEASURE;
use crate::replayer::{MelodyPhase, PlaybackSnapshot};
use crate::score::{Score, NOTE_MASK};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name of a note number, e.g. 60 is `C4` and 69 is `A4`. The accent bit is
/// ignored.
pub fn note_name(note: u8) -> String {
    let note = (note & NOTE_MASK) as usize;
    format!("{}{}", NOTE_NAMES[note % 12], (note / 12) as i32 - 1)
}

/// Format seconds as `m:ss.s`, rounded to the nearest tenth.
pub fn format_time(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    let minutes = tenths / 600;
    let rest = tenths % 600;
    format!("{}:{:02}.{}", minutes, rest / 10, rest % 10)
}

/// Render the measure strip `S 0 1 ... E`, bracketing entry `current`
/// (0 is the lead-in, `n + 1` the ending). Out-of-range `current` marks
/// nothing.
pub fn create_block_strip(sequence: &[u8], current: Option<usize>) -> String {
    let labels = std::iter::once("S".to_string())
        .chain(sequence.iter().map(|index| index.to_string()))
        .chain(std::iter::once("E".to_string()));

    labels
        .enumerate()
        .map(|(i, label)| {
            if Some(i) == current {
                format!("[{label}]")
            } else {
                label
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Step progress bar for the current measure, `width` cells wide.
pub fn create_step_bar(step: usize, width: usize) -> String {
    let filled = ((step + 1) * width) / TICKS_PER_MEASURE;
    format!("{}{}", "#".repeat(filled.min(width)), "-".repeat(width - filled.min(width)))
}

/// One-line status: phase, strip, step and elapsed/total time.
pub fn format_status_line(snapshot: &PlaybackSnapshot, score: &Score) -> String {
    let current = match snapshot.phase {
        MelodyPhase::Stopped => None,
        _ if snapshot.tick < 0 => None,
        _ => Some(snapshot.measure),
    };
    format!(
        "{:<8} | {} | step {:>2} {} | {} / {}",
        snapshot.phase.to_string(),
        create_block_strip(score.block_sequence(), current),
        snapshot.step,
        create_step_bar(snapshot.step, 16),
        format_time(snapshot.elapsed.min(snapshot.total)),
        format_time(snapshot.total)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreBuilder;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00.0");
        assert_eq!(format_time(9.94), "0:09.9");
        assert_eq!(format_time(9.99), "0:10.0");
        assert_eq!(format_time(59.96), "1:00.0");
        assert_eq!(format_time(64.27), "1:04.3");
        assert_eq!(format_time(-3.0), "0:00.0");
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(0x80 | 61), "C#4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
    }

    #[test]
    fn test_block_strip() {
        assert_eq!(create_block_strip(&[0, 1], None), "S 0 1 E");
        assert_eq!(create_block_strip(&[0, 1], Some(0)), "[S] 0 1 E");
        assert_eq!(create_block_strip(&[2, 4], Some(2)), "S 2 [4] E");
        assert_eq!(create_block_strip(&[3], Some(2)), "S 3 [E]");
    }

    #[test]
    fn test_step_bar() {
        assert_eq!(create_step_bar(0, 16), "----------------");
        assert_eq!(create_step_bar(3, 16), "#---------------");
        assert_eq!(create_step_bar(63, 16), "################");
    }

    #[test]
    fn test_status_line() {
        let score = ScoreBuilder::new().block_sequence(&[0, 3]).build().unwrap();
        let snapshot = PlaybackSnapshot {
            tick: 70,
            phase: MelodyPhase::Block(0),
            step: 6,
            measure: 1,
            elapsed: 17.5,
            total: 64.0,
        };
        let line = format_status_line(&snapshot, &score);
        assert!(line.starts_with("Block 0"));
        assert!(line.contains("S [0] 3 E"));
        assert!(line.contains("step  6"));
        assert!(line.ends_with("0:17.5 / 1:04.0"));
    }
}
