//! Playback scheduler
//!
//! Decides, once per tick edge, which channels fire and with what buffer.
//!
//! Timeline over tick `t` for a sequence of `n` blocks:
//! - `[0, 64)` lead-in: accompaniment only
//! - `[64, (n + 1) * 64)` one block per measure on the melody channel
//! - `(n + 1) * 64` ending: first step of the last block held for 8 ticks
//! - `(n + 2) * 64` stop: every channel is silenced
//!
//! Percussion, bass and chords run on every tick before the stop.

use super::channels::{AudioSink, Channel, ChannelBank};
use super::clock::BeatClock;
use crate::constants::{CHORD_GROUPS, TICKS_PER_BAR, TICKS_PER_MEASURE, VOICES_PER_GROUP};
use crate::generators::{noise, square, NoiseVariant};
use crate::score::{Score, NOTE_MASK};
use log::{debug, trace};
use std::fmt;
use std::sync::Arc;

/// Ticks the ending note is held.
const ENDING_TICKS: usize = 8;

const MEASURE: i64 = TICKS_PER_MEASURE as i64;

/// What the melody channel is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MelodyPhase {
    /// Lead-in measure, no melody.
    #[default]
    Start,
    /// Playing the block with this index.
    Block(u8),
    /// Final held note.
    End,
    /// Playback finished.
    Stopped,
}

impl fmt::Display for MelodyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MelodyPhase::Start => f.write_str("Start"),
            MelodyPhase::Block(index) => write!(f, "Block {index}"),
            MelodyPhase::End => f.write_str("End"),
            MelodyPhase::Stopped => f.write_str("Stopped"),
        }
    }
}

/// Read-only view of playback for renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSnapshot {
    /// Current tick (-1 before the first edge).
    pub tick: i64,
    /// Melody phase.
    pub phase: MelodyPhase,
    /// Step within the current measure (0-63).
    pub step: usize,
    /// Measure index: 0 lead-in, 1..=n blocks, n + 1 ending.
    pub measure: usize,
    /// Seconds since playback started.
    pub elapsed: f64,
    /// Total playback length in seconds.
    pub total: f64,
}

/// Playback scheduler
///
/// Owns the beat clock, the channel assignment state and the chord
/// accumulator. The score itself is shared read-only.
#[derive(Debug, Clone)]
pub struct PlaybackScheduler {
    score: Arc<Score>,
    clock: BeatClock,
    channels: ChannelBank,
    phase: MelodyPhase,
    /// Tick at which the next chord fires
    chord_time: i64,
    /// Index into the chord pattern of the chord now sounding
    chord_cursor: usize,
}

impl PlaybackScheduler {
    /// Create a scheduler whose clock starts at `start` seconds.
    pub fn new(score: Arc<Score>, start: f64) -> Self {
        let clock = BeatClock::new(score.tempo(), start);
        Self {
            score,
            clock,
            channels: ChannelBank::new(),
            phase: MelodyPhase::Start,
            chord_time: 0,
            chord_cursor: 0,
        }
    }

    /// Poll at wall time `now`. On a tick edge, runs that tick's triggers
    /// and returns true. Does nothing once stopped.
    pub fn poll<S: AudioSink + ?Sized>(&mut self, now: f64, sink: &mut S) -> bool {
        if self.is_stopped() || !self.clock.poll(now) {
            return false;
        }
        self.on_tick(sink);
        true
    }

    /// Advance one tick regardless of time and run its triggers. Returns
    /// false once stopped.
    pub fn step<S: AudioSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.clock.advance();
        self.on_tick(sink);
        true
    }

    fn on_tick<S: AudioSink + ?Sized>(&mut self, sink: &mut S) {
        let t = self.clock.tick();
        let sequenced = self.score.block_sequence().len() as i64;
        let stop_tick = (sequenced + 2) * MEASURE;
        let ending_tick = (sequenced + 1) * MEASURE;

        // No accompaniment on the stopping tick: every channel is cut here.
        if t >= stop_tick {
            debug!("tick {t}: playback stopped");
            self.phase = MelodyPhase::Stopped;
            self.channels.stop_all(sink);
            return;
        }

        let bpm = self.score.tempo();
        let bar_step = (t as usize) % TICKS_PER_BAR;
        let group = ((t >> 3) as usize) % CHORD_GROUPS;

        let beat = self.score.beat_pattern()[bar_step];
        if let Some(variant) = beat.checked_sub(1).and_then(NoiseVariant::from_index) {
            trace!("tick {t}: percussion {variant:?}");
            self.channels
                .stop_then_play(sink, Channel::Percussion, noise(variant, bpm));
        }

        let bass = self.score.bass_pattern()[bar_step];
        if bass > 0 {
            let note = self.score.bass_notes()[group * VOICES_PER_GROUP + bass as usize - 1];
            trace!("tick {t}: bass note {note}");
            self.channels
                .stop_then_play(sink, Channel::Bass, square(note, 1, bpm));
        }

        if t >= self.chord_time {
            self.fire_chord(t, group, sink);
        }

        if (MEASURE..ending_tick).contains(&t) {
            let position = ((t - MEASURE) >> 6) as usize;
            let index = self.score.block_sequence()[position];
            if self.phase != MelodyPhase::Block(index) {
                debug!("tick {t}: entering block {index}");
            }
            self.phase = MelodyPhase::Block(index);

            let block = &self.score.blocks()[index as usize];
            let step = (t as usize) % TICKS_PER_MEASURE;
            if block.is_onset(step) {
                let note = block.raw(step) & NOTE_MASK;
                let run = block.run_length(step);
                trace!("tick {t}: melody note {note} for {run} ticks");
                self.channels
                    .stop_then_play(sink, Channel::Melody, square(note, run, bpm));
            }
        } else if t == ending_tick {
            debug!("tick {t}: ending");
            self.phase = MelodyPhase::End;
            let note = self.score.last_block().raw(0) & NOTE_MASK;
            self.channels
                .stop_then_play(sink, Channel::Melody, square(note, ENDING_TICKS, bpm));
        }
    }

    fn fire_chord<S: AudioSink + ?Sized>(&mut self, t: i64, group: usize, sink: &mut S) {
        let pattern = self.score.chord_pattern();
        self.chord_cursor = if self.chord_time % TICKS_PER_BAR as i64 == 0 {
            0
        } else {
            self.chord_cursor + 1
        };
        // Runs sum to a whole bar, so the cursor wraps before overrunning.
        debug_assert!(self.chord_cursor < pattern.len());
        if self.chord_cursor >= pattern.len() {
            self.chord_cursor = 0;
        }

        let run = pattern[self.chord_cursor];
        self.chord_time += run as i64;

        let bpm = self.score.tempo();
        let chord = self.score.chord(group);
        trace!("tick {t}: chord {group} {chord:?} for {run} ticks");
        for (&note, channel) in chord.iter().zip(Channel::CHORD_VOICES) {
            self.channels
                .stop_then_play(sink, channel, square(note, run as usize, bpm));
        }
    }

    /// Silence every channel without advancing, e.g. when playback is
    /// interrupted. The phase is left as it was.
    pub fn stop_all<S: AudioSink + ?Sized>(&mut self, sink: &mut S) {
        debug!("tick {}: channels stopped", self.clock.tick());
        self.channels.stop_all(sink);
    }

    /// Current tick (-1 before the first edge).
    pub fn tick(&self) -> i64 {
        self.clock.tick()
    }

    /// Current melody phase.
    pub fn phase(&self) -> MelodyPhase {
        self.phase
    }

    /// Whether the terminal tick has been processed.
    pub fn is_stopped(&self) -> bool {
        self.phase == MelodyPhase::Stopped
    }

    /// The score being played.
    pub fn score(&self) -> &Arc<Score> {
        &self.score
    }

    /// The beat clock.
    pub fn clock(&self) -> &BeatClock {
        &self.clock
    }

    /// Channel assignment state.
    pub fn channels(&self) -> &ChannelBank {
        &self.channels
    }

    /// Tick at which the next chord fires.
    pub fn chord_time(&self) -> i64 {
        self.chord_time
    }

    /// Total playback length in seconds.
    pub fn total_duration(&self) -> f64 {
        self.score.total_duration()
    }

    /// Wall time of the next tick edge.
    pub fn next_boundary(&self) -> f64 {
        self.clock.next_boundary()
    }

    /// Snapshot of the display state at wall time `now`.
    pub fn snapshot(&self, now: f64) -> PlaybackSnapshot {
        let tick = self.clock.tick().max(0);
        let last_measure = self.score.measure_count() - 1;
        PlaybackSnapshot {
            tick: self.clock.tick(),
            phase: self.phase,
            step: tick as usize % TICKS_PER_MEASURE,
            measure: ((tick as usize) / TICKS_PER_MEASURE).min(last_measure),
            elapsed: self.clock.elapsed(now),
            total: self.total_duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replayer::channels::RecordingSink;
    use crate::score::ScoreBuilder;

    fn run_to_end(scheduler: &mut PlaybackScheduler, sink: &mut RecordingSink) -> i64 {
        let mut guard = 0;
        while !scheduler.is_stopped() {
            sink.set_tick(scheduler.tick() + 1);
            scheduler.step(sink);
            guard += 1;
            assert!(guard < 10_000, "scheduler never stopped");
        }
        scheduler.tick()
    }

    #[test]
    fn test_phases_follow_measures() {
        let score = Arc::new(ScoreBuilder::new().block_sequence(&[2, 1]).build().unwrap());
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        let mut phases = Vec::new();
        while !scheduler.is_stopped() {
            scheduler.step(&mut sink);
            phases.push((scheduler.tick(), scheduler.phase()));
        }
        assert_eq!(phases[0], (0, MelodyPhase::Start));
        assert_eq!(phases[63], (63, MelodyPhase::Start));
        assert_eq!(phases[64], (64, MelodyPhase::Block(2)));
        assert_eq!(phases[127], (127, MelodyPhase::Block(2)));
        assert_eq!(phases[128], (128, MelodyPhase::Block(1)));
        assert_eq!(phases[192], (192, MelodyPhase::End));
        assert_eq!(phases[255], (255, MelodyPhase::End));
        assert_eq!(phases.last(), Some(&(256, MelodyPhase::Stopped)));
    }

    #[test]
    fn test_melody_durations() {
        let score = Arc::new(
            ScoreBuilder::new()
                .step(0, 0, 60)
                .step(0, 8, 64)
                .build()
                .unwrap(),
        );
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        assert_eq!(run_to_end(&mut scheduler, &mut sink), 192);

        let melody: Vec<_> = sink.channel_events(Channel::Melody).collect();
        assert_eq!(melody.len(), 3);
        assert_eq!(melody[0].tick, 64);
        assert_eq!(*melody[0].buffer, square(60, 8, 120));
        assert_eq!(melody[1].tick, 72);
        assert_eq!(*melody[1].buffer, square(64, 56, 120));
        assert_eq!(melody[2].tick, 128);
        assert_eq!(*melody[2].buffer, square(60, 8, 120));
        assert_eq!(sink.stopped_at(), Some(192));
        assert!(scheduler.channels().is_idle());
    }

    #[test]
    fn test_accent_bit_stripped_from_melody() {
        let score = Arc::new(ScoreBuilder::new().step(0, 0, 0x80 | 67).build().unwrap());
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        run_to_end(&mut scheduler, &mut sink);
        let first = sink.channel_events(Channel::Melody).next().unwrap();
        assert_eq!(*first.buffer, square(67, 64, 120));
    }

    #[test]
    fn test_percussion_and_bass_every_bar() {
        let score = Arc::new(
            ScoreBuilder::new()
                .bass_notes([36, 40, 43, 38, 41, 45, 31, 35, 38, 33, 36, 40])
                .bass_pattern([1, 0, 0, 0, 3, 0, 2, 0])
                .beat_pattern([1, 0, 3, 0, 2, 0, 3, 0])
                .build()
                .unwrap(),
        );
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        run_to_end(&mut scheduler, &mut sink);

        // 192 ticks of accompaniment, four hits per bar each.
        assert_eq!(sink.channel_events(Channel::Percussion).count(), 24 * 4);
        assert_eq!(sink.channel_events(Channel::Bass).count(), 24 * 3);

        let bass: Vec<_> = sink.channel_events(Channel::Bass).take(6).collect();
        assert_eq!(bass[0].tick, 0);
        assert_eq!(*bass[0].buffer, square(36, 1, 120));
        assert_eq!(bass[1].tick, 4);
        assert_eq!(*bass[1].buffer, square(43, 1, 120));
        assert_eq!(bass[2].tick, 6);
        assert_eq!(*bass[2].buffer, square(40, 1, 120));
        // Second bar uses the second bass group.
        assert_eq!(bass[3].tick, 8);
        assert_eq!(*bass[3].buffer, square(38, 1, 120));

        let drums: Vec<_> = sink.channel_events(Channel::Percussion).take(3).collect();
        assert_eq!(*drums[0].buffer, noise(NoiseVariant::Low, 120));
        assert_eq!(*drums[1].buffer, noise(NoiseVariant::High, 120));
        assert_eq!(*drums[2].buffer, noise(NoiseVariant::Mid, 120));
    }

    #[test]
    fn test_chords_follow_pattern() {
        let score = Arc::new(
            ScoreBuilder::new()
                .chord_progression([60, 64, 67, 57, 60, 64, 53, 57, 60, 55, 59, 62])
                .chord_mask(0b0000_1010) // runs [4, 2, 2]
                .build()
                .unwrap(),
        );
        assert_eq!(score.chord_pattern(), &[4, 2, 2]);
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();

        for _ in 0..17 {
            sink.set_tick(scheduler.tick() + 1);
            scheduler.step(&mut sink);
        }

        let ticks: Vec<i64> = sink
            .channel_events(Channel::ChordLow)
            .map(|event| event.tick)
            .collect();
        assert_eq!(ticks, vec![0, 4, 6, 8, 12, 14, 16]);

        let low: Vec<_> = sink.channel_events(Channel::ChordLow).collect();
        assert_eq!(*low[0].buffer, square(60, 4, 120));
        assert_eq!(*low[1].buffer, square(60, 2, 120));
        assert_eq!(*low[3].buffer, square(57, 4, 120));
        let high: Vec<_> = sink.channel_events(Channel::ChordHigh).collect();
        assert_eq!(*high[3].buffer, square(64, 4, 120));
        assert_eq!(scheduler.chord_time(), 20);
    }

    #[test]
    fn test_chord_group_cycles_every_four_bars() {
        let score = Arc::new(
            ScoreBuilder::new()
                .chord_progression([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])
                .build()
                .unwrap(),
        );
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        run_to_end(&mut scheduler, &mut sink);

        let mid: Vec<_> = sink.channel_events(Channel::ChordMid).collect();
        assert_eq!(mid.len(), 24);
        for (bar, event) in mid.iter().enumerate() {
            assert_eq!(event.tick, bar as i64 * 8);
            let note = (bar % 4) as u8 * 3 + 2;
            assert_eq!(*event.buffer, square(note, 8, 120));
        }
    }

    #[test]
    fn test_poll_is_inert_after_stop() {
        let score = Arc::new(ScoreBuilder::new().build().unwrap());
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        run_to_end(&mut scheduler, &mut sink);
        let recorded = sink.events().len();
        assert!(!scheduler.poll(1_000.0, &mut sink));
        assert!(!scheduler.step(&mut sink));
        assert_eq!(sink.events().len(), recorded);
        assert_eq!(scheduler.tick(), 192);
    }

    #[test]
    fn test_stopping_tick_has_no_triggers() {
        let score = Arc::new(
            ScoreBuilder::new()
                .bass_pattern([1, 0, 0, 0, 0, 0, 0, 0])
                .beat_pattern([1, 0, 0, 0, 0, 0, 0, 0])
                .build()
                .unwrap(),
        );
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        let stop = run_to_end(&mut scheduler, &mut sink);
        assert_eq!(stop, 192);
        assert!(sink.events().iter().all(|event| event.tick < stop));
        assert_eq!(sink.channel_events(Channel::Percussion).last().map(|e| e.tick), Some(184));
    }

    #[test]
    fn test_stop_all_clears_channels() {
        let score = Arc::new(ScoreBuilder::new().step(0, 0, 60).build().unwrap());
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        for _ in 0..=70 {
            sink.set_tick(scheduler.tick() + 1);
            scheduler.step(&mut sink);
        }
        assert!(scheduler.channels().current(Channel::Melody).is_some());

        scheduler.stop_all(&mut sink);
        assert!(scheduler.channels().is_idle());
        assert_eq!(sink.stopped_at(), Some(70));
        assert_eq!(scheduler.phase(), MelodyPhase::Block(0));
        assert_eq!(scheduler.snapshot(20.0).tick, 70);
    }

    #[test]
    fn test_poll_follows_wall_time() {
        let score = Arc::new(ScoreBuilder::new().build().unwrap());
        let mut scheduler = PlaybackScheduler::new(score, 0.0);
        let mut sink = RecordingSink::new();
        assert!(!scheduler.poll(0.0, &mut sink));
        assert!(scheduler.poll(0.01, &mut sink));
        assert_eq!(scheduler.tick(), 0);
        assert!(!scheduler.poll(0.2, &mut sink));
        // Far behind: still only one tick per poll.
        assert!(scheduler.poll(30.0, &mut sink));
        assert_eq!(scheduler.tick(), 1);
    }

    #[test]
    fn test_snapshot() {
        let score = Arc::new(ScoreBuilder::new().block_sequence(&[0, 3]).build().unwrap());
        let mut scheduler = PlaybackScheduler::new(Arc::clone(&score), 2.0);
        let before = scheduler.snapshot(2.0);
        assert_eq!(before.tick, -1);
        assert_eq!(before.step, 0);
        assert_eq!(before.phase, MelodyPhase::Start);

        let mut sink = RecordingSink::new();
        for _ in 0..=70 {
            scheduler.step(&mut sink);
        }
        let snapshot = scheduler.snapshot(19.5);
        assert_eq!(snapshot.tick, 70);
        assert_eq!(snapshot.step, 6);
        assert_eq!(snapshot.measure, 1);
        assert_eq!(snapshot.phase, MelodyPhase::Block(0));
        assert!((snapshot.elapsed - 17.5).abs() < 1e-9);
        assert!((snapshot.total - 256.0 * 0.25).abs() < 1e-9);
    }
}
