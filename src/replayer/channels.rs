//! Output channels
//!
//! Six single-slot lanes. Starting a buffer on a lane stops whatever that
//! lane was playing; nothing is queued, mixed within a lane, or faded.

use crate::generators::PcmBuffer;
use std::fmt;
use std::sync::Arc;

/// Number of output channels.
pub const CHANNEL_COUNT: usize = 6;

/// An output lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Melody from the sequenced blocks.
    Melody = 0,
    /// Lowest chord voice.
    ChordLow = 1,
    /// Middle chord voice.
    ChordMid = 2,
    /// Highest chord voice.
    ChordHigh = 3,
    /// Noise percussion.
    Percussion = 4,
    /// Bass line.
    Bass = 5,
}

impl Channel {
    /// All channels in index order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Melody,
        Channel::ChordLow,
        Channel::ChordMid,
        Channel::ChordHigh,
        Channel::Percussion,
        Channel::Bass,
    ];

    /// The three chord voice channels, in voice order.
    pub const CHORD_VOICES: [Channel; 3] = [Channel::ChordLow, Channel::ChordMid, Channel::ChordHigh];

    /// Channel index (0-5).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Channel for an index, if in range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short label for display.
    pub fn label(self) -> &'static str {
        match self {
            Channel::Melody => "melody",
            Channel::ChordLow => "chord 1",
            Channel::ChordMid => "chord 2",
            Channel::ChordHigh => "chord 3",
            Channel::Percussion => "drums",
            Channel::Bass => "bass",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Consumer of channel triggers.
///
/// Implementations must treat `stop_then_play` as replace-on-trigger: the
/// channel's previous buffer stops immediately and the new one starts.
/// Emission is fire-and-forget; no completion is reported back.
pub trait AudioSink {
    /// Stop `channel` and start `buffer` on it.
    fn stop_then_play(&mut self, channel: Channel, buffer: Arc<PcmBuffer>);

    /// Stop every channel.
    fn stop_all(&mut self);
}

impl<S: AudioSink + ?Sized> AudioSink for &mut S {
    fn stop_then_play(&mut self, channel: Channel, buffer: Arc<PcmBuffer>) {
        (**self).stop_then_play(channel, buffer);
    }

    fn stop_all(&mut self) {
        (**self).stop_all();
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn stop_then_play(&mut self, channel: Channel, buffer: Arc<PcmBuffer>) {
        (**self).stop_then_play(channel, buffer);
    }

    fn stop_all(&mut self) {
        (**self).stop_all();
    }
}

/// Sink that discards everything. Useful for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn stop_then_play(&mut self, _channel: Channel, _buffer: Arc<PcmBuffer>) {}

    fn stop_all(&mut self) {}
}

/// One recorded trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Tick the trigger happened on.
    pub tick: i64,
    /// Target channel.
    pub channel: Channel,
    /// Buffer started.
    pub buffer: Arc<PcmBuffer>,
}

/// Sink that records every trigger, tagged with the tick set via
/// [`RecordingSink::set_tick`]. Used by offline rendering and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    tick: i64,
    events: Vec<TriggerEvent>,
    stopped_at: Option<i64>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick attached to subsequent events.
    pub fn set_tick(&mut self, tick: i64) {
        self.tick = tick;
    }

    /// All recorded triggers in order.
    pub fn events(&self) -> &[TriggerEvent] {
        &self.events
    }

    /// Triggers on one channel.
    pub fn channel_events(&self, channel: Channel) -> impl Iterator<Item = &TriggerEvent> {
        self.events.iter().filter(move |event| event.channel == channel)
    }

    /// Tick of the last `stop_all`, if any.
    pub fn stopped_at(&self) -> Option<i64> {
        self.stopped_at
    }

    /// Take the recorded events.
    pub fn into_events(self) -> Vec<TriggerEvent> {
        self.events
    }
}

impl AudioSink for RecordingSink {
    fn stop_then_play(&mut self, channel: Channel, buffer: Arc<PcmBuffer>) {
        self.events.push(TriggerEvent {
            tick: self.tick,
            channel,
            buffer,
        });
    }

    fn stop_all(&mut self) {
        self.stopped_at = Some(self.tick);
    }
}

/// Last buffer assigned to each channel.
///
/// This is assignment state, not playback state: a slot keeps its buffer
/// after the audio itself has finished.
#[derive(Debug, Clone, Default)]
pub struct ChannelBank {
    slots: [Option<Arc<PcmBuffer>>; CHANNEL_COUNT],
    trigger_counts: [u64; CHANNEL_COUNT],
}

impl ChannelBank {
    /// Create a bank with every slot empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `buffer` to `channel` and forward the trigger to `sink`.
    pub fn stop_then_play<S: AudioSink + ?Sized>(
        &mut self,
        sink: &mut S,
        channel: Channel,
        buffer: PcmBuffer,
    ) {
        let buffer = Arc::new(buffer);
        self.slots[channel.index()] = Some(Arc::clone(&buffer));
        self.trigger_counts[channel.index()] += 1;
        sink.stop_then_play(channel, buffer);
    }

    /// Clear every slot and stop every channel on `sink`.
    pub fn stop_all<S: AudioSink + ?Sized>(&mut self, sink: &mut S) {
        self.slots = Default::default();
        sink.stop_all();
    }

    /// Buffer last assigned to `channel`.
    pub fn current(&self, channel: Channel) -> Option<&Arc<PcmBuffer>> {
        self.slots[channel.index()].as_ref()
    }

    /// Number of triggers sent to `channel` so far.
    pub fn trigger_count(&self, channel: Channel) -> u64 {
        self.trigger_counts[channel.index()]
    }

    /// Whether no channel holds a buffer.
    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
