//! Playback engine
//!
//! The beat clock, the six output channels, the per-tick scheduler and the
//! real-time driver that ties them to wall time.
//!
//! # Example
//!
//! ```no_run
//! use rmg_player::replayer::{PlaybackScheduler, RecordingSink};
//! use std::sync::Arc;
//!
//! let data = std::fs::read("song.rmg").unwrap();
//! let score = Arc::new(rmg_player::score::decode(&data).unwrap());
//! let mut scheduler = PlaybackScheduler::new(score, 0.0);
//! let mut sink = RecordingSink::new();
//! while scheduler.step(&mut sink) {}
//! ```

pub mod channels;
pub mod clock;
pub mod driver;
pub mod scheduler;

pub use channels::{
    AudioSink, Channel, ChannelBank, NullSink, RecordingSink, TriggerEvent, CHANNEL_COUNT,
};
pub use clock::{tick_duration, BeatClock, ManualClock, MonotonicClock, TimeSource};
pub use driver::{DriverExit, PlaybackDriver, DEFAULT_FRAME_INTERVAL};
pub use scheduler::{MelodyPhase, PlaybackScheduler, PlaybackSnapshot};
