//! Chiptune score player
//!
//! Decodes a compact binary score (tempo, a four-chord loop, bass and
//! percussion patterns, and a sequence of 64-step melodic blocks) and plays
//! it on a fixed-tempo beat grid through six single-slot channels of
//! square-wave and noise buffers.
//!
//! # Features
//! - Strict score decoding with offset-tagged errors
//! - Exact-length square and hashed-noise buffer synthesis
//! - Beat clock that advances at most one tick per poll
//! - Per-tick scheduler for melody, chords, bass and percussion
//! - Real-time driver, offline WAV rendering and MIDI export
//!
//! # Crate feature flags
//! - `export-wav` (default): offline mixdown to WAV (`export`, enables `hound`)
//! - `export-midi` (default): block and chord export to MIDI (`export`, enables `midly`)
//! - `streaming` (opt-in): real-time audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ## Step through a score
//! ```no_run
//! use rmg_player::replayer::{PlaybackScheduler, RecordingSink};
//! use std::sync::Arc;
//! let data = std::fs::read("song.rmg").unwrap();
//! let score = Arc::new(rmg_player::score::decode(&data).unwrap());
//! let mut scheduler = PlaybackScheduler::new(score, 0.0);
//! let mut sink = RecordingSink::new();
//! while scheduler.step(&mut sink) {}
//! println!("{} triggers", sink.events().len());
//! ```
//!
//! ## Real-time playback
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use rmg_player::replayer::{MonotonicClock, PlaybackDriver};
//! use rmg_player::{AudioDevice, PlayerConfig};
//! use std::sync::Arc;
//! let data = std::fs::read("song.rmg").unwrap();
//! let score = Arc::new(rmg_player::score::decode(&data).unwrap());
//! let device = AudioDevice::new(&PlayerConfig::default()).unwrap();
//! let mut driver = PlaybackDriver::new(score, device, MonotonicClock::new());
//! driver.run(|_| {});
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod constants;
#[cfg(any(feature = "export-wav", feature = "export-midi"))]
pub mod export; // Offline Rendering & MIDI
pub mod generators; // Square & Noise Buffers
pub mod replayer; // Playback Engine
pub mod score; // Score Format
#[cfg(feature = "streaming")]
pub mod streaming; // Audio Output
pub mod visualization; // Terminal UI Helpers

use score::DecodeError;

/// Error types for player operations
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    /// Score could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error writing audio or MIDI file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for PlayerError {
    /// Converts a String into `PlayerError::Other`.
    ///
    /// Prefer a specific variant (`ConfigError`, `AudioFileError`,
    /// `AudioDeviceError`) where one applies; this conversion loses the
    /// error's kind.
    fn from(msg: String) -> Self {
        PlayerError::Other(msg)
    }
}

impl From<&str> for PlayerError {
    /// Converts a string slice into `PlayerError::Other`.
    fn from(msg: &str) -> Self {
        PlayerError::Other(msg.to_string())
    }
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Read and decode a score file.
pub fn load_score<P: AsRef<std::path::Path>>(path: P) -> Result<score::Score> {
    let data = std::fs::read(path)?;
    Ok(score::decode(&data)?)
}

// Public API exports
pub use config::PlayerConfig;
pub use generators::{noise, square, NoiseVariant, PcmBuffer};
pub use replayer::{
    AudioSink, BeatClock, Channel, MelodyPhase, PlaybackDriver, PlaybackScheduler,
    PlaybackSnapshot,
};
pub use score::{decode, Score, ScoreBuilder};
#[cfg(feature = "streaming")]
pub use streaming::AudioDevice;
pub use visualization::{create_block_strip, format_status_line, format_time};
