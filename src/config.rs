//! Player configuration
//!
//! Channel levels, render cadence and MIDI resolution, loadable from JSON.

use crate::constants::{DEFAULT_CHANNEL_VOLUMES, DEFAULT_MASTER_VOLUME, MAX_MIDI_TICKS_PER_BEAT};
use crate::replayer::{Channel, CHANNEL_COUNT};
use crate::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Gain applied to every channel (0.0-1.0)
    pub master_volume: f32,
    /// Per-channel gain, indexed like [`Channel`]
    pub channel_volumes: [f32; CHANNEL_COUNT],
    /// Milliseconds between status line refreshes
    pub frame_interval_ms: u64,
    /// MIDI export resolution
    pub midi_ticks_per_beat: u16,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            master_volume: DEFAULT_MASTER_VOLUME,
            channel_volumes: DEFAULT_CHANNEL_VOLUMES,
            frame_interval_ms: 33,
            midi_ticks_per_beat: 960,
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a JSON document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PlayerError::ConfigError(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json).map_err(|e| match e {
            PlayerError::ConfigError(msg) => {
                PlayerError::ConfigError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        let in_unit_range = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit_range(self.master_volume) {
            return Err(PlayerError::ConfigError(format!(
                "master_volume {} outside 0.0-1.0",
                self.master_volume
            )));
        }
        if let Some(channel) = Channel::ALL
            .iter()
            .find(|c| !in_unit_range(self.channel_volumes[c.index()]))
        {
            return Err(PlayerError::ConfigError(format!(
                "{channel} volume {} outside 0.0-1.0",
                self.channel_volumes[channel.index()]
            )));
        }
        if self.frame_interval_ms == 0 {
            return Err(PlayerError::ConfigError(
                "frame_interval_ms must be positive".into(),
            ));
        }
        if !(1..=MAX_MIDI_TICKS_PER_BEAT).contains(&self.midi_ticks_per_beat) {
            return Err(PlayerError::ConfigError(format!(
                "midi_ticks_per_beat {} outside 1-{MAX_MIDI_TICKS_PER_BEAT}",
                self.midi_ticks_per_beat
            )));
        }
        Ok(())
    }

    /// Effective gain of one channel.
    pub fn channel_gain(&self, channel: Channel) -> f32 {
        self.master_volume * self.channel_volumes[channel.index()]
    }

    /// Frame interval in seconds.
    pub fn frame_interval(&self) -> f64 {
        self.frame_interval_ms as f64 / 1000.0
    }
}
