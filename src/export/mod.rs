//! Offline export
//!
//! This module renders a score without wall time:
//! - WAV (16-bit stereo mixdown of all six channels)
//! - MIDI (one file per block, plus the chord loop)
//!
//! # Examples
//!
//! ## Export to WAV
//!
//! ```no_run
//! # #[cfg(feature = "export-wav")]
//! # {
//! use rmg_player::export::{export_to_wav_with_config, ExportConfig};
//! use std::sync::Arc;
//!
//! let score = Arc::new(rmg_player::load_score("song.rmg").unwrap());
//! let config = ExportConfig::default().normalize(true).fade_out(1.5);
//! export_to_wav_with_config(score, "song.wav", &config).unwrap();
//! # }
//! ```
//!
//! ## Export to MIDI
//!
//! ```no_run
//! # #[cfg(feature = "export-midi")]
//! # {
//! use rmg_player::export::export_midi;
//!
//! let score = rmg_player::load_score("song.rmg").unwrap();
//! let written = export_midi(&score, "midi_output", 960).unwrap();
//! # }
//! ```

#[cfg(feature = "export-midi")]
mod midi;
#[cfg(feature = "export-midi")]
pub use midi::*;

#[cfg(feature = "export-wav")]
mod wav;
#[cfg(feature = "export-wav")]
pub use wav::*;

use crate::config::PlayerConfig;
use crate::replayer::{Channel, CHANNEL_COUNT};

/// Export configuration options
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Effective gain per channel (master volume already applied)
    pub gains: [f32; CHANNEL_COUNT],
    /// Whether to normalize audio to prevent clipping
    pub normalize: bool,
    /// Fade out duration in seconds (0 = no fade)
    pub fade_out_duration: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::from_player_config(&PlayerConfig::default())
    }
}

impl ExportConfig {
    /// Take channel gains from a player configuration.
    pub fn from_player_config(config: &PlayerConfig) -> Self {
        let mut gains = [0.0; CHANNEL_COUNT];
        for channel in Channel::ALL {
            gains[channel.index()] = config.channel_gain(channel);
        }
        Self {
            gains,
            normalize: false,
            fade_out_duration: 0.0,
        }
    }

    /// Override one channel's gain. Zero mutes it.
    pub fn channel_gain(mut self, channel: Channel, gain: f32) -> Self {
        self.gains[channel.index()] = gain.max(0.0);
        self
    }

    /// Enable normalization to prevent clipping
    pub fn normalize(mut self, enable: bool) -> Self {
        self.normalize = enable;
        self
    }

    /// Add fade out at the end
    pub fn fade_out(mut self, duration_seconds: f32) -> Self {
        self.fade_out_duration = duration_seconds;
        self
    }
}

/// Scale down so the peak stays under 0.95
#[cfg_attr(not(feature = "export-wav"), allow(dead_code))]
fn normalize_samples(samples: &mut [f32]) {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > 0.95 {
        let scale = 0.95 / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Linear fade over the last `fade_duration` seconds
#[cfg_attr(not(feature = "export-wav"), allow(dead_code))]
fn apply_fade_out(samples: &mut [f32], fade_duration: f32, sample_rate: u32) {
    if fade_duration <= 0.0 || samples.is_empty() {
        return;
    }

    let fade_samples = ((fade_duration * sample_rate as f32) as usize).max(1);
    let start_fade = samples.len().saturating_sub(fade_samples);

    for (i, sample) in samples.iter_mut().enumerate().skip(start_fade) {
        let progress = (i - start_fade + 1) as f32 / fade_samples as f32;
        *sample *= (1.0 - progress).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_samples() {
        let mut samples = vec![0.5, 1.5, -1.9, 0.8];
        normalize_samples(&mut samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert!(peak <= 0.951);

        let mut quiet = vec![0.1, -0.2];
        normalize_samples(&mut quiet);
        assert_eq!(quiet, vec![0.1, -0.2]);
    }

    #[test]
    fn test_fade_out() {
        let mut samples = vec![1.0; 1000];
        apply_fade_out(&mut samples, 0.01, 44_100); // 441 samples
        assert_eq!(samples[0], 1.0);
        assert_eq!(samples[558], 1.0);
        assert!(samples[800] < 1.0);
        assert_eq!(samples[999], 0.0);
    }

    #[test]
    fn test_export_config_builder() {
        let config = ExportConfig::default()
            .normalize(true)
            .fade_out(2.0)
            .channel_gain(Channel::Percussion, 0.0);
        assert!(config.normalize);
        assert_eq!(config.fade_out_duration, 2.0);
        assert_eq!(config.gains[Channel::Percussion.index()], 0.0);
        assert!((config.gains[Channel::Melody.index()] - 0.06).abs() < 1e-6);
    }
}
