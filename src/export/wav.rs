//! WAV file export functionality

use super::{apply_fade_out, normalize_samples, ExportConfig};
use crate::constants::{FULL_SCALE, OUTPUT_CHANNELS, SAMPLE_RATE};
use crate::generators::samples_per_tick;
use crate::replayer::{Channel, PlaybackScheduler, RecordingSink, TriggerEvent, CHANNEL_COUNT};
use crate::score::Score;
use crate::{PlayerError, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Summary of a finished render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    /// Stereo frames written
    pub frames: usize,
    /// Triggers mixed
    pub triggers: usize,
    /// Tick at which playback stopped
    pub stop_tick: i64,
}

impl RenderSummary {
    /// Rendered length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / SAMPLE_RATE as f64
    }
}

/// Run the scheduler to completion, collecting every trigger.
pub fn collect_triggers(score: Arc<Score>) -> (Vec<TriggerEvent>, i64) {
    let mut scheduler = PlaybackScheduler::new(score, 0.0);
    let mut sink = RecordingSink::new();
    while !scheduler.is_stopped() {
        sink.set_tick(scheduler.tick() + 1);
        scheduler.step(&mut sink);
    }
    let stop_tick = scheduler.tick();
    (sink.into_events(), stop_tick)
}

/// Mix triggers into a mono signal of `total_frames` samples in [-1, 1].
///
/// A trigger at tick `t` starts at frame `floor(t * samples_per_tick)` and
/// plays until its buffer ends, the next trigger on the same channel, or
/// `total_frames`, whichever comes first.
pub fn mix_triggers(
    events: &[TriggerEvent],
    gains: &[f32; CHANNEL_COUNT],
    samples_per_tick: f64,
    total_frames: usize,
) -> Vec<f32> {
    let mut mix = vec![0.0f32; total_frames];
    let start_of = |event: &TriggerEvent| (event.tick.max(0) as f64 * samples_per_tick) as usize;

    for channel in Channel::ALL {
        let gain = gains[channel.index()];
        if gain == 0.0 {
            continue;
        }
        let lane: Vec<&TriggerEvent> = events.iter().filter(|e| e.channel == channel).collect();
        for (i, event) in lane.iter().enumerate() {
            let start = start_of(event).min(total_frames);
            let cutoff = lane
                .get(i + 1)
                .map_or(total_frames, |next| start_of(next).min(total_frames));
            let end = (start + event.buffer.frames()).min(cutoff);
            for (out, sample) in mix[start..end].iter_mut().zip(event.buffer.mono()) {
                *out += sample as f32 / FULL_SCALE as f32 * gain;
            }
        }
    }
    mix
}

/// Render a score to a mono mixdown, without post-processing.
pub fn render_score(score: Arc<Score>, config: &ExportConfig) -> (Vec<f32>, RenderSummary) {
    let spt = samples_per_tick(score.tempo());
    let (events, stop_tick) = collect_triggers(score);
    let total_frames = (stop_tick.max(0) as f64 * spt) as usize;
    let mix = mix_triggers(&events, &config.gains, spt, total_frames);
    let summary = RenderSummary {
        frames: total_frames,
        triggers: events.len(),
        stop_tick,
    };
    (mix, summary)
}

/// Export a score to WAV with the default configuration.
pub fn export_to_wav<P: AsRef<Path>>(score: Arc<Score>, output_path: P) -> Result<RenderSummary> {
    export_to_wav_with_config(score, output_path, &ExportConfig::default())
}

/// Export a score to WAV.
pub fn export_to_wav_with_config<P: AsRef<Path>>(
    score: Arc<Score>,
    output_path: P,
    config: &ExportConfig,
) -> Result<RenderSummary> {
    let (mut samples, summary) = render_score(score, config);
    info!(
        "rendered {} triggers into {} frames ({:.1}s)",
        summary.triggers,
        summary.frames,
        summary.duration_secs()
    );

    if config.normalize {
        info!("normalizing audio");
        normalize_samples(&mut samples);
    }

    if config.fade_out_duration > 0.0 {
        info!("applying {:.1}s fade out", config.fade_out_duration);
        apply_fade_out(&mut samples, config.fade_out_duration, SAMPLE_RATE);
    }

    info!("writing WAV file to {}", output_path.as_ref().display());
    write_wav_file(output_path.as_ref(), &samples)?;
    Ok(summary)
}

/// Write a mono signal as 16-bit stereo.
fn write_wav_file(path: &Path, mono: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: OUTPUT_CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| PlayerError::AudioFileError(format!("Failed to create WAV file: {e}")))?;

    for &sample in mono {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        for _ in 0..OUTPUT_CHANNELS {
            writer
                .write_sample(sample_i16)
                .map_err(|e| PlayerError::AudioFileError(format!("Failed to write sample: {e}")))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| PlayerError::AudioFileError(format!("Failed to finalize WAV file: {e}")))?;

    Ok(())
}
