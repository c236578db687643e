//! Audio device integration using rodio
//!
//! One rodio [`Sink`] per channel. A trigger replaces the channel's sink;
//! dropping the old one stops whatever it was playing.

use crate::config::PlayerConfig;
use crate::constants::{OUTPUT_CHANNELS, SAMPLE_RATE};
use crate::generators::PcmBuffer;
use crate::replayer::{AudioSink, Channel, CHANNEL_COUNT};
use crate::{PlayerError, Result};
use log::warn;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::Arc;

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sinks: [Option<Sink>; CHANNEL_COUNT],
    gains: [f32; CHANNEL_COUNT],
}

impl AudioDevice {
    /// Open the default output device with the configured channel levels.
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let (stream, handle) = OutputStream::try_default().map_err(|e| {
            PlayerError::AudioDeviceError(format!("Failed to create audio stream: {e}"))
        })?;

        // Fail now rather than on the first trigger.
        Sink::try_new(&handle).map_err(|e| {
            PlayerError::AudioDeviceError(format!("Failed to create audio sink: {e}"))
        })?;

        let mut gains = [0.0; CHANNEL_COUNT];
        for channel in Channel::ALL {
            gains[channel.index()] = config.channel_gain(channel);
        }

        Ok(AudioDevice {
            _stream: stream,
            handle,
            sinks: Default::default(),
            gains,
        })
    }

    /// Gain applied to `channel`.
    pub fn gain(&self, channel: Channel) -> f32 {
        self.gains[channel.index()]
    }

    /// Whether `channel` still has audio queued.
    pub fn is_playing(&self, channel: Channel) -> bool {
        self.sinks[channel.index()]
            .as_ref()
            .is_some_and(|sink| !sink.empty())
    }
}

impl AudioSink for AudioDevice {
    fn stop_then_play(&mut self, channel: Channel, buffer: Arc<PcmBuffer>) {
        let slot = &mut self.sinks[channel.index()];
        if let Some(previous) = slot.take() {
            previous.stop();
        }

        let sink = match Sink::try_new(&self.handle) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("{channel}: failed to create audio sink: {e}");
                return;
            }
        };
        sink.set_volume(self.gains[channel.index()]);
        sink.append(SamplesBuffer::new(
            OUTPUT_CHANNELS,
            SAMPLE_RATE,
            buffer.samples().to_vec(),
        ));
        *slot = Some(sink);
    }

    fn stop_all(&mut self) {
        for sink in self.sinks.iter_mut().filter_map(Option::take) {
            sink.stop();
        }
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.stop_all();
    }
}
