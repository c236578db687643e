//! Real-time audio output
//!
//! Plays channel triggers on the system audio device through rodio.

mod audio_device;

pub use audio_device::AudioDevice;
