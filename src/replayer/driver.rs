//! Real-time playback driver
//!
//! Runs a [`PlaybackScheduler`] against a [`TimeSource`], sleeping until the
//! next tick edge or render frame rather than spinning.

use super::channels::AudioSink;
use super::clock::TimeSource;
use super::scheduler::{PlaybackScheduler, PlaybackSnapshot};
use crate::score::Score;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default interval between observer updates (30 frames per second).
pub const DEFAULT_FRAME_INTERVAL: f64 = 1.0 / 30.0;

/// Margin past a tick edge to wake at; the clock fires strictly after it.
const EDGE_MARGIN: f64 = 1e-6;

/// Why [`PlaybackDriver::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// The score played to its end.
    Finished,
    /// The stop flag was raised.
    Interrupted,
}

/// Drives a scheduler in real time.
pub struct PlaybackDriver<S: AudioSink, T: TimeSource> {
    scheduler: PlaybackScheduler,
    sink: S,
    time: T,
    frame_interval: f64,
    stop: Arc<AtomicBool>,
}

impl<S: AudioSink, T: TimeSource> PlaybackDriver<S, T> {
    /// Create a driver whose clock starts at the time source's current time.
    pub fn new(score: Arc<Score>, sink: S, time: T) -> Self {
        let scheduler = PlaybackScheduler::new(score, time.now());
        Self {
            scheduler,
            sink,
            time,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the observer update interval in seconds.
    pub fn with_frame_interval(mut self, seconds: f64) -> Self {
        if seconds > 0.0 {
            self.frame_interval = seconds;
        }
        self
    }

    /// Use an externally owned stop flag (e.g. one set from a Ctrl-C handler).
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Flag that makes [`run`](Self::run) return at its next wake-up.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// The scheduler being driven.
    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    /// The audio sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the driver, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Play until the score ends or the stop flag is raised. `observer`
    /// receives a snapshot once per frame and once more on exit.
    pub fn run<F: FnMut(&PlaybackSnapshot)>(&mut self, mut observer: F) -> DriverExit {
        info!(
            "playback started: {} blocks at {} bpm, {:.1}s",
            self.scheduler.score().block_sequence().len(),
            self.scheduler.score().tempo(),
            self.scheduler.total_duration()
        );

        let mut next_frame = self.time.now();
        loop {
            let now = self.time.now();
            if self.stop.load(Ordering::Relaxed) {
                self.scheduler.stop_all(&mut self.sink);
                observer(&self.scheduler.snapshot(now));
                info!("playback interrupted at tick {}", self.scheduler.tick());
                return DriverExit::Interrupted;
            }

            self.scheduler.poll(now, &mut self.sink);
            if self.scheduler.is_stopped() {
                observer(&self.scheduler.snapshot(now));
                info!("playback finished at tick {}", self.scheduler.tick());
                return DriverExit::Finished;
            }

            if now >= next_frame {
                observer(&self.scheduler.snapshot(now));
                next_frame = now + self.frame_interval;
            }

            let deadline = (self.scheduler.next_boundary() + EDGE_MARGIN).min(next_frame);
            self.time.sleep_until(deadline);
        }
    }
}
