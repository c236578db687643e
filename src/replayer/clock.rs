//! Beat clock
//!
//! Converts wall time into a tick counter. One tick is `30 / bpm` seconds;
//! the counter starts at -1 and advances by at most one per poll.

use crate::constants::TICK_SECONDS_PER_BPM;
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Duration of one tick in seconds.
#[inline]
pub fn tick_duration(bpm: u8) -> f64 {
    TICK_SECONDS_PER_BPM / bpm.max(1) as f64
}

/// Source of monotonic time in seconds, plus a way to wait for it.
pub trait TimeSource {
    /// Seconds since an arbitrary fixed origin.
    fn now(&self) -> f64;

    /// Block until `now()` reaches `deadline`. Returns immediately if it
    /// already has.
    fn sleep_until(&self, deadline: f64);
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn sleep_until(&self, deadline: f64) {
        let remaining = deadline - self.now();
        if remaining > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(remaining));
        }
    }
}

/// Time source that only moves when told to. Sleeping jumps straight to the
/// deadline, so a full playback runs instantly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn new(start: f64) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Move time forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds.max(0.0));
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn sleep_until(&self, deadline: f64) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn sleep_until(&self, deadline: f64) {
        (**self).sleep_until(deadline);
    }
}

/// Beat clock
///
/// Polled with the current time; reports each tick edge once. Several
/// missed edges are never caught up in one call, so a caller polling slower
/// than the tick rate falls behind wall time.
#[derive(Debug, Clone)]
pub struct BeatClock {
    /// Tick length in seconds
    tick_duration: f64,
    /// Time playback started
    start: f64,
    /// Last tick reported (-1 before the first edge)
    tick: i64,
}

impl BeatClock {
    /// Create a clock for `bpm` starting at `start` seconds.
    pub fn new(bpm: u8, start: f64) -> Self {
        Self {
            tick_duration: tick_duration(bpm),
            start,
            tick: -1,
        }
    }

    /// Poll at `now`. Returns true and advances the tick by exactly one when
    /// `now - start - tick * tick_duration > tick_duration`.
    pub fn poll(&mut self, now: f64) -> bool {
        let since_tick = now - self.start - self.tick as f64 * self.tick_duration;
        if since_tick > self.tick_duration {
            self.tick += 1;
            true
        } else {
            false
        }
    }

    /// Advance by one tick without consulting time. Used when rendering
    /// offline, where ticks are laid out on the sample grid instead.
    pub fn advance(&mut self) -> i64 {
        self.tick += 1;
        self.tick
    }

    /// Current tick (-1 before the first edge).
    pub fn tick(&self) -> i64 {
        self.tick
    }

    /// Tick length in seconds.
    pub fn tick_duration(&self) -> f64 {
        self.tick_duration
    }

    /// Time playback started.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Wall time after which the next poll succeeds.
    pub fn next_boundary(&self) -> f64 {
        self.start + (self.tick + 1) as f64 * self.tick_duration
    }

    /// Seconds elapsed since start at `now`.
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.start).max(0.0)
    }

    /// Ticks by which the counter trails wall time at `now`.
    pub fn lag(&self, now: f64) -> i64 {
        let wall_tick = ((now - self.start) / self.tick_duration).ceil() as i64 - 1;
        (wall_tick - self.tick).max(0)
    }

    /// Restart from tick -1 at `start`.
    pub fn reset(&mut self, start: f64) {
        self.start = start;
        self.tick = -1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tick_duration() {
        assert_relative_eq!(tick_duration(120), 0.25);
        assert_relative_eq!(tick_duration(1), 30.0);
        assert_relative_eq!(tick_duration(255), 30.0 / 255.0);
    }

    #[test]
    fn test_first_poll_after_start() {
        let mut clock = BeatClock::new(120, 10.0);
        assert_eq!(clock.tick(), -1);
        assert!(!clock.poll(10.0));
        assert!(clock.poll(10.001));
        assert_eq!(clock.tick(), 0);
        assert!(!clock.poll(10.25));
        assert!(clock.poll(10.2501));
        assert_eq!(clock.tick(), 1);
    }

    #[test]
    fn test_no_catch_up_when_under_polled() {
        let mut clock = BeatClock::new(120, 0.0);
        // Ten ticks' worth of time passes between polls.
        assert!(clock.poll(2.5));
        assert_eq!(clock.tick(), 0);
        assert!(clock.poll(2.5));
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.lag(2.5), 8);
    }

    #[test]
    fn test_poll_advances_at_most_one_for_any_cadence() {
        for &step in &[0.001, 0.1, 0.249, 0.25, 0.26, 1.0, 7.3] {
            let mut clock = BeatClock::new(120, 0.0);
            let mut now = 0.0;
            let mut previous = clock.tick();
            for _ in 0..500 {
                now += step;
                clock.poll(now);
                let delta = clock.tick() - previous;
                assert!((0..=1).contains(&delta), "cadence {step} jumped {delta}");
                previous = clock.tick();
            }
        }
    }

    #[test]
    fn test_next_boundary() {
        let mut clock = BeatClock::new(120, 1.0);
        assert_relative_eq!(clock.next_boundary(), 1.0);
        clock.poll(1.1);
        assert_relative_eq!(clock.next_boundary(), 1.25);
        assert!(!clock.poll(clock.next_boundary()));
        assert!(clock.poll(clock.next_boundary() + 1e-9));
    }

    #[test]
    fn test_manual_clock_never_goes_back() {
        let time = ManualClock::new(3.0);
        time.sleep_until(2.0);
        assert_relative_eq!(time.now(), 3.0);
        time.sleep_until(4.5);
        assert_relative_eq!(time.now(), 4.5);
        time.advance(0.5);
        assert_relative_eq!(time.now(), 5.0);
    }

    #[test]
    fn test_reset() {
        let mut clock = BeatClock::new(60, 0.0);
        clock.poll(3.0);
        clock.reset(5.0);
        assert_eq!(clock.tick(), -1);
        assert_relative_eq!(clock.elapsed(6.0), 1.0);
    }
}
