//! Frame timing for animated scenes.
//!
//! `FrameClock::tick` yields one `FrameTime` per redraw: the clamped `dt` that advances dash
//! phases, and the time a `Timeline` should be sampled at (optionally looped).

use std::time::Instant;

/// Timing of one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped to `[0, max_dt]`.
    pub dt: f32,
    /// Seconds since the clock started (or was reset).
    pub elapsed: f32,
    /// Timeline sampling time: `elapsed`, wrapped by the loop period when one is set.
    pub timeline: f32,
    /// Frames ticked so far, starting at 0.
    pub frame: u64,
}

#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    max_dt: f32,
    loop_period: Option<f32>,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            max_dt: 0.1,
            loop_period: None,
            frames: 0,
        }
    }

    /// Largest `dt` a tick reports; long stalls (breakpoints, minimized windows) would otherwise
    /// jump dash phases.
    #[inline]
    pub fn with_max_dt(mut self, max_dt: f32) -> Self {
        self.max_dt = max_dt.max(0.0);
        self
    }

    /// Wrap timeline time every `period` seconds. Non-positive periods disable looping.
    #[inline]
    pub fn looping(mut self, period: f32) -> Self {
        self.loop_period = (period > 0.0 && period.is_finite()).then_some(period);
        self
    }

    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = (now - self.last).as_secs_f32().clamp(0.0, self.max_dt);
        self.last = now;

        let elapsed = (now - self.start).as_secs_f32();
        let time = FrameTime {
            dt,
            elapsed,
            timeline: wrap_time(elapsed, self.loop_period),
            frame: self.frames,
        };
        self.frames += 1;
        time
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Restart elapsed time and the frame counter.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last = now;
        self.frames = 0;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn wrap_time(elapsed: f32, period: Option<f32>) -> f32 {
    match period {
        Some(p) => elapsed.rem_euclid(p),
        None => elapsed,
    }
}
