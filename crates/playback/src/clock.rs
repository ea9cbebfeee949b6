//! Timeline clock: position, duration, transport, speed, and loop.
//!
//! [`TimelineClock`] is the small state machine behind both the shared
//! authoritative clock and every per-cell mesh clock. It owns the per-tick
//! arithmetic and the boundary policy but never emits events. The engine
//! turns the returned outcomes into events.

use pc_common::TimeCode;

/// What happened at a timeline boundary during [`TimelineClock::advance`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Stayed within `[0, duration]`.
    Inside,
    /// Crossed a boundary while looping and wrapped around.
    Wrapped,
    /// Crossed a boundary without looping; clamped and paused.
    Stopped,
}

/// Result of a successful [`TimelineClock::set_speed`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpeedChange {
    pub speed: f64,
    /// The sign flipped (forward <-> reverse).
    pub direction_changed: bool,
}

/// Position/speed/loop state for one timeline.
///
/// Invariants held after every public call:
/// - `0 <= time <= duration`
/// - `speed` is finite and non-zero
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineClock {
    time: TimeCode,
    duration: TimeCode,
    playing: bool,
    speed: f64,
    looping: bool,
}

impl Default for TimelineClock {
    fn default() -> Self {
        Self::new(1.0, false)
    }
}

impl TimelineClock {
    /// Paused clock at 0 with zero duration. A zero or non-finite `speed`
    /// falls back to 1.0.
    pub fn new(speed: f64, looping: bool) -> Self {
        Self {
            time: TimeCode::ZERO,
            duration: TimeCode::ZERO,
            playing: false,
            speed: if is_valid_speed(speed) { speed } else { 1.0 },
            looping,
        }
    }

    pub fn time(&self) -> TimeCode {
        self.time
    }

    pub fn duration(&self) -> TimeCode {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_reversing(&self) -> bool {
        self.speed < 0.0
    }

    /// Returns `true` if the clock was not already playing.
    pub fn play(&mut self) -> bool {
        !std::mem::replace(&mut self.playing, true)
    }

    /// Returns `true` if the clock was playing.
    pub fn pause(&mut self) -> bool {
        std::mem::replace(&mut self.playing, false)
    }

    /// Set signed speed. Zero and non-finite values are refused (`None`).
    pub fn set_speed(&mut self, speed: f64) -> Option<SpeedChange> {
        if !is_valid_speed(speed) {
            return None;
        }
        let direction_changed = (speed < 0.0) != (self.speed < 0.0);
        self.speed = speed;
        Some(SpeedChange {
            speed,
            direction_changed,
        })
    }

    /// Negate the speed, keeping its magnitude.
    pub fn toggle_reverse(&mut self) -> SpeedChange {
        self.speed = -self.speed;
        SpeedChange {
            speed: self.speed,
            direction_changed: true,
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Seek, clamped to `[0, duration]`. Non-finite input is refused (`None`).
    pub fn seek(&mut self, time: TimeCode) -> Option<TimeCode> {
        if !time.is_finite() {
            return None;
        }
        self.time = time.clamp(TimeCode::ZERO, self.duration);
        Some(self.time)
    }

    /// Replace the duration, pulling the position back inside if needed.
    pub fn set_duration(&mut self, duration: TimeCode) {
        let duration = if duration.is_finite() {
            TimeCode(duration.0.max(0.0))
        } else {
            TimeCode::ZERO
        };
        self.duration = duration;
        if self.time > duration {
            self.time = duration;
        }
    }

    /// Advance by `delta_ms` of wall time scaled by the signed speed.
    ///
    /// Paused clocks and non-positive deltas do nothing.
    pub fn advance(&mut self, delta_ms: f64) -> Boundary {
        if !self.playing || !(delta_ms > 0.0) {
            return Boundary::Inside;
        }
        let next = self.time.0 + delta_ms * self.speed;
        let duration = self.duration.0;

        if next > duration {
            if self.looping && duration > 0.0 {
                self.time = TimeCode(next % duration);
                Boundary::Wrapped
            } else if self.looping {
                self.time = TimeCode::ZERO;
                Boundary::Inside
            } else {
                self.time = self.duration;
                self.playing = false;
                Boundary::Stopped
            }
        } else if next < 0.0 {
            if self.looping && duration > 0.0 {
                self.time = TimeCode(duration + next % duration);
                Boundary::Wrapped
            } else if self.looping {
                self.time = TimeCode::ZERO;
                Boundary::Inside
            } else {
                self.time = TimeCode::ZERO;
                self.playing = false;
                Boundary::Stopped
            }
        } else {
            self.time = TimeCode(next);
            Boundary::Inside
        }
    }

    /// A non-looping clock parked on the boundary it is heading toward jumps
    /// to the opposite end, so `play()` after finishing replays. Returns
    /// `true` if the position moved.
    pub fn rewind_if_finished(&mut self) -> bool {
        if self.looping || self.duration.0 <= 0.0 {
            return false;
        }
        if self.speed > 0.0 && self.time >= self.duration {
            self.time = TimeCode::ZERO;
            true
        } else if self.speed < 0.0 && self.time <= TimeCode::ZERO {
            self.time = self.duration;
            true
        } else {
            false
        }
    }

    /// Step by whole frames: pause first, then move `frames * interval_ms`,
    /// clamped (never wraps). Returns `true` if the step paused a playing clock.
    pub fn step_frames(&mut self, frames: i32, interval_ms: f64) -> bool {
        let was_playing = self.pause();
        let target = TimeCode(self.time.0 + frames as f64 * interval_ms);
        self.time = target.clamp(TimeCode::ZERO, self.duration);
        was_playing
    }
}

fn is_valid_speed(speed: f64) -> bool {
    speed.is_finite() && speed != 0.0
}
