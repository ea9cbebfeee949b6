//! Mesh timing: an engine-managed clock for 3D animation cells.
//!
//! A mesh has no native media position, so each mesh cell carries its own
//! [`TimelineClock`] measured against the mesh timeline's duration. It shares
//! the boundary policy with the shared clock but none of its state.

use pc_common::{FrameNumber, Rational, TimeCode};
use serde::{Deserialize, Serialize};

use crate::clock::{Boundary, SpeedChange, TimelineClock};

/// Length of a mesh animation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshTiming {
    pub frame_count: u32,
    pub fps: Rational,
    /// Overrides `frame_count * interval` when the renderer knows better.
    pub explicit_duration_ms: Option<f64>,
}

impl MeshTiming {
    pub fn from_frames(frame_count: u32, fps: Rational) -> Self {
        Self {
            frame_count,
            fps,
            explicit_duration_ms: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.explicit_duration_ms = Some(duration_ms);
        self
    }

    pub fn frame_interval_ms(&self) -> f64 {
        self.fps.frame_interval_ms()
    }

    pub fn duration(&self) -> TimeCode {
        match self.explicit_duration_ms {
            Some(ms) if ms.is_finite() && ms >= 0.0 => TimeCode::from_millis(ms),
            _ => TimeCode::from_millis(self.frame_count as f64 * self.frame_interval_ms()),
        }
    }
}

/// Resolves a mesh time to the animation frame to draw.
///
/// Implemented by mesh renderers; the engine only supplies the time.
pub trait MeshFrameProvider {
    fn frame_at(&self, mesh_time: TimeCode, frame_interval_ms: f64) -> FrameNumber;
}

/// Default provider: `floor(time / interval)`, clamped to the last frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameIndexProvider {
    pub frame_count: u32,
}

impl MeshFrameProvider for FrameIndexProvider {
    fn frame_at(&self, mesh_time: TimeCode, frame_interval_ms: f64) -> FrameNumber {
        if self.frame_count == 0 || !(frame_interval_ms > 0.0) {
            return FrameNumber::ZERO;
        }
        let raw = (mesh_time.as_millis().max(0.0) / frame_interval_ms + 1e-9).floor() as u64;
        FrameNumber(raw.min(self.frame_count as u64 - 1))
    }
}

/// Mesh side of a cell record.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshClock {
    clock: TimelineClock,
    timing: MeshTiming,
}

impl MeshClock {
    pub fn new(timing: MeshTiming, looping: bool) -> Self {
        let mut clock = TimelineClock::new(1.0, looping);
        clock.set_duration(timing.duration());
        Self { clock, timing }
    }

    pub fn timing(&self) -> &MeshTiming {
        &self.timing
    }

    /// Replace the timing (e.g. a re-processed animation); keeps the
    /// position when it still fits.
    pub fn set_timing(&mut self, timing: MeshTiming) {
        self.timing = timing;
        self.clock.set_duration(timing.duration());
    }

    pub fn time(&self) -> TimeCode {
        self.clock.time()
    }

    pub fn duration(&self) -> TimeCode {
        self.clock.duration()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn speed(&self) -> f64 {
        self.clock.speed()
    }

    pub fn is_looping(&self) -> bool {
        self.clock.is_looping()
    }

    pub fn play(&mut self) -> bool {
        self.clock.play()
    }

    pub fn pause(&mut self) -> bool {
        self.clock.pause()
    }

    pub fn seek(&mut self, time: TimeCode) -> Option<TimeCode> {
        self.clock.seek(time)
    }

    pub fn set_speed(&mut self, speed: f64) -> Option<SpeedChange> {
        self.clock.set_speed(speed)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.clock.set_looping(looping);
    }

    pub fn advance(&mut self, delta_ms: f64) -> Boundary {
        self.clock.advance(delta_ms)
    }

    pub fn rewind_if_finished(&mut self) -> bool {
        self.clock.rewind_if_finished()
    }

    pub fn step_frames(&mut self, frames: i32) -> bool {
        let interval = self.timing.frame_interval_ms();
        self.clock.step_frames(frames, interval)
    }

    /// Frame to draw at the current mesh time, per the default provider.
    pub fn frame_index(&self) -> FrameNumber {
        self.frame_index_with(&FrameIndexProvider {
            frame_count: self.timing.frame_count,
        })
    }

    pub fn frame_index_with(&self, provider: &dyn MeshFrameProvider) -> FrameNumber {
        provider.frame_at(self.clock.time(), self.timing.frame_interval_ms())
    }
}
