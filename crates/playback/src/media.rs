//! Media handle abstraction over a renderable video surface.
//!
//! The engine only ever holds [`Weak`](std::rc::Weak) references to handles;
//! the rendering layer owns them and may drop them at any time. Methods take
//! `&self` because real surfaces (and [`VirtualMedia`]) mutate through
//! interior state, the way a DOM media element does.

use std::cell::Cell;

use pc_common::MediaError;

/// Capability set the engine needs from a video surface.
pub trait MediaHandle {
    /// Native playback position in milliseconds.
    fn position_ms(&self) -> f64;

    fn set_position_ms(&self, position_ms: f64);

    /// Native duration, or `None` while metadata is still loading.
    fn duration_ms(&self) -> Option<f64>;

    /// Request native playback. May be refused (autoplay policy); callers
    /// treat a refusal as transient.
    fn play(&self) -> Result<(), MediaError>;

    fn pause(&self);

    fn is_paused(&self) -> bool;

    fn playback_rate(&self) -> f64;

    /// Set the native rate. Backends only accept non-negative rates.
    fn set_playback_rate(&self, rate: f64);
}

/// In-memory media handle that plays by itself when [`advance`](Self::advance)
/// is called, like a browser video element between repaints.
///
/// Used by the simulation binary and by tests; counts the commands it
/// receives so drift correction can be observed.
#[derive(Debug)]
pub struct VirtualMedia {
    position_ms: Cell<f64>,
    duration_ms: Cell<Option<f64>>,
    paused: Cell<bool>,
    rate: Cell<f64>,
    reject_play: Cell<bool>,
    seek_count: Cell<u32>,
    play_requests: Cell<u32>,
}

impl VirtualMedia {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            position_ms: Cell::new(0.0),
            duration_ms: Cell::new(Some(duration_ms)),
            paused: Cell::new(true),
            rate: Cell::new(1.0),
            reject_play: Cell::new(false),
            seek_count: Cell::new(0),
            play_requests: Cell::new(0),
        }
    }

    /// A handle whose metadata has not loaded yet.
    pub fn without_metadata() -> Self {
        let media = Self::new(0.0);
        media.duration_ms.set(None);
        media
    }

    /// Refuse every `play()` the way an autoplay policy would.
    pub fn set_reject_play(&self, reject: bool) {
        self.reject_play.set(reject);
    }

    /// Simulate metadata arriving (or changing).
    pub fn set_duration_ms(&self, duration_ms: Option<f64>) {
        self.duration_ms.set(duration_ms);
    }

    /// Move the native position forward by `delta_ms * rate` if playing,
    /// stopping at the end of the media.
    pub fn advance(&self, delta_ms: f64) {
        if self.paused.get() {
            return;
        }
        let mut next = self.position_ms.get() + delta_ms * self.rate.get();
        if let Some(duration) = self.duration_ms.get() {
            if next >= duration {
                next = duration;
                self.paused.set(true);
            }
        }
        self.position_ms.set(next);
    }

    /// Number of `set_position_ms` calls received so far.
    pub fn seek_count(&self) -> u32 {
        self.seek_count.get()
    }

    /// Number of `play()` calls received so far, including rejected ones.
    pub fn play_requests(&self) -> u32 {
        self.play_requests.get()
    }
}

impl MediaHandle for VirtualMedia {
    fn position_ms(&self) -> f64 {
        self.position_ms.get()
    }

    fn set_position_ms(&self, position_ms: f64) {
        self.seek_count.set(self.seek_count.get() + 1);
        self.position_ms.set(position_ms);
    }

    fn duration_ms(&self) -> Option<f64> {
        self.duration_ms.get()
    }

    fn play(&self) -> Result<(), MediaError> {
        self.play_requests.set(self.play_requests.get() + 1);
        if self.reject_play.get() {
            return Err(MediaError::PlayRejected(
                "play() blocked by autoplay policy".to_string(),
            ));
        }
        self.paused.set(false);
        Ok(())
    }

    fn pause(&self) {
        self.paused.set(true);
    }

    fn is_paused(&self) -> bool {
        self.paused.get()
    }

    fn playback_rate(&self) -> f64 {
        self.rate.get()
    }

    fn set_playback_rate(&self, rate: f64) {
        self.rate.set(rate.max(0.0));
    }
}
