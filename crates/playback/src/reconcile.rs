//! Drift reconciliation: keep media handles near engine-authoritative time.
//!
//! Runs once per tick. Synced cells follow the shared clock, independent
//! cells follow their local clock. While a handle is playing natively, small
//! drift (under one frame by default) is tolerated so the backend's own
//! buffering does not cause constant re-seeks. When the engine wants the
//! handle still, or is playing in reverse, the handle is paused and stepped
//! by discrete seeks instead, since backends cannot play at a negative rate.

use pc_common::{EngineConfig, TimeCode};
use tracing::{debug, trace};

use crate::clock::TimelineClock;
use crate::media::MediaHandle;
use crate::registry::CellRegistry;

/// Where a handle should be and what it should be doing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlaybackTarget {
    pub time: TimeCode,
    pub playing: bool,
    pub speed: f64,
}

impl PlaybackTarget {
    pub fn of(clock: &TimelineClock) -> Self {
        Self {
            time: clock.time(),
            playing: clock.is_playing(),
            speed: clock.speed(),
        }
    }
}

/// What one reconcile pass did to one handle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HandleOutcome {
    pub corrected: bool,
    pub play_rejected: bool,
}

/// Totals for one reconcile pass over the registry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Handles whose position was forced.
    pub corrected: usize,
    /// `play()` refusals swallowed this pass.
    pub play_rejected: usize,
    /// Registered handles whose owner already dropped them.
    pub detached: usize,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DriftReconciler {
    threshold_ms: f64,
    still_epsilon_ms: f64,
}

impl DriftReconciler {
    pub fn new(threshold_ms: f64, still_epsilon_ms: f64) -> Self {
        Self {
            threshold_ms,
            still_epsilon_ms,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.drift_threshold_ms(), config.reverse_seek_epsilon_ms)
    }

    pub fn threshold_ms(&self) -> f64 {
        self.threshold_ms
    }

    /// Reconcile every live handle in the registry.
    pub fn reconcile(&self, registry: &CellRegistry, shared: &TimelineClock) -> ReconcileReport {
        let shared_target = PlaybackTarget::of(shared);
        let mut report = ReconcileReport::default();

        for (cell_id, cell) in registry.iter() {
            if !cell.has_media() {
                continue;
            }
            let Some(handle) = cell.media_handle() else {
                report.detached += 1;
                continue;
            };
            let target = if cell.is_independent() {
                PlaybackTarget::of(cell.local())
            } else {
                shared_target
            };
            let outcome = self.reconcile_handle(handle.as_ref(), target);
            if outcome.corrected {
                report.corrected += 1;
                trace!(cell = %cell_id, target = target.time.as_millis(), "Drift corrected");
            }
            if outcome.play_rejected {
                report.play_rejected += 1;
            }
        }
        report
    }

    /// Bring one handle in line with `target`.
    pub fn reconcile_handle(&self, handle: &dyn MediaHandle, target: PlaybackTarget) -> HandleOutcome {
        let mut outcome = HandleOutcome::default();
        let native_play = target.playing && target.speed > 0.0;

        let rate = target.speed.abs();
        if handle.playback_rate() != rate {
            handle.set_playback_rate(rate);
        }

        let goal = match handle.duration_ms() {
            Some(d) if d.is_finite() && d > 0.0 => {
                target.time.clamp(TimeCode::ZERO, TimeCode::from_millis(d))
            }
            _ => target.time,
        };
        let tolerance = if native_play {
            self.threshold_ms
        } else {
            self.still_epsilon_ms
        };
        if TimeCode::from_millis(handle.position_ms()).distance(goal) > tolerance {
            handle.set_position_ms(goal.as_millis());
            outcome.corrected = true;
        }

        if native_play {
            if handle.is_paused() {
                if let Err(err) = handle.play() {
                    // Intent stays "playing"; position correction keeps the
                    // surface close until a later play() is accepted.
                    debug!(error = %err, "Media play() rejected; ignoring");
                    outcome.play_rejected = true;
                }
            }
        } else if !handle.is_paused() {
            handle.pause();
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VirtualMedia;
    use pc_common::CellId;
    use std::rc::{Rc, Weak};

    fn reconciler() -> DriftReconciler {
        DriftReconciler::new(1000.0 / 30.0, 0.5)
    }

    fn playing_at(ms: f64, speed: f64) -> PlaybackTarget {
        PlaybackTarget {
            time: TimeCode::from_millis(ms),
            playing: true,
            speed,
        }
    }

    #[test]
    fn small_drift_tolerated_while_playing() {
        let media = VirtualMedia::new(10_000.0);
        media.play().unwrap();
        media.set_position_ms(1010.0);
        let outcome = reconciler().reconcile_handle(&media, playing_at(1000.0, 1.0));
        assert!(!outcome.corrected);
        assert_eq!(media.position_ms(), 1010.0);
    }

    #[test]
    fn large_drift_forced() {
        let media = VirtualMedia::new(10_000.0);
        let outcome = reconciler().reconcile_handle(&media, playing_at(2000.0, 1.0));
        assert!(outcome.corrected);
        assert_eq!(media.position_ms(), 2000.0);
        assert!(!media.is_paused());
    }

    #[test]
    fn paused_target_seeks_precisely_and_pauses() {
        let media = VirtualMedia::new(10_000.0);
        media.play().unwrap();
        let target = PlaybackTarget {
            time: TimeCode::from_millis(1000.0 / 30.0),
            playing: false,
            speed: 1.0,
        };
        let outcome = reconciler().reconcile_handle(&media, target);
        assert!(outcome.corrected);
        assert!(media.is_paused());
    }

    #[test]
    fn reverse_uses_discrete_seeks() {
        let media = VirtualMedia::new(10_000.0);
        media.set_position_ms(5000.0);
        let outcome = reconciler().reconcile_handle(&media, playing_at(4990.0, -2.0));
        assert!(outcome.corrected);
        assert!(media.is_paused());
        assert_eq!(media.playback_rate(), 2.0);
        assert_eq!(media.position_ms(), 4990.0);
    }

    #[test]
    fn rejected_play_is_swallowed() {
        let media = VirtualMedia::new(10_000.0);
        media.set_reject_play(true);
        let outcome = reconciler().reconcile_handle(&media, playing_at(0.0, 1.0));
        assert!(outcome.play_rejected);
        assert!(media.is_paused());

        media.set_reject_play(false);
        let outcome = reconciler().reconcile_handle(&media, playing_at(0.0, 1.0));
        assert!(!outcome.play_rejected);
        assert!(!media.is_paused());
    }

    #[test]
    fn target_clamped_to_shorter_media() {
        let media = VirtualMedia::new(3000.0);
        reconciler().reconcile_handle(&media, playing_at(9000.0, 1.0));
        assert_eq!(media.position_ms(), 3000.0);
        let outcome = reconciler().reconcile_handle(&media, playing_at(9016.0, 1.0));
        assert!(!outcome.corrected);
    }

    #[test]
    fn registry_pass_follows_independence() {
        let mut registry = CellRegistry::new();
        let synced = Rc::new(VirtualMedia::new(10_000.0));
        let solo = Rc::new(VirtualMedia::new(10_000.0));
        let gone = Rc::new(VirtualMedia::new(10_000.0));
        let as_weak = |m: &Rc<VirtualMedia>| -> Weak<dyn MediaHandle> {
            let w: Weak<VirtualMedia> = Rc::downgrade(m);
            w
        };
        registry.attach_media(CellId::new("synced"), as_weak(&synced));
        registry.attach_media(CellId::new("solo"), as_weak(&solo));
        registry.attach_media(CellId::new("gone"), as_weak(&gone));
        drop(gone);

        let mut shared = TimelineClock::default();
        shared.set_duration(TimeCode::from_millis(10_000.0));
        shared.seek(TimeCode::from_millis(2000.0));

        let cell = registry.get_mut("solo").unwrap();
        cell.enter_independent(&shared);
        cell.local_mut().seek(TimeCode::from_millis(7000.0));

        let report = reconciler().reconcile(&registry, &shared);
        assert_eq!(report.corrected, 2);
        assert_eq!(report.detached, 1);
        assert_eq!(synced.position_ms(), 2000.0);
        assert_eq!(solo.position_ms(), 7000.0);
    }
}
