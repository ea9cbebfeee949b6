//! Scrub / transition control: moving cells between synced and independent
//! playback during drags and frame stepping.
//!
//! Entering independent mode seeds the cell's local clock from the shared
//! clock, so nothing jumps. Leaving it snaps the cell back to shared time;
//! the shared clock never adopts a cell's drifted local time.

use std::collections::BTreeMap;

use pc_common::{CellId, TimeCode};
use tracing::debug;

use crate::clock::TimelineClock;
use crate::events::PlaybackEvent;
use crate::registry::CellRegistry;

/// What happens to a cell when its scrub drag ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScrubRelease {
    /// Keep presenting the scrubbed position on the cell's own clock.
    StayIndependent,
    /// Drop the local override and follow the shared clock again.
    Resync,
}

/// Mark a cell independent (creating its record if needed) or re-synced.
/// Returns `true` if the mode changed.
pub fn set_independent(
    registry: &mut CellRegistry,
    shared: &TimelineClock,
    cell_id: &str,
    independent: bool,
    events: &mut Vec<PlaybackEvent>,
) -> bool {
    let changed = if independent {
        let cell = registry.get_or_create(CellId::from(cell_id));
        if cell.is_independent() {
            false
        } else {
            cell.enter_independent(shared);
            true
        }
    } else {
        registry.resync(cell_id)
    };

    if changed {
        debug!(cell = cell_id, independent, time = %shared.time(), "Cell playback mode changed");
        events.push(PlaybackEvent::CellIndependenceChanged {
            cell_id: CellId::from(cell_id),
            is_independent: independent,
        });
    }
    changed
}

/// Set an independent cell's local time, clamped to its own timeline.
/// Synced and unknown cells are left alone (`None`).
pub fn set_cell_time(
    registry: &mut CellRegistry,
    shared_duration: TimeCode,
    cell_id: &str,
    time: TimeCode,
) -> Option<TimeCode> {
    let cell = registry.get_mut(cell_id)?;
    if !cell.is_independent() {
        return None;
    }
    let duration = cell.timeline_duration(shared_duration);
    let local = cell.local_mut();
    local.set_duration(duration);
    local.seek(time)
}

/// Step a cell by whole frames on its own clock, detaching it from the
/// shared clock first if needed. Pauses the cell's local transport.
pub fn step_cell_frames(
    registry: &mut CellRegistry,
    shared: &TimelineClock,
    cell_id: &str,
    frames: i32,
    interval_ms: f64,
    events: &mut Vec<PlaybackEvent>,
) -> Option<TimeCode> {
    if frames == 0 {
        return None;
    }
    set_independent(registry, shared, cell_id, true, events);
    let cell = registry.get_mut(cell_id)?;
    let duration = cell.timeline_duration(shared.duration());
    let local = cell.local_mut();
    local.set_duration(duration);
    local.step_frames(frames, interval_ms);
    let time = local.time();

    let cell_id = CellId::from(cell_id);
    events.push(if frames > 0 {
        PlaybackEvent::CellFrameNext { cell_id }
    } else {
        PlaybackEvent::CellFramePrev { cell_id }
    });
    Some(time)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CellScrub {
    /// Local transport was playing when the drag began.
    resume_local: bool,
}

/// In-flight drag state for the shared scrubber and per-cell scrubbers.
#[derive(Debug, Default)]
pub struct ScrubController {
    /// `Some(resume)` while the shared scrubber is held.
    global: Option<bool>,
    cells: BTreeMap<CellId, CellScrub>,
}

impl ScrubController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scrubbing(&self) -> bool {
        self.global.is_some()
    }

    pub fn is_cell_scrubbing(&self, cell_id: &str) -> bool {
        self.cells.contains_key(cell_id)
    }

    /// Grab the shared scrubber: remember play intent and pause.
    pub fn begin(&mut self, clock: &mut TimelineClock, events: &mut Vec<PlaybackEvent>) {
        if self.global.is_some() {
            return;
        }
        let resume = clock.pause();
        if resume {
            events.push(PlaybackEvent::Pause);
        }
        self.global = Some(resume);
        debug!(resume, time = %clock.time(), "Scrub started");
    }

    /// Release the shared scrubber, resuming playback if it was playing.
    pub fn end(&mut self, clock: &mut TimelineClock, events: &mut Vec<PlaybackEvent>) {
        let Some(resume) = self.global.take() else {
            return;
        };
        if resume && clock.play() {
            events.push(PlaybackEvent::Play);
        }
        debug!(resume, time = %clock.time(), "Scrub ended");
    }

    /// Grab a cell's scrubber: detach the cell and hold its local clock.
    pub fn begin_cell(
        &mut self,
        registry: &mut CellRegistry,
        shared: &TimelineClock,
        cell_id: &str,
        events: &mut Vec<PlaybackEvent>,
    ) {
        if self.cells.contains_key(cell_id) {
            return;
        }
        set_independent(registry, shared, cell_id, true, events);
        let Some(cell) = registry.get_mut(cell_id) else {
            return;
        };
        let resume_local = cell.local_mut().pause();
        self.cells
            .insert(CellId::from(cell_id), CellScrub { resume_local });
        debug!(cell = cell_id, "Cell scrub started");
    }

    /// Release a cell's scrubber.
    pub fn end_cell(
        &mut self,
        registry: &mut CellRegistry,
        shared: &TimelineClock,
        cell_id: &str,
        release: ScrubRelease,
        events: &mut Vec<PlaybackEvent>,
    ) {
        let state = self.cells.remove(cell_id);
        match release {
            ScrubRelease::Resync => {
                set_independent(registry, shared, cell_id, false, events);
            }
            ScrubRelease::StayIndependent => {
                if let (Some(state), Some(cell)) = (state, registry.get_mut(cell_id)) {
                    if state.resume_local && cell.is_independent() {
                        cell.local_mut().play();
                    }
                }
            }
        }
        debug!(cell = cell_id, ?release, "Cell scrub ended");
    }

    /// Drop any drag state for a cell that went away or was re-synced.
    pub fn forget_cell(&mut self, cell_id: &str) {
        self.cells.remove(cell_id);
    }
}
