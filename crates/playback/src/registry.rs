//! Cell registry: per-cell playback records keyed by [`CellId`].
//!
//! A record exists while the cell has a video handle or a mesh clock. An
//! independence override may create a record ahead of registration; it is
//! dropped again when the cell re-syncs or its last registration goes away.
//! The video side holds only a weak reference; the rendering layer owns the
//! surface.

use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use pc_common::{CellId, TimeCode};
use tracing::debug;

use crate::clock::TimelineClock;
use crate::media::MediaHandle;
use crate::mesh::MeshClock;

/// Playback record for one grid cell.
///
/// The video-side local clock and the mesh clock are two independent state
/// machines; neither reads the other.
pub struct CellPlaybackState {
    independent: bool,
    /// Local transport; only meaningful while `independent`.
    local: TimelineClock,
    media: Option<Weak<dyn MediaHandle>>,
    media_duration: Option<TimeCode>,
    mesh: Option<MeshClock>,
}

impl std::fmt::Debug for CellPlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellPlaybackState")
            .field("independent", &self.independent)
            .field("local", &self.local)
            .field("media_live", &self.media_handle().is_some())
            .field("media_duration", &self.media_duration)
            .field("mesh", &self.mesh)
            .finish()
    }
}

impl Default for CellPlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl CellPlaybackState {
    pub fn new() -> Self {
        Self {
            independent: false,
            local: TimelineClock::default(),
            media: None,
            media_duration: None,
            mesh: None,
        }
    }

    pub fn is_independent(&self) -> bool {
        self.independent
    }

    /// Local transport of an independent cell.
    pub fn local(&self) -> &TimelineClock {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut TimelineClock {
        &mut self.local
    }

    /// Time this cell should present: its local time when independent, the
    /// shared time otherwise.
    pub fn presented_time(&self, shared_time: TimeCode) -> TimeCode {
        if self.independent {
            self.local.time()
        } else {
            shared_time
        }
    }

    /// Upper bound for the cell's local time: its own media length when
    /// known, else the shared duration.
    pub fn timeline_duration(&self, shared_duration: TimeCode) -> TimeCode {
        self.media_duration.unwrap_or(shared_duration)
    }

    /// Detach from the shared clock, seeding the local transport from it so
    /// the presented frame does not jump.
    pub fn enter_independent(&mut self, shared: &TimelineClock) {
        let mut local = TimelineClock::new(shared.speed(), shared.is_looping());
        local.set_duration(self.timeline_duration(shared.duration()));
        local.seek(shared.time());
        if shared.is_playing() {
            local.play();
        }
        self.local = local;
        self.independent = true;
    }

    /// Re-join the shared clock. The local time is discarded.
    pub fn leave_independent(&mut self) {
        self.independent = false;
        self.local = TimelineClock::default();
    }

    /// Live media handle, if one is attached and its owner still holds it.
    pub fn media_handle(&self) -> Option<Rc<dyn MediaHandle>> {
        self.media.as_ref().and_then(Weak::upgrade)
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    pub fn media_duration(&self) -> Option<TimeCode> {
        self.media_duration
    }

    pub fn mesh(&self) -> Option<&MeshClock> {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> Option<&mut MeshClock> {
        self.mesh.as_mut()
    }

    /// Re-read the handle's duration. A dead handle has none.
    fn refresh_media_duration(&mut self) {
        self.media_duration = self.media_handle().and_then(|handle| {
            handle
                .duration_ms()
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(TimeCode::from_millis)
        });
    }

    fn is_vacant(&self) -> bool {
        self.media.is_none() && self.mesh.is_none()
    }
}

/// All registered cells, iterated in `CellId` order.
#[derive(Debug, Default)]
pub struct CellRegistry {
    cells: BTreeMap<CellId, CellPlaybackState>,
}

impl CellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell_id: &str) -> bool {
        self.cells.contains_key(cell_id)
    }

    pub fn get(&self, cell_id: &str) -> Option<&CellPlaybackState> {
        self.cells.get(cell_id)
    }

    pub fn get_mut(&mut self, cell_id: &str) -> Option<&mut CellPlaybackState> {
        self.cells.get_mut(cell_id)
    }

    /// Record for `cell_id`, created on first use.
    pub fn get_or_create(&mut self, cell_id: CellId) -> &mut CellPlaybackState {
        self.cells.entry(cell_id).or_insert_with_key(|id| {
            debug!(cell = %id, "Cell record created");
            CellPlaybackState::new()
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &CellId> {
        self.cells.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellId, &CellPlaybackState)> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&CellId, &mut CellPlaybackState)> {
        self.cells.iter_mut()
    }

    /// Attach (or replace) the cell's media handle.
    pub fn attach_media(&mut self, cell_id: CellId, handle: Weak<dyn MediaHandle>) {
        let cell = self.get_or_create(cell_id);
        cell.media = Some(handle);
        cell.refresh_media_duration();
    }

    /// Detach the cell's media handle, dropping the record if nothing else
    /// keeps it. Returns `false` (and changes nothing) if the cell had no
    /// handle.
    pub fn detach_media(&mut self, cell_id: &str) -> bool {
        let Some(cell) = self.cells.get_mut(cell_id) else {
            return false;
        };
        if cell.media.take().is_none() {
            return false;
        }
        cell.media_duration = None;
        self.remove_if_vacant(cell_id);
        true
    }

    /// Attach (or replace) the cell's mesh clock.
    pub fn attach_mesh(&mut self, cell_id: CellId, mesh: MeshClock) {
        self.get_or_create(cell_id).mesh = Some(mesh);
    }

    /// Remove the cell's mesh clock. Returns `false` (and changes nothing)
    /// if it had none.
    pub fn detach_mesh(&mut self, cell_id: &str) -> bool {
        let Some(cell) = self.cells.get_mut(cell_id) else {
            return false;
        };
        if cell.mesh.take().is_none() {
            return false;
        }
        self.remove_if_vacant(cell_id);
        true
    }

    /// Leave independent mode, dropping the record if it only existed for
    /// the override.
    pub fn resync(&mut self, cell_id: &str) -> bool {
        let Some(cell) = self.cells.get_mut(cell_id) else {
            return false;
        };
        let was_independent = cell.independent;
        cell.leave_independent();
        self.remove_if_vacant(cell_id);
        was_independent
    }

    /// Refresh every media duration and return the longest one known.
    pub fn refresh_media_durations(&mut self) -> Option<TimeCode> {
        let mut longest: Option<TimeCode> = None;
        for cell in self.cells.values_mut() {
            cell.refresh_media_duration();
            if let Some(d) = cell.media_duration {
                if longest.map_or(true, |l| d > l) {
                    longest = Some(d);
                }
            }
        }
        longest
    }

    fn remove_if_vacant(&mut self, cell_id: &str) {
        if self.cells.get(cell_id).is_some_and(CellPlaybackState::is_vacant) {
            self.cells.remove(cell_id);
            debug!(cell = cell_id, "Cell record removed");
        }
    }
}
