//! Serializable point-in-time view of the engine.
//!
//! `EngineSnapshot` is what the simulator prints and what tests compare
//! against. It uses plain `f64` milliseconds instead of newtypes so the JSON
//! stays flat.

use serde::{Deserialize, Serialize};

use crate::clock::TimelineClock;
use crate::mesh::MeshClock;
use crate::registry::{CellPlaybackState, CellRegistry};

/// Mesh side of a cell.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MeshSnapshot {
    pub time_ms: f64,
    pub duration_ms: f64,
    pub is_playing: bool,
    pub speed: f64,
    /// Frame the default provider resolves for `time_ms`.
    pub frame: u64,
}

impl MeshSnapshot {
    fn capture(mesh: &MeshClock) -> Self {
        Self {
            time_ms: mesh.time().as_millis(),
            duration_ms: mesh.duration().as_millis(),
            is_playing: mesh.is_playing(),
            speed: mesh.speed(),
            frame: mesh.frame_index().0,
        }
    }
}

/// One grid cell.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CellSnapshot {
    pub cell_id: String,
    pub is_independent: bool,
    /// Local time when independent, shared time otherwise.
    pub presented_time_ms: f64,
    /// Local transport state; always `false` for synced cells.
    pub local_playing: bool,
    pub has_media: bool,
    /// A media handle is registered and its owner still holds it.
    pub media_live: bool,
    pub media_duration_ms: Option<f64>,
    pub mesh: Option<MeshSnapshot>,
}

impl CellSnapshot {
    fn capture(cell_id: &str, cell: &CellPlaybackState, shared: &TimelineClock) -> Self {
        Self {
            cell_id: cell_id.to_string(),
            is_independent: cell.is_independent(),
            presented_time_ms: cell.presented_time(shared.time()).as_millis(),
            local_playing: cell.is_independent() && cell.local().is_playing(),
            has_media: cell.has_media(),
            media_live: cell.media_handle().is_some(),
            media_duration_ms: cell.media_duration().map(|d| d.as_millis()),
            mesh: cell.mesh().map(MeshSnapshot::capture),
        }
    }
}

/// The shared clock plus every registered cell, in cell-id order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EngineSnapshot {
    pub playback_time_ms: f64,
    pub duration_ms: f64,
    pub is_playing: bool,
    pub is_looping: bool,
    pub playback_speed: f64,
    pub cells: Vec<CellSnapshot>,
}

impl EngineSnapshot {
    pub fn capture(clock: &TimelineClock, registry: &CellRegistry) -> Self {
        Self {
            playback_time_ms: clock.time().as_millis(),
            duration_ms: clock.duration().as_millis(),
            is_playing: clock.is_playing(),
            is_looping: clock.is_looping(),
            playback_speed: clock.speed(),
            cells: registry
                .iter()
                .map(|(id, cell)| CellSnapshot::capture(id.as_str(), cell, clock))
                .collect(),
        }
    }

    pub fn cell(&self, cell_id: &str) -> Option<&CellSnapshot> {
        self.cells.iter().find(|c| c.cell_id == cell_id)
    }

    pub fn independent_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_independent).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaHandle, VirtualMedia};
    use crate::mesh::MeshTiming;
    use pc_common::{CellId, Rational, TimeCode};
    use std::rc::{Rc, Weak};

    #[test]
    fn captures_cells_in_id_order() {
        let mut registry = CellRegistry::new();
        let media = Rc::new(VirtualMedia::new(6000.0));
        let weak: Weak<VirtualMedia> = Rc::downgrade(&media);
        registry.attach_media(CellId::new("b"), weak as Weak<dyn MediaHandle>);
        registry.attach_mesh(
            CellId::new("a"),
            MeshClock::new(MeshTiming::from_frames(30, Rational::FPS_30), true),
        );

        let mut clock = TimelineClock::default();
        clock.set_duration(TimeCode::from_millis(6000.0));
        clock.seek(TimeCode::from_millis(1500.0));

        let snapshot = EngineSnapshot::capture(&clock, &registry);
        assert_eq!(snapshot.playback_time_ms, 1500.0);
        let ids: Vec<_> = snapshot.cells.iter().map(|c| c.cell_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let b = snapshot.cell("b").unwrap();
        assert!(b.media_live);
        assert_eq!(b.media_duration_ms, Some(6000.0));
        assert_eq!(b.presented_time_ms, 1500.0);
        assert!(snapshot.cell("a").unwrap().mesh.is_some());
        assert_eq!(snapshot.independent_count(), 0);
    }

    #[test]
    fn dropped_media_reported_not_live() {
        let mut registry = CellRegistry::new();
        let media = Rc::new(VirtualMedia::new(1000.0));
        let weak: Weak<VirtualMedia> = Rc::downgrade(&media);
        registry.attach_media(CellId::new("a"), weak as Weak<dyn MediaHandle>);
        drop(media);

        let snapshot = EngineSnapshot::capture(&TimelineClock::default(), &registry);
        let a = snapshot.cell("a").unwrap();
        assert!(a.has_media);
        assert!(!a.media_live);
    }

    #[test]
    fn serializes_flat_json() {
        let snapshot = EngineSnapshot::capture(&TimelineClock::default(), &CellRegistry::new());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["playback_time_ms"], 0.0);
        assert_eq!(json["playback_speed"], 1.0);
        assert!(json["cells"].as_array().unwrap().is_empty());

        let back: EngineSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
