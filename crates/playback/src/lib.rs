//! `pc-playback` -- Multi-timeline playback synchronization for pose-compare grids.
//!
//! This crate provides:
//!
//! - **`PlaybackEngine`**: One authoritative clock that every grid cell follows, with
//!   per-cell independent overrides and per-cell mesh clocks.
//! - **`TimelineClock`**: The position/speed/loop state machine shared by all clocks.
//! - **`CellRegistry`**: Per-cell records holding weak media handles and mesh clocks.
//! - **`DriftReconciler`**: Pulls media handles back toward engine time each tick.
//! - **`EventBus`**: Synchronous, panic-isolated listener dispatch.
//! - **`TickSource`**: Host repaint callbacks (`ManualTickSource`, `FixedRateTicker`).
//!
//! # Architecture
//!
//! ```text
//! TickSource ──► PlaybackEngine::tick(now)
//!                 ├── shared: TimelineClock          (authoritative time)
//!                 ├── registry: CellRegistry
//!                 │    └── CellPlaybackState per cell
//!                 │         ├── local: TimelineClock  (independent override)
//!                 │         ├── media: Weak<dyn MediaHandle>
//!                 │         └── mesh: MeshClock       (3D animation clock)
//!                 ├── DriftReconciler                 (media ◄── engine time)
//!                 ├── ScrubController                 (drag / release state)
//!                 └── EventBus ──► listeners          (after state borrow ends)
//! ```
//!
//! The engine is single-threaded: handles are `Rc`-based and not `Send`.

pub mod clock;
pub mod engine;
pub mod events;
pub mod global;
pub mod media;
pub mod mesh;
pub mod reconcile;
pub mod registry;
pub mod scrub;
pub mod snapshot;
pub mod tick;

// Re-export primary types at crate root for convenience.
pub use clock::{Boundary, SpeedChange, TimelineClock};
pub use engine::{PlaybackEngine, WeakPlaybackEngine};
pub use events::{EventBus, ListenerId, PlaybackEvent, Subscription, MAX_DISPATCH_DEPTH};
pub use global::{global_playback_engine, init_global_playback_engine};
pub use media::{MediaHandle, VirtualMedia};
pub use mesh::{FrameIndexProvider, MeshClock, MeshFrameProvider, MeshTiming};
pub use reconcile::{DriftReconciler, PlaybackTarget, ReconcileReport};
pub use registry::{CellPlaybackState, CellRegistry};
pub use scrub::{ScrubController, ScrubRelease};
pub use snapshot::{CellSnapshot, EngineSnapshot, MeshSnapshot};
pub use tick::{FixedRateTicker, ManualTickSource, TickDriver, TickSource};
