//! The playback engine: one authoritative clock driving every grid cell.
//!
//! # Design
//!
//! [`PlaybackEngine`] is a cheap, cloneable handle to shared state. All
//! mutable state lives in a single `RefCell`. Every mutator collects the
//! events it produces while the state is borrowed, releases the borrow, and
//! only then dispatches them. Listeners may therefore call back into the
//! engine from inside a callback.
//!
//! Per tick, in order:
//!
//! 1. derive the delta from the previous timestamp (never negative; capped
//!    only when `max_tick_delta_ms` is configured)
//! 2. refresh the shared duration from the explicit floor and media lengths
//! 3. advance the shared clock
//! 4. advance independent cells' local clocks and every mesh clock
//! 5. reconcile media handles against their targets
//! 6. emit `FrameUpdate`
//!
//! # Failure Modes
//!
//! Nothing here is fatal. Invalid arguments are clamped or ignored with a
//! warning, unknown cells are no-ops, and rejected `play()` calls on media
//! are swallowed by the reconciler.
//!
//! [`MediaHandle`] implementations run while the engine state is borrowed
//! and must not call back into the engine.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use pc_common::{CellId, EngineConfig, FrameNumber, SyncResult, TimeCode};
use tracing::{debug, trace, warn};

use crate::clock::{Boundary, TimelineClock};
use crate::events::{EventBus, PlaybackEvent, Subscription};
use crate::media::MediaHandle;
use crate::mesh::{MeshClock, MeshTiming};
use crate::reconcile::{DriftReconciler, ReconcileReport};
use crate::registry::CellRegistry;
use crate::scrub::{self, ScrubController, ScrubRelease};
use crate::snapshot::EngineSnapshot;
use crate::tick::TickSource;

struct EngineCore {
    config: EngineConfig,
    clock: TimelineClock,
    /// Duration floor set by the host; media lengths can only extend it.
    explicit_duration: TimeCode,
    registry: CellRegistry,
    reconciler: DriftReconciler,
    scrub: ScrubController,
    last_tick: Option<TimeCode>,
    tick_count: u64,
}

impl EngineCore {
    fn new(config: EngineConfig) -> Self {
        Self {
            clock: TimelineClock::new(config.initial_speed, config.initial_looping),
            explicit_duration: TimeCode::ZERO,
            registry: CellRegistry::new(),
            reconciler: DriftReconciler::from_config(&config),
            scrub: ScrubController::new(),
            last_tick: None,
            tick_count: 0,
            config,
        }
    }

    /// Shared duration = max(explicit floor, longest known media).
    fn refresh_duration(&mut self) {
        let explicit = self.explicit_duration;
        let duration = match self.registry.refresh_media_durations() {
            Some(media) if media > explicit => media,
            _ => explicit,
        };
        if duration != self.clock.duration() {
            debug!(duration = %duration, "Timeline duration changed");
            self.clock.set_duration(duration);
        }
    }

    fn tick_delta(&mut self, now: TimeCode) -> f64 {
        if !now.is_finite() {
            warn!("Ignoring non-finite tick timestamp");
            return 0.0;
        }
        let delta = match self.last_tick {
            Some(prev) => {
                let elapsed = (now - prev).as_millis().max(0.0);
                match self.config.max_tick_delta_ms {
                    Some(cap) => elapsed.min(cap),
                    None => elapsed,
                }
            }
            None => 0.0,
        };
        self.last_tick = Some(now);
        delta
    }

    fn tick(&mut self, now: TimeCode, events: &mut Vec<PlaybackEvent>) -> ReconcileReport {
        let delta = self.tick_delta(now);
        self.refresh_duration();

        if self.clock.advance(delta) == Boundary::Stopped {
            debug!(time = %self.clock.time(), "Reached timeline boundary; pausing");
            events.push(PlaybackEvent::Pause);
        }

        let shared_duration = self.clock.duration();
        let looping = self.clock.is_looping();
        for (cell_id, cell) in self.registry.iter_mut() {
            if cell.is_independent() {
                let duration = cell.timeline_duration(shared_duration);
                let local = cell.local_mut();
                local.set_duration(duration);
                local.set_looping(looping);
                if local.advance(delta) == Boundary::Stopped {
                    debug!(cell = %cell_id, "Independent cell reached its boundary; pausing");
                }
            }
            if let Some(mesh) = cell.mesh_mut() {
                if mesh.advance(delta) == Boundary::Stopped {
                    debug!(cell = %cell_id, "Mesh reached its boundary; pausing");
                    events.push(PlaybackEvent::MeshPause {
                        cell_id: cell_id.clone(),
                    });
                }
            }
        }

        let report = self.reconciler.reconcile(&self.registry, &self.clock);
        trace!(
            delta,
            time = %self.clock.time(),
            corrected = report.corrected,
            play_rejected = report.play_rejected,
            detached = report.detached,
            "Tick"
        );
        self.tick_count += 1;
        events.push(PlaybackEvent::FrameUpdate);
        report
    }

    fn mesh_mut(&mut self, cell_id: &str) -> Option<&mut MeshClock> {
        self.registry.get_mut(cell_id).and_then(|c| c.mesh_mut())
    }

    fn mesh(&self, cell_id: &str) -> Option<&MeshClock> {
        self.registry.get(cell_id).and_then(|c| c.mesh())
    }
}

struct EngineInner {
    core: RefCell<EngineCore>,
    bus: EventBus,
}

/// Handle to a playback engine. Clones share the same engine.
///
/// Not `Send`: the engine lives on the thread that ticks it.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Rc<EngineInner>,
}

/// Non-owning handle, used by installed tick drivers.
#[derive(Clone)]
pub struct WeakPlaybackEngine {
    inner: Weak<EngineInner>,
}

impl WeakPlaybackEngine {
    /// The engine, if any strong handle is still alive.
    pub fn upgrade(&self) -> Option<PlaybackEngine> {
        self.inner.upgrade().map(|inner| PlaybackEngine { inner })
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::from_core(EngineCore::new(EngineConfig::default()))
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.core.try_borrow() {
            Ok(core) => f
                .debug_struct("PlaybackEngine")
                .field("time", &core.clock.time())
                .field("duration", &core.clock.duration())
                .field("playing", &core.clock.is_playing())
                .field("speed", &core.clock.speed())
                .field("cells", &core.registry.len())
                .finish(),
            Err(_) => f.write_str("PlaybackEngine { <busy> }"),
        }
    }
}

impl PlaybackEngine {
    /// Engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with a validated configuration.
    pub fn with_config(config: EngineConfig) -> SyncResult<Self> {
        config.validate()?;
        debug!(
            fps = %config.fps,
            threshold_ms = config.drift_threshold_ms(),
            "Playback engine created"
        );
        Ok(Self::from_core(EngineCore::new(config)))
    }

    fn from_core(core: EngineCore) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                core: RefCell::new(core),
                bus: EventBus::new(),
            }),
        }
    }

    /// Non-owning handle to this engine.
    pub fn downgrade(&self) -> WeakPlaybackEngine {
        WeakPlaybackEngine {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Two handles refer to the same engine.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn read<R>(&self, f: impl FnOnce(&EngineCore) -> R) -> R {
        f(&self.inner.core.borrow())
    }

    /// Run `f` against the state, then dispatch whatever it queued.
    fn mutate<R>(&self, f: impl FnOnce(&mut EngineCore, &mut Vec<PlaybackEvent>) -> R) -> R {
        let mut events = Vec::new();
        let out = {
            let mut core = self.inner.core.borrow_mut();
            f(&mut core, &mut events)
        };
        for event in &events {
            self.inner.bus.emit(event);
        }
        out
    }

    // -- Events and ticking -------------------------------------------------

    /// Subscribe to engine events. Dropping the returned guard unsubscribes.
    pub fn add_event_listener(&self, listener: impl Fn(&PlaybackEvent) + 'static) -> Subscription {
        self.inner.bus.subscribe(listener)
    }

    /// Number of live subscribers.
    pub fn listener_count(&self) -> usize {
        self.inner.bus.listener_count()
    }

    /// Install this engine's driver into a host tick source. The driver
    /// holds a weak handle and does nothing once the engine is dropped.
    pub fn attach_tick_source(&self, source: &mut dyn TickSource) {
        let engine = self.downgrade();
        source.install(Box::new(move |now: TimeCode| {
            if let Some(engine) = engine.upgrade() {
                engine.tick(now);
            }
        }));
    }

    /// Advance everything by the time elapsed since the previous tick.
    pub fn tick(&self, now: TimeCode) -> ReconcileReport {
        self.mutate(|core, events| core.tick(now, events))
    }

    /// Ticks processed since creation.
    pub fn tick_count(&self) -> u64 {
        self.read(|core| core.tick_count)
    }

    /// Copy of the active configuration.
    pub fn config(&self) -> EngineConfig {
        self.read(|core| core.config.clone())
    }

    // -- Shared transport ---------------------------------------------------

    /// Start playback. A non-looping timeline parked at its far end
    /// restarts from the opposite end.
    pub fn play(&self) {
        self.mutate(|core, events| {
            if core.clock.rewind_if_finished() {
                events.push(PlaybackEvent::TimeSet {
                    time: core.clock.time(),
                });
            }
            core.clock.play();
            debug!(time = %core.clock.time(), speed = core.clock.speed(), "Playback started");
            events.push(PlaybackEvent::Play);
        });
    }

    /// Pause the shared clock. Always emits `Pause`.
    pub fn pause(&self) {
        self.mutate(|core, events| {
            core.clock.pause();
            debug!(time = %core.clock.time(), "Playback paused");
            events.push(PlaybackEvent::Pause);
        });
    }

    /// `pause()` if playing, `play()` otherwise.
    pub fn toggle_play_pause(&self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Jump the shared clock, clamped to `[0, duration]`.
    pub fn seek(&self, time: TimeCode) {
        self.mutate(|core, events| match core.clock.seek(time) {
            Some(time) => {
                debug!(time = %time, "Seeked");
                events.push(PlaybackEvent::TimeSet { time });
            }
            None => warn!(time = time.as_millis(), "Ignoring non-finite seek"),
        });
    }

    /// Set the signed speed. Zero and non-finite speeds are ignored.
    pub fn set_speed(&self, speed: f64) {
        self.mutate(|core, events| match core.clock.set_speed(speed) {
            Some(change) => {
                debug!(speed, "Playback speed changed");
                events.push(PlaybackEvent::SpeedChanged { speed: change.speed });
                if change.direction_changed {
                    events.push(PlaybackEvent::ReverseToggled {
                        is_reversing: change.speed < 0.0,
                    });
                }
            }
            None => warn!(speed, "Ignoring invalid playback speed"),
        });
    }

    /// Flip the sign of the speed, keeping its magnitude.
    pub fn toggle_reverse(&self) {
        self.mutate(|core, events| {
            let change = core.clock.toggle_reverse();
            debug!(speed = change.speed, "Playback direction reversed");
            events.push(PlaybackEvent::SpeedChanged { speed: change.speed });
            events.push(PlaybackEvent::ReverseToggled {
                is_reversing: change.speed < 0.0,
            });
        });
    }

    /// Flip the shared loop flag.
    pub fn toggle_loop(&self) {
        self.mutate(|core, events| {
            let looping = !core.clock.is_looping();
            core.clock.set_looping(looping);
            debug!(looping, "Loop toggled");
            events.push(PlaybackEvent::LoopToggled { is_looping: looping });
        });
    }

    /// Set looping explicitly; emits only on change.
    pub fn set_looping(&self, looping: bool) {
        self.mutate(|core, events| {
            if core.clock.is_looping() != looping {
                core.clock.set_looping(looping);
                debug!(looping, "Loop set");
                events.push(PlaybackEvent::LoopToggled { is_looping: looping });
            }
        });
    }

    /// Step the shared clock by whole frames at the configured fps. Pauses
    /// first if playing; clamps instead of wrapping.
    pub fn advance_frame(&self, frames: i32) {
        if frames == 0 {
            return;
        }
        self.mutate(|core, events| {
            let interval = core.config.frame_interval_ms();
            if core.clock.step_frames(frames, interval) {
                events.push(PlaybackEvent::Pause);
            }
            let time = core.clock.time();
            debug!(frames, time = %time, "Stepped frames");
            events.push(PlaybackEvent::TimeSet { time });
        });
    }

    /// Set the duration floor. Media longer than this still extends the
    /// timeline.
    pub fn set_duration(&self, duration: TimeCode) {
        if !duration.is_finite() || duration < TimeCode::ZERO {
            warn!(duration = duration.as_millis(), "Ignoring invalid duration");
            return;
        }
        self.mutate(|core, _| {
            core.explicit_duration = duration;
            core.refresh_duration();
        });
    }

    /// Shared timeline position.
    pub fn playback_time(&self) -> TimeCode {
        self.read(|core| core.clock.time())
    }

    /// Effective shared duration: the explicit floor or the longest media.
    pub fn duration(&self) -> TimeCode {
        self.read(|core| core.clock.duration())
    }

    /// Whether the shared clock is running.
    pub fn is_playing(&self) -> bool {
        self.read(|core| core.clock.is_playing())
    }

    /// Whether the shared clock wraps at its boundaries.
    pub fn is_looping(&self) -> bool {
        self.read(|core| core.clock.is_looping())
    }

    /// Signed shared speed; negative plays in reverse.
    pub fn playback_speed(&self) -> f64 {
        self.read(|core| core.clock.speed())
    }

    /// Whether the shared speed is negative.
    pub fn is_reversing(&self) -> bool {
        self.read(|core| core.clock.is_reversing())
    }

    // -- Cell registration --------------------------------------------------

    /// Attach a media handle to a cell, replacing any previous one. The
    /// engine keeps only a weak reference.
    pub fn register_video_element<M: MediaHandle + 'static>(&self, cell_id: &str, handle: &Rc<M>) {
        let weak: Weak<M> = Rc::downgrade(handle);
        self.register_media_handle(cell_id, weak);
    }

    /// Attach an already type-erased handle, e.g. one held as
    /// `Rc<dyn MediaHandle>` by the host.
    pub fn register_media_handle(&self, cell_id: &str, handle: Weak<dyn MediaHandle>) {
        self.mutate(|core, _| {
            core.registry.attach_media(CellId::from(cell_id), handle);
            core.refresh_duration();
            debug!(cell = cell_id, "Video element registered");
        });
    }

    /// Drop a cell's media handle. The record goes once nothing else
    /// (mesh or independence override) keeps it.
    pub fn unregister_video_element(&self, cell_id: &str) {
        self.mutate(|core, _| {
            if core.registry.detach_media(cell_id) {
                debug!(cell = cell_id, "Video element unregistered");
            }
            if !core.registry.contains(cell_id) {
                core.scrub.forget_cell(cell_id);
            }
            core.refresh_duration();
        });
    }

    /// Give a cell a mesh clock, or update the timing of its existing one.
    pub fn register_mesh_cell(&self, cell_id: &str, timing: MeshTiming) {
        self.mutate(|core, _| {
            if let Some(mesh) = core.mesh_mut(cell_id) {
                mesh.set_timing(timing);
            } else {
                let mesh = MeshClock::new(timing, core.config.mesh_looping);
                core.registry.attach_mesh(CellId::from(cell_id), mesh);
            }
            debug!(cell = cell_id, frames = timing.frame_count, "Mesh cell registered");
        });
    }

    /// Drop a cell's mesh clock.
    pub fn unregister_mesh_cell(&self, cell_id: &str) {
        self.mutate(|core, _| {
            if core.registry.detach_mesh(cell_id) {
                debug!(cell = cell_id, "Mesh cell unregistered");
            }
            if !core.registry.contains(cell_id) {
                core.scrub.forget_cell(cell_id);
            }
        });
    }

    /// Registered cells in id order.
    pub fn cell_ids(&self) -> Vec<CellId> {
        self.read(|core| core.registry.ids().cloned().collect())
    }

    // -- Independent cells --------------------------------------------------

    /// Detach a cell from the shared clock, or snap it back.
    pub fn set_independent_playback(&self, cell_id: &str, independent: bool) {
        self.mutate(|core, events| {
            scrub::set_independent(&mut core.registry, &core.clock, cell_id, independent, events);
            if !independent {
                core.scrub.forget_cell(cell_id);
            }
        });
    }

    /// Whether a cell runs on its own local clock.
    pub fn is_independent(&self, cell_id: &str) -> bool {
        self.read(|core| core.registry.get(cell_id).is_some_and(|c| c.is_independent()))
    }

    /// Move an independent cell's local time. Synced cells are left alone.
    pub fn set_cell_playback_time(&self, cell_id: &str, time: TimeCode) -> Option<TimeCode> {
        self.mutate(|core, _| {
            let duration = core.clock.duration();
            scrub::set_cell_time(&mut core.registry, duration, cell_id, time)
        })
    }

    /// Time the cell presents: its local time if independent, the shared
    /// time otherwise. `None` for unknown cells.
    pub fn scene_local_time(&self, cell_id: &str) -> Option<TimeCode> {
        self.read(|core| {
            core.registry
                .get(cell_id)
                .map(|cell| cell.presented_time(core.clock.time()))
        })
    }

    /// Start an independent cell's local transport.
    pub fn play_cell(&self, cell_id: &str) -> bool {
        self.mutate(|core, _| match core.registry.get_mut(cell_id) {
            Some(cell) if cell.is_independent() => {
                cell.local_mut().rewind_if_finished();
                cell.local_mut().play();
                true
            }
            _ => false,
        })
    }

    /// Pause an independent cell's local transport.
    pub fn pause_cell(&self, cell_id: &str) -> bool {
        self.mutate(|core, _| match core.registry.get_mut(cell_id) {
            Some(cell) if cell.is_independent() => {
                cell.local_mut().pause();
                true
            }
            _ => false,
        })
    }

    /// Step one cell by frames on its own clock, detaching it if needed.
    pub fn advance_independent_cell_frame(&self, cell_id: &str, frames: i32) -> Option<TimeCode> {
        self.mutate(|core, events| {
            let interval = core.config.frame_interval_ms();
            scrub::step_cell_frames(
                &mut core.registry,
                &core.clock,
                cell_id,
                frames,
                interval,
                events,
            )
        })
    }

    // -- Mesh clocks ----------------------------------------------------------

    /// Seek a mesh clock, clamped to the mesh duration.
    pub fn set_mesh_playback_time(&self, cell_id: &str, time: TimeCode) {
        self.mutate(|core, events| {
            let Some(mesh) = core.mesh_mut(cell_id) else {
                return;
            };
            match mesh.seek(time) {
                Some(time) => events.push(PlaybackEvent::MeshTimeSet {
                    cell_id: CellId::from(cell_id),
                    time,
                }),
                None => warn!(cell = cell_id, "Ignoring non-finite mesh seek"),
            }
        });
    }

    /// Current mesh time, `None` for cells without a mesh.
    pub fn mesh_playback_time(&self, cell_id: &str) -> Option<TimeCode> {
        self.read(|core| core.mesh(cell_id).map(MeshClock::time))
    }

    /// Mesh timeline length.
    pub fn mesh_duration(&self, cell_id: &str) -> Option<TimeCode> {
        self.read(|core| core.mesh(cell_id).map(MeshClock::duration))
    }

    /// Whether a mesh clock is running.
    pub fn is_mesh_playing(&self, cell_id: &str) -> bool {
        self.read(|core| core.mesh(cell_id).is_some_and(MeshClock::is_playing))
    }

    /// Frame the renderer should draw for a mesh cell.
    pub fn mesh_frame_index(&self, cell_id: &str) -> Option<FrameNumber> {
        self.read(|core| core.mesh(cell_id).map(MeshClock::frame_index))
    }

    /// Start a mesh clock, rewinding it first if parked at its far end.
    pub fn mesh_play(&self, cell_id: &str) {
        self.mutate(|core, events| {
            let Some(mesh) = core.mesh_mut(cell_id) else {
                return;
            };
            let cell_id = CellId::from(cell_id);
            if mesh.rewind_if_finished() {
                events.push(PlaybackEvent::MeshTimeSet {
                    cell_id: cell_id.clone(),
                    time: mesh.time(),
                });
            }
            mesh.play();
            debug!(cell = %cell_id, "Mesh playback started");
            events.push(PlaybackEvent::MeshPlay { cell_id });
        });
    }

    /// Pause a mesh clock.
    pub fn mesh_pause(&self, cell_id: &str) {
        self.mutate(|core, events| {
            let Some(mesh) = core.mesh_mut(cell_id) else {
                return;
            };
            mesh.pause();
            debug!(cell = cell_id, "Mesh playback paused");
            events.push(PlaybackEvent::MeshPause {
                cell_id: CellId::from(cell_id),
            });
        });
    }

    /// Step a mesh by whole frames at the mesh's own fps.
    pub fn mesh_advance_frame(&self, cell_id: &str, frames: i32) {
        if frames == 0 {
            return;
        }
        self.mutate(|core, events| {
            let Some(mesh) = core.mesh_mut(cell_id) else {
                return;
            };
            let cell_id = CellId::from(cell_id);
            if mesh.step_frames(frames) {
                events.push(PlaybackEvent::MeshPause {
                    cell_id: cell_id.clone(),
                });
            }
            events.push(if frames > 0 {
                PlaybackEvent::MeshFrameNext { cell_id }
            } else {
                PlaybackEvent::MeshFramePrev { cell_id }
            });
        });
    }

    /// Set a mesh's signed speed. Zero and non-finite speeds are ignored.
    pub fn set_mesh_speed(&self, cell_id: &str, speed: f64) {
        self.mutate(|core, events| {
            let Some(mesh) = core.mesh_mut(cell_id) else {
                return;
            };
            match mesh.set_speed(speed) {
                Some(change) => events.push(PlaybackEvent::MeshSpeedChanged {
                    cell_id: CellId::from(cell_id),
                    speed: change.speed,
                }),
                None => warn!(cell = cell_id, speed, "Ignoring invalid mesh speed"),
            }
        });
    }

    /// Set whether a mesh wraps at its boundaries.
    pub fn set_mesh_looping(&self, cell_id: &str, looping: bool) {
        self.mutate(|core, _| {
            if let Some(mesh) = core.mesh_mut(cell_id) {
                mesh.set_looping(looping);
            }
        });
    }

    // -- Scrubbing ----------------------------------------------------------

    /// Grab the shared scrubber: pauses and remembers whether to resume.
    pub fn begin_scrub(&self) {
        self.mutate(|core, events| core.scrub.begin(&mut core.clock, events));
    }

    /// Move the scrub position; same as `seek`.
    pub fn scrub_to(&self, time: TimeCode) {
        self.seek(time);
    }

    /// Release the shared scrubber, resuming if it was playing at the grab.
    pub fn end_scrub(&self) {
        self.mutate(|core, events| core.scrub.end(&mut core.clock, events));
    }

    /// Whether the shared scrubber is held.
    pub fn is_scrubbing(&self) -> bool {
        self.read(|core| core.scrub.is_scrubbing())
    }

    /// Grab one cell's scrubber: detaches the cell and holds its clock.
    pub fn begin_cell_scrub(&self, cell_id: &str) {
        self.mutate(|core, events| {
            core.scrub
                .begin_cell(&mut core.registry, &core.clock, cell_id, events)
        });
    }

    /// Move a scrubbed cell's local time.
    pub fn cell_scrub_to(&self, cell_id: &str, time: TimeCode) -> Option<TimeCode> {
        self.set_cell_playback_time(cell_id, time)
    }

    /// Release a cell scrubber, either staying detached or resyncing.
    pub fn end_cell_scrub(&self, cell_id: &str, release: ScrubRelease) {
        self.mutate(|core, events| {
            core.scrub
                .end_cell(&mut core.registry, &core.clock, cell_id, release, events)
        });
    }

    /// Abandon a cell scrub and snap the cell back to shared time.
    pub fn cancel_cell_scrub(&self, cell_id: &str) {
        self.end_cell_scrub(cell_id, ScrubRelease::Resync);
    }

    /// Whether a cell scrubber is held.
    pub fn is_cell_scrubbing(&self, cell_id: &str) -> bool {
        self.read(|core| core.scrub.is_cell_scrubbing(cell_id))
    }

    // -- Inspection ---------------------------------------------------------

    /// Serializable view of the whole engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.read(|core| EngineSnapshot::capture(&core.clock, &core.registry))
    }
}
