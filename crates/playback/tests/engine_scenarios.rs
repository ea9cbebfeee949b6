//! End-to-end scenarios for the playback engine.
//!
//! Each test drives a real `PlaybackEngine` through a `ManualTickSource` in
//! virtual time, with `VirtualMedia` standing in for video surfaces.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pc_common::{CellId, Rational, TimeCode};
use pc_playback::{
    ManualTickSource, MediaHandle, MeshTiming, PlaybackEngine, PlaybackEvent, ScrubRelease,
    Subscription, VirtualMedia, MAX_DISPATCH_DEPTH,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ms(value: f64) -> TimeCode {
    TimeCode::from_millis(value)
}

/// Engine with an explicit duration and a tick source already primed with a
/// zero-delta first tick.
fn primed_engine(duration_ms: f64) -> (PlaybackEngine, ManualTickSource) {
    let engine = PlaybackEngine::new();
    engine.set_duration(ms(duration_ms));
    let mut source = ManualTickSource::new();
    engine.attach_tick_source(&mut source);
    source.fire();
    (engine, source)
}

fn record_events(engine: &PlaybackEngine) -> (Rc<RefCell<Vec<PlaybackEvent>>>, Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let sub = engine.add_event_listener(move |event| sink.borrow_mut().push(event.clone()));
    (seen, sub)
}

// ---------------------------------------------------------------------------
// Shared clock
// ---------------------------------------------------------------------------

#[test]
fn looping_playback_wraps_past_the_end() {
    let (engine, mut source) = primed_engine(10_000.0);
    engine.seek(ms(9800.0));
    engine.set_speed(1.0);
    engine.set_looping(true);
    engine.play();

    source.run_for(400.0, 16.0);

    let time = engine.playback_time().as_millis();
    assert!((0.0..400.0).contains(&time), "time = {time}");
    assert!(engine.is_playing());
}

#[test]
fn non_looping_playback_stops_at_the_end() {
    let (engine, mut source) = primed_engine(1000.0);
    let (seen, _sub) = record_events(&engine);
    engine.seek(ms(900.0));
    engine.play();

    source.run_for(500.0, 16.0);

    assert_eq!(engine.playback_time(), ms(1000.0));
    assert!(!engine.is_playing());
    let pauses = seen
        .borrow()
        .iter()
        .filter(|e| **e == PlaybackEvent::Pause)
        .count();
    assert_eq!(pauses, 1);
}

#[test]
fn reverse_playback_moves_backward_with_discrete_seeks() {
    let (engine, mut source) = primed_engine(10_000.0);
    let media = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &media);
    engine.seek(ms(5000.0));
    engine.set_speed(-1.0);
    engine.play();
    assert!(engine.is_reversing());

    source.advance(100.0);
    assert_eq!(engine.playback_time(), ms(4900.0));
    assert_eq!(media.position_ms(), 4900.0);
    assert!(media.is_paused());
    assert_eq!(media.playback_rate(), 1.0);

    let seeks_before = media.seek_count();
    source.advance(100.0);
    assert_eq!(media.position_ms(), 4800.0);
    assert_eq!(media.seek_count(), seeks_before + 1);
}

#[test]
fn reverse_looping_wraps_to_the_end() {
    let (engine, mut source) = primed_engine(10_000.0);
    engine.set_looping(true);
    engine.seek(ms(50.0));
    engine.set_speed(-1.0);
    engine.play();

    source.advance(100.0);
    assert_eq!(engine.playback_time(), ms(9950.0));
    assert!(engine.is_playing());
}

#[test]
fn slow_repaint_keeps_playing_media_in_step() {
    let (engine, mut source) = primed_engine(10_000.0);
    let media = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &media);
    engine.play();
    source.advance(0.0);
    assert!(!media.is_paused());
    let seeks_before = media.seek_count();

    // 2 Hz host repaint: each tick covers 500 ms of wall time.
    for _ in 0..4 {
        media.advance(500.0);
        source.advance(500.0);
    }

    assert_eq!(engine.playback_time(), ms(2000.0));
    assert_eq!(media.position_ms(), 2000.0);
    assert_eq!(media.seek_count(), seeks_before);
    assert!(!media.is_paused());
}

#[test]
fn advance_frame_from_playing_pauses_then_steps() {
    let (engine, _source) = primed_engine(10_000.0);
    let (seen, _sub) = record_events(&engine);
    engine.seek(ms(10_000.0 - 10.0));
    engine.play();
    seen.borrow_mut().clear();

    engine.advance_frame(1);

    assert!(!engine.is_playing());
    assert_eq!(engine.playback_time(), ms(10_000.0));
    assert_eq!(
        *seen.borrow(),
        vec![PlaybackEvent::Pause, PlaybackEvent::TimeSet { time: ms(10_000.0) }]
    );
}

#[test]
fn frame_step_uses_configured_fps() {
    let config = pc_common::EngineConfig {
        fps: Rational::FPS_25,
        ..Default::default()
    };
    let engine = PlaybackEngine::with_config(config).unwrap();
    engine.set_duration(ms(1000.0));
    engine.advance_frame(3);
    assert_eq!(engine.playback_time(), ms(120.0));
    engine.advance_frame(-5);
    assert_eq!(engine.playback_time(), TimeCode::ZERO);
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

#[test]
fn independent_cell_ignores_shared_seek() {
    let (engine, mut source) = primed_engine(10_000.0);
    let a = Rc::new(VirtualMedia::new(10_000.0));
    let b = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &a);
    engine.register_video_element("b", &b);

    engine.set_independent_playback("a", true);
    engine.set_cell_playback_time("a", ms(2000.0));
    engine.seek(ms(500.0));
    source.advance(16.0);

    assert_eq!(engine.playback_time(), ms(500.0));
    assert_eq!(engine.scene_local_time("a"), Some(ms(2000.0)));
    assert_eq!(engine.scene_local_time("b"), Some(ms(500.0)));
    assert_eq!(a.position_ms(), 2000.0);
    assert_eq!(b.position_ms(), 500.0);
}

#[test]
fn resync_snaps_back_without_moving_shared_clock() {
    let (engine, mut source) = primed_engine(10_000.0);
    let a = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &a);
    engine.seek(ms(1000.0));

    engine.set_independent_playback("a", true);
    engine.set_cell_playback_time("a", ms(7000.0));
    engine.set_independent_playback("a", false);
    source.advance(16.0);

    assert_eq!(engine.playback_time(), ms(1000.0));
    assert_eq!(a.position_ms(), 1000.0);
    assert!(!engine.is_independent("a"));
}

#[test]
fn independent_cell_plays_while_shared_is_paused() {
    let (engine, mut source) = primed_engine(10_000.0);
    let a = Rc::new(VirtualMedia::new(10_000.0));
    let b = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &a);
    engine.register_video_element("b", &b);

    engine.set_independent_playback("a", true);
    assert!(engine.play_cell("a"));
    assert!(!engine.play_cell("b"));
    source.advance(100.0);

    assert_eq!(engine.playback_time(), TimeCode::ZERO);
    assert_eq!(engine.scene_local_time("a"), Some(ms(100.0)));
    assert!(!a.is_paused());
    assert!(b.is_paused());

    engine.pause_cell("a");
    source.advance(100.0);
    assert_eq!(engine.scene_local_time("a"), Some(ms(100.0)));
    assert!(a.is_paused());
}

#[test]
fn cell_frame_step_detaches_the_cell() {
    let (engine, _source) = primed_engine(10_000.0);
    let (seen, _sub) = record_events(&engine);
    let a = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &a);
    engine.seek(ms(1000.0));
    engine.play();

    let time = engine.advance_independent_cell_frame("a", 2).unwrap();

    assert!((time.as_millis() - (1000.0 + 2000.0 / 30.0)).abs() < 1e-9);
    assert!(engine.is_independent("a"));
    assert!(engine.is_playing());
    let events = seen.borrow();
    assert!(events.contains(&PlaybackEvent::CellIndependenceChanged {
        cell_id: CellId::new("a"),
        is_independent: true,
    }));
    assert_eq!(
        events.last(),
        Some(&PlaybackEvent::CellFrameNext {
            cell_id: CellId::new("a")
        })
    );
}

#[test]
fn cell_scrub_can_stay_independent() {
    let (engine, mut source) = primed_engine(10_000.0);
    let a = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &a);
    engine.play();

    engine.begin_cell_scrub("a");
    engine.cell_scrub_to("a", ms(6000.0));
    engine.end_cell_scrub("a", ScrubRelease::StayIndependent);
    source.advance(100.0);

    assert!(engine.is_independent("a"));
    assert_eq!(engine.scene_local_time("a"), Some(ms(6100.0)));
    assert_eq!(engine.playback_time(), ms(100.0));
}

#[test]
fn cell_media_duration_bounds_local_time() {
    let (engine, _source) = primed_engine(10_000.0);
    let short = Rc::new(VirtualMedia::new(3000.0));
    engine.register_video_element("short", &short);
    engine.set_independent_playback("short", true);

    assert_eq!(engine.set_cell_playback_time("short", ms(8000.0)), Some(ms(3000.0)));
    assert_eq!(engine.set_cell_playback_time("unknown", ms(10.0)), None);
}

#[test]
fn mesh_and_video_clocks_are_independent() {
    let (engine, mut source) = primed_engine(10_000.0);
    let video = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &video);
    engine.register_mesh_cell("a", MeshTiming::from_frames(10, Rational::FPS_25));
    engine.mesh_play("a");
    engine.play();

    for _ in 0..5 {
        source.advance(100.0);
    }

    assert_eq!(engine.playback_time(), ms(500.0));
    assert_eq!(engine.mesh_playback_time("a"), Some(ms(100.0)));

    engine.unregister_video_element("a");
    assert_eq!(engine.cell_ids(), vec![CellId::new("a")]);
    engine.unregister_mesh_cell("a");
    assert!(engine.cell_ids().is_empty());
}

#[test]
fn mesh_frame_step_from_playing_pauses() {
    let (engine, _source) = primed_engine(0.0);
    let (seen, _sub) = record_events(&engine);
    engine.register_mesh_cell("m", MeshTiming::from_frames(30, Rational::FPS_30));
    engine.mesh_play("m");
    seen.borrow_mut().clear();

    engine.mesh_advance_frame("m", -1);
    engine.mesh_advance_frame("m", 3);

    let m = CellId::new("m");
    assert_eq!(
        *seen.borrow(),
        vec![
            PlaybackEvent::MeshPause { cell_id: m.clone() },
            PlaybackEvent::MeshFramePrev { cell_id: m.clone() },
            PlaybackEvent::MeshFrameNext { cell_id: m },
        ]
    );
    assert_eq!(engine.mesh_frame_index("m").map(|f| f.0), Some(3));
}

#[test]
fn type_erased_handle_is_driven_like_a_concrete_one() {
    let (engine, mut source) = primed_engine(1000.0);
    let concrete = Rc::new(VirtualMedia::new(6000.0));
    let erased: Rc<dyn MediaHandle> = concrete.clone();
    engine.register_media_handle("a", Rc::downgrade(&erased));
    assert_eq!(engine.duration(), ms(6000.0));

    engine.seek(ms(2500.0));
    source.advance(16.0);
    assert_eq!(concrete.position_ms(), 2500.0);

    drop(erased);
    engine.play();
    source.advance(16.0);
    assert!(!concrete.is_paused());
}

#[test]
fn unregistering_a_missing_target_keeps_the_override() {
    let (engine, _source) = primed_engine(10_000.0);
    engine.set_independent_playback("x", true);
    engine.set_cell_playback_time("x", ms(700.0));

    engine.unregister_video_element("x");
    engine.unregister_mesh_cell("x");

    assert!(engine.is_independent("x"));
    assert_eq!(engine.scene_local_time("x"), Some(ms(700.0)));
    assert_eq!(engine.cell_ids(), vec![CellId::new("x")]);
}

// ---------------------------------------------------------------------------
// Media faults
// ---------------------------------------------------------------------------

#[test]
fn dropped_media_is_skipped() {
    let (engine, mut source) = primed_engine(10_000.0);
    let media = Rc::new(VirtualMedia::new(10_000.0));
    engine.register_video_element("a", &media);
    drop(media);
    engine.play();

    let report = engine.tick(ms(16.0));
    assert_eq!(report.detached, 1);
    source.advance(16.0);

    let snapshot = engine.snapshot();
    let cell = snapshot.cell("a").unwrap();
    assert!(cell.has_media);
    assert!(!cell.media_live);
}

#[test]
fn dropped_media_stops_extending_the_timeline() {
    let (engine, mut source) = primed_engine(1000.0);
    let media = Rc::new(VirtualMedia::new(8000.0));
    engine.register_video_element("a", &media);
    assert_eq!(engine.duration(), ms(8000.0));

    drop(media);
    source.advance(16.0);

    assert_eq!(engine.duration(), ms(1000.0));
    assert_eq!(engine.snapshot().duration_ms, 1000.0);
}

#[test]
fn rejected_autoplay_keeps_intent() {
    let (engine, mut source) = primed_engine(10_000.0);
    let media = Rc::new(VirtualMedia::new(10_000.0));
    media.set_reject_play(true);
    engine.register_video_element("a", &media);
    engine.play();

    source.advance(16.0);
    assert!(engine.is_playing());
    assert!(media.is_paused());

    media.set_reject_play(false);
    source.advance(16.0);
    assert!(!media.is_paused());
    assert!(media.play_requests() >= 2);
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

#[test]
fn panicking_listener_does_not_starve_others() {
    let engine = PlaybackEngine::new();
    let _bad = engine.add_event_listener(|event| {
        if *event == PlaybackEvent::Play {
            panic!("listener failure");
        }
    });
    let (seen, _good) = record_events(&engine);

    engine.play();
    engine.pause();

    assert_eq!(*seen.borrow(), vec![PlaybackEvent::Play, PlaybackEvent::Pause]);
}

#[test]
fn unsubscribe_during_dispatch_is_safe() {
    let engine = PlaybackEngine::new();
    let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
    let hits = Rc::new(Cell::new(0));

    let remover_slot = Rc::clone(&slot);
    let _remover = engine.add_event_listener(move |_| {
        let taken = remover_slot.borrow_mut().take();
        if let Some(sub) = taken {
            sub.unsubscribe();
        }
    });
    let counter = Rc::clone(&hits);
    *slot.borrow_mut() = Some(engine.add_event_listener(move |_| counter.set(counter.get() + 1)));

    engine.play();
    engine.pause();

    assert_eq!(hits.get(), 0);
    assert_eq!(engine.listener_count(), 1);
}

#[test]
fn listener_may_drive_the_engine() {
    let (engine, mut source) = primed_engine(1000.0);
    let weak = engine.downgrade();
    let _sub = engine.add_event_listener(move |event| {
        if *event == PlaybackEvent::Pause {
            if let Some(engine) = weak.upgrade() {
                engine.seek(TimeCode::ZERO);
            }
        }
    });
    engine.seek(ms(990.0));
    engine.play();

    source.advance(100.0);

    assert!(!engine.is_playing());
    assert_eq!(engine.playback_time(), TimeCode::ZERO);
}

#[test]
fn runaway_reentrancy_is_bounded() {
    let engine = PlaybackEngine::new();
    engine.set_duration(ms(1000.0));
    let calls = Rc::new(Cell::new(0usize));
    let weak = engine.downgrade();
    let counter = Rc::clone(&calls);
    let _sub = engine.add_event_listener(move |event| {
        if let PlaybackEvent::TimeSet { .. } = event {
            counter.set(counter.get() + 1);
            if let Some(engine) = weak.upgrade() {
                engine.seek(ms(10.0));
            }
        }
    });

    engine.seek(ms(10.0));

    assert_eq!(calls.get(), MAX_DISPATCH_DEPTH);
}

#[test]
fn dropping_the_subscription_stops_delivery() {
    let engine = PlaybackEngine::new();
    let (seen, sub) = record_events(&engine);
    engine.play();
    drop(sub);
    engine.pause();
    assert_eq!(*seen.borrow(), vec![PlaybackEvent::Play]);
    assert_eq!(engine.listener_count(), 0);
}
