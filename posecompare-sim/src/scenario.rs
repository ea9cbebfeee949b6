//! Headless grid scenario: virtual media cells driven in virtual time.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{ensure, Context, Result};
use pc_common::{EngineConfig, TimeCode};
use pc_playback::{EngineSnapshot, ManualTickSource, PlaybackEngine, PlaybackEvent, VirtualMedia};
use serde::Serialize;
use tracing::{debug, info};

/// Virtual repaint interval (60 Hz).
pub const TICK_INTERVAL_MS: f64 = 1000.0 / 60.0;

#[derive(Clone, Debug)]
pub struct ScenarioOptions {
    pub duration_ms: f64,
    pub cells: usize,
    /// Cells detached from the shared clock once playback starts.
    pub independent: Vec<String>,
    pub speed: f64,
    pub looping: bool,
    pub run_ms: f64,
    pub reject_autoplay: bool,
    pub record_events: bool,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            duration_ms: 10_000.0,
            cells: 4,
            independent: Vec::new(),
            speed: 1.0,
            looping: false,
            run_ms: 2_000.0,
            reject_autoplay: false,
            record_events: false,
        }
    }
}

/// Final state printed by the binary.
#[derive(Debug, Serialize)]
pub struct ScenarioOutcome {
    pub ticks: u64,
    pub snapshot: EngineSnapshot,
    #[serde(skip)]
    pub events: Vec<PlaybackEvent>,
}

pub fn cell_name(index: usize) -> String {
    format!("cell-{index}")
}

pub fn run(config: EngineConfig, options: &ScenarioOptions) -> Result<ScenarioOutcome> {
    ensure!(options.cells > 0, "a grid needs at least one cell");
    ensure!(
        options.run_ms.is_finite() && options.run_ms >= 0.0,
        "run length must be a non-negative number of milliseconds"
    );
    let names: Vec<String> = (0..options.cells).map(cell_name).collect();
    for id in &options.independent {
        ensure!(names.contains(id), "unknown independent cell {id:?}");
    }

    let engine = PlaybackEngine::with_config(config).context("invalid engine configuration")?;

    let recorded = Rc::new(RefCell::new(Vec::new()));
    let _recorder = options.record_events.then(|| {
        let sink = Rc::clone(&recorded);
        engine.add_event_listener(move |event| sink.borrow_mut().push(event.clone()))
    });

    let media: Vec<Rc<VirtualMedia>> = names
        .iter()
        .map(|name| {
            let handle = Rc::new(VirtualMedia::new(options.duration_ms));
            handle.set_reject_play(options.reject_autoplay);
            engine.register_video_element(name, &handle);
            handle
        })
        .collect();
    engine.set_duration(TimeCode::from_millis(options.duration_ms));

    engine.set_speed(options.speed);
    engine.set_looping(options.looping);
    engine.play();
    for id in &options.independent {
        engine.set_independent_playback(id, true);
    }

    let mut source = ManualTickSource::new();
    engine.attach_tick_source(&mut source);
    source.fire();

    info!(
        cells = options.cells,
        independent = options.independent.len(),
        run_ms = options.run_ms,
        "Running scenario"
    );
    let mut elapsed = 0.0;
    while elapsed < options.run_ms {
        let step = TICK_INTERVAL_MS.min(options.run_ms - elapsed);
        for handle in &media {
            handle.advance(step);
        }
        source.advance(step);
        elapsed += step;
    }
    debug!(ticks = source.ticks(), time = %engine.playback_time(), "Scenario finished");

    let events = recorded.borrow().clone();
    Ok(ScenarioOutcome {
        ticks: source.ticks(),
        snapshot: engine.snapshot(),
        events,
    })
}
