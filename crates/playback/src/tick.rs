//! Tick sources: the host repaint callbacks that drive the engine.
//!
//! The engine installs exactly one driver closure into a [`TickSource`] and
//! leaves it there. The source decides when to call it and with what
//! timestamp; the engine derives the per-tick delta from consecutive
//! timestamps.

use std::thread;
use std::time::{Duration, Instant};

use pc_common::TimeCode;
use tracing::{debug, warn};

/// Closure invoked once per repaint with the host's monotonic timestamp.
pub type TickDriver = Box<dyn FnMut(TimeCode)>;

/// A host repaint scheduler.
pub trait TickSource {
    /// Register the driver. Sources hold a single driver; installing again
    /// replaces the previous one.
    fn install(&mut self, driver: TickDriver);
}

/// Tick source pumped explicitly by the caller, in virtual time.
///
/// Used by tests and the headless simulator.
#[derive(Default)]
pub struct ManualTickSource {
    driver: Option<TickDriver>,
    now: TimeCode,
    ticks: u64,
}

impl std::fmt::Debug for ManualTickSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTickSource")
            .field("installed", &self.driver.is_some())
            .field("now", &self.now)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl ManualTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.driver.is_some()
    }

    pub fn now(&self) -> TimeCode {
        self.now
    }

    /// Ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Fire one tick at the current virtual time.
    pub fn fire(&mut self) {
        let now = self.now;
        if let Some(driver) = self.driver.as_mut() {
            driver(now);
            self.ticks += 1;
        }
    }

    /// Move virtual time forward by `delta_ms` and fire one tick.
    pub fn advance(&mut self, delta_ms: f64) {
        self.now = self.now + TimeCode::from_millis(delta_ms);
        self.fire();
    }

    /// Fire ticks every `step_ms` until `total_ms` of virtual time has passed.
    /// Returns the number of ticks fired.
    pub fn run_for(&mut self, total_ms: f64, step_ms: f64) -> u64 {
        if !(step_ms > 0.0) {
            return 0;
        }
        let start = self.ticks;
        let mut elapsed = 0.0;
        while elapsed < total_ms {
            let step = step_ms.min(total_ms - elapsed);
            self.advance(step);
            elapsed += step;
        }
        self.ticks - start
    }
}

impl TickSource for ManualTickSource {
    fn install(&mut self, driver: TickDriver) {
        if self.driver.is_some() {
            warn!("Replacing an installed tick driver");
        }
        self.driver = Some(driver);
    }
}

/// Wall-clock paced tick loop on the calling thread.
///
/// Stands in for a display's repaint callback when no windowing host exists.
pub struct FixedRateTicker {
    interval: Duration,
    driver: Option<TickDriver>,
    epoch: Instant,
}

impl std::fmt::Debug for FixedRateTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedRateTicker")
            .field("interval", &self.interval)
            .field("installed", &self.driver.is_some())
            .finish()
    }
}

impl FixedRateTicker {
    /// Ticker at `hz` repaints per second (clamped to at least 1 Hz).
    pub fn new(hz: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / hz.max(1) as f64),
            epoch: Instant::now(),
            driver: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick until `duration` of wall time has passed. Returns ticks fired.
    pub fn run_for(&mut self, duration: Duration) -> u64 {
        let Some(driver) = self.driver.as_mut() else {
            warn!("FixedRateTicker run without an installed driver");
            return 0;
        };
        let start = Instant::now();
        let mut next = start;
        let mut ticks = 0;
        while start.elapsed() < duration {
            let now = TimeCode::from_secs(self.epoch.elapsed().as_secs_f64());
            driver(now);
            ticks += 1;
            next += self.interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                // Fell behind; resume cadence from here instead of bursting.
                next = now;
            }
        }
        debug!(ticks, "Fixed-rate tick loop finished");
        ticks
    }
}

impl TickSource for FixedRateTicker {
    fn install(&mut self, driver: TickDriver) {
        self.driver = Some(driver);
    }
}
