//! Per-thread default engine.
//!
//! Hosts that cannot thread a [`PlaybackEngine`] through their component
//! tree use this; everything else should receive a handle explicitly.
//!
//! The engine handle is `Rc`-based and not `Send`, so there is no
//! process-wide instance: each thread that asks gets its own engine, and
//! engines on different threads never see each other's state. Call these
//! from the thread that owns the host's repaint loop.

use std::cell::OnceCell;

use pc_common::{EngineConfig, SyncError, SyncResult};
use tracing::info;

use crate::engine::PlaybackEngine;

thread_local! {
    static GLOBAL: OnceCell<PlaybackEngine> = const { OnceCell::new() };
}

/// The calling thread's engine, created with the default configuration on
/// first use. Other threads get separate engines.
pub fn global_playback_engine() -> PlaybackEngine {
    GLOBAL.with(|cell| {
        cell.get_or_init(|| {
            info!("Creating default playback engine");
            PlaybackEngine::new()
        })
        .clone()
    })
}

/// Create the thread's engine with `config`. Fails if one already exists,
/// including one created lazily by [`global_playback_engine`].
pub fn init_global_playback_engine(config: EngineConfig) -> SyncResult<PlaybackEngine> {
    GLOBAL.with(|cell| {
        if cell.get().is_some() {
            return Err(SyncError::AlreadyInitialized);
        }
        let engine = PlaybackEngine::with_config(config)?;
        info!(fps = %engine.config().fps, "Playback engine initialized");
        cell.set(engine.clone())
            .map_err(|_| SyncError::AlreadyInitialized)?;
        Ok(engine)
    })
}
