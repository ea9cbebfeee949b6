//! `pc-common` -- Shared types, errors, and configuration for the pose-compare
//! playback engine.
//!
//! - **Types**: `TimeCode` (milliseconds), `FrameNumber`, `Rational`, `CellId`
//! - **Errors**: `SyncError`, `MediaError`, `ConfigError` (thiserror-based)
//! - **Config**: `EngineConfig` (serde, loadable from TOML)

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items at crate root
pub use config::EngineConfig;
pub use error::{ConfigError, MediaError, SyncError, SyncResult};
pub use types::{CellId, FrameNumber, Rational, TimeCode};
