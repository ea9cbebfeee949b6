//! Central error types for the playback engine (thiserror-based).
//!
//! None of these are fatal to a running engine: media errors are swallowed at
//! the reconciler boundary and only configuration errors reach the caller.

use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Global playback engine already initialized")]
    AlreadyInitialized,
}

/// Errors reported by a host media backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// `play()` was refused, typically by an autoplay policy.
    #[error("Play request rejected: {0}")]
    PlayRejected(String),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Convenience Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
