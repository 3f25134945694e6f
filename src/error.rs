//! Error types for the Skitii engine

use thiserror::Error;

/// Errors raised while configuring or serializing the engine.
///
/// Ordinary session outcomes (no active session, nobody signed in) are not
/// errors and are reported as `None` by the engine instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid track catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown zone: {0} (expected low, normal or high)")]
    InvalidZone(String),

    #[error("Unknown track: {0}")]
    UnknownTrack(String),

    #[error("Session already active: {0}")]
    SessionAlreadyActive(String),
}
