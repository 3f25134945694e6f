//! Skitii - adaptive biofeedback engine for music-therapy sessions
//!
//! The engine turns a stream of heart-rate-variability readings into
//! adaptive music playback and recorded therapy sessions, all driven by a
//! deterministic logical clock: signal generation → rolling window → track
//! selection → playback → session recording → export.
//!
//! ## Modules
//!
//! - **Signal**: simulated readings and the rolling window (metrics, trend, stress)
//! - **Music**: track catalog, adaptive selector and player
//! - **Session**: session recording, export documents and history

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod identity;
pub mod player;
pub mod selector;
pub mod session;
pub mod signal;
pub mod types;
pub mod window;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use catalog::TrackCatalog;
pub use config::{EngineConfig, RestartPolicy};
pub use engine::{BiofeedbackEngine, EngineBuilder, EngineSnapshot};
pub use error::EngineError;
pub use history::{InMemorySessionStore, SessionStore};
pub use identity::{IdentityProvider, PatientIdentity, StaticIdentity};
pub use selector::TrackSelector;
pub use types::{Reading, SessionExport, SessionRecord, Track, Trend, Zone};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and C ABI
pub const PRODUCER_NAME: &str = "skitii-engine";
