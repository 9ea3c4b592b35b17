//! Playback: the engine state machine and the audio device it drives.

pub mod device;
pub mod engine;

pub use device::DeviceHandle;
pub use engine::{Effect, Engine, Status};

/// Failures that change observable player state. Everything else (enrichment,
/// lyrics) degrades silently.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlayerError {
    #[error("stream resolution failed: {0}")]
    Resolution(String),
    #[error("playback device error: {0}")]
    Device(String),
}

/// Device callbacks, serialized through the app event channel so the engine
/// sees user commands and device events in one deterministic order.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// Playable metadata is available for the loaded stream.
    Loaded,
    Position { seconds: f64 },
    Duration { seconds: f64 },
    /// Device confirmed it is playing (unpaused).
    Playing,
    /// Device confirmed it is paused.
    Paused,
    /// A seek completed; position reports are current again.
    Seeked,
    /// Rebuffering state, independent of the play/pause status.
    Buffering(bool),
    Ended,
    Error(String),
}
