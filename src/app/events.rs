use crate::catalog::TrackKey;
use crate::lyrics::LyricLine;
use crate::player::DeviceEvent;

/// Everything the app loop reacts to. User input, device callbacks and
/// network completions are serialized through one channel so state
/// transitions happen in a single deterministic order.
#[derive(Debug, Clone)]
pub enum Event {
    Input(crossterm::event::KeyEvent),
    Device(DeviceEvent),
    Net(NetEvent),
}

/// Async completions. Each carries the identity of the track it was requested
/// for; handlers re-validate that identity on arrival before touching state.
#[derive(Debug, Clone)]
pub enum NetEvent {
    Resolved { key: TrackKey, url: String },
    ResolveFailed { key: TrackKey, error: String },
    CoverLoaded { key: TrackKey, url: String },
    LyricsLoaded { key: TrackKey, lines: Vec<LyricLine> },
}
