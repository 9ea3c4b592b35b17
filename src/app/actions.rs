/// User commands available during an interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    TogglePause,
    PlayNext,
    PlayPrev,
    SeekForward,
    SeekBack,
    VolumeUp,
    VolumeDown,
    ToggleFavorite,
    /// Drop the current entry from the queue without stopping playback.
    RemoveCurrent,
    ShowQueue,
    ShowLyrics,
}
