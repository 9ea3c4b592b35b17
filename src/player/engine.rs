//! Playback engine state machine.
//!
//! The engine is pure: commands and device events go in, state changes happen
//! here, and side effects come out as [`Effect`] values for the app loop to
//! execute. Async results carry the track identity they were requested for
//! and are discarded on arrival when that identity is no longer current, so
//! a fast sequence of track changes can never corrupt unrelated state.

use super::{DeviceEvent, PlayerError};
use crate::catalog::{Track, TrackKey};
use crate::queue::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

/// Side effects requested by the engine, executed by the app loop.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Resolve a stream URL for this track (tagged with its identity).
    Resolve(Track),
    /// Best-effort cover art fetch; result applied only if still current.
    Enrich(Track),
    /// Fetch lyrics for this track; the old document is discarded first.
    FetchLyrics(Track),
    /// Bind the resolved stream to the device and start playback.
    Load(String),
    Pause,
    Resume,
    /// Device-level absolute seek.
    Seek(f64),
    /// End-of-stream: ask the queue to advance. The only automatic
    /// transition not initiated by a caller.
    Advance(Direction),
}

/// Read model consumed by the session display and the lyric synchronizer.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub status: Status,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub buffering: bool,
    pub track: Option<Track>,
}

#[derive(Debug)]
pub struct Engine {
    status: Status,
    track: Option<Track>,
    position_secs: f64,
    duration_secs: f64,
    buffering: bool,
    /// Identity tag of the resolution currently in flight.
    in_flight: Option<TrackKey>,
    /// Optimistic seek target; position reports are stale until the device
    /// confirms the seek.
    seek_target: Option<f64>,
    last_error: Option<PlayerError>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            status: Status::Idle,
            track: None,
            position_secs: 0.0,
            duration_secs: 0.0,
            buffering: false,
            in_flight: None,
            seek_target: None,
            last_error: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn buffering(&self) -> bool {
        self.buffering
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn current_key(&self) -> Option<TrackKey> {
        self.track.as_ref().map(Track::key)
    }

    pub fn last_error(&self) -> Option<&PlayerError> {
        self.last_error.as_ref()
    }

    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            status: self.status,
            position_secs: self.position_secs,
            duration_secs: self.duration_secs,
            buffering: self.buffering,
            track: self.track.clone(),
        }
    }

    /// Start playing a track. Requesting the currently loaded track toggles
    /// play/pause instead of reloading, so replaying a track the user is
    /// already on never restarts it from zero.
    pub fn play(&mut self, track: Track) -> Vec<Effect> {
        if matches!(self.status, Status::Playing | Status::Paused)
            && self.track.as_ref().is_some_and(|t| t.is(&track.key()))
        {
            return self.toggle();
        }

        let mut effects = Vec::new();
        if track.cover_url.is_none() {
            effects.push(Effect::Enrich(track.clone()));
        }
        effects.push(Effect::FetchLyrics(track.clone()));
        effects.push(Effect::Resolve(track.clone()));

        self.status = Status::Loading;
        self.buffering = true;
        self.in_flight = Some(track.key());
        self.seek_target = None;
        self.last_error = None;
        // Catalog duration hint shows a total time (and bounds seeks) before
        // the device reports the real one.
        if let Some(d) = track.duration_hint {
            self.duration_secs = d;
        }
        self.track = Some(track);
        effects
    }

    /// Play/pause toggle. Valid only with a loaded track.
    pub fn toggle(&mut self) -> Vec<Effect> {
        match self.status {
            Status::Playing => {
                self.status = Status::Paused;
                vec![Effect::Pause]
            }
            Status::Paused => {
                self.status = Status::Playing;
                vec![Effect::Resume]
            }
            _ => Vec::new(),
        }
    }

    /// The device refused to resume (e.g. it is gone); revert the optimistic
    /// Playing status rather than claim falsely to be playing.
    pub fn resume_rejected(&mut self) {
        if self.status == Status::Playing {
            self.status = Status::Paused;
        }
    }

    /// Seek, clamped to `[0, duration]`. The position updates immediately;
    /// stale position reports already in flight are suppressed until the
    /// device confirms the seek.
    pub fn seek(&mut self, time_secs: f64) -> Vec<Effect> {
        if self.track.is_none() {
            return Vec::new();
        }
        let target = time_secs.clamp(0.0, self.duration_secs.max(0.0));
        self.position_secs = target;
        self.seek_target = Some(target);
        vec![Effect::Seek(target)]
    }

    /// A resolution completed. Applied only when its identity tag still
    /// matches the current track; a late result for a superseded request is
    /// discarded.
    pub fn on_resolved(&mut self, key: &TrackKey, url: &str) -> Vec<Effect> {
        if self.in_flight.as_ref() != Some(key) {
            tracing::debug!("discarding stale resolution for {key}");
            return Vec::new();
        }
        let Some(track) = self.track.as_mut().filter(|t| t.is(key)) else {
            return Vec::new();
        };
        self.in_flight = None;
        track.stream_url = Some(url.to_string());
        vec![Effect::Load(url.to_string())]
    }

    /// A resolution failed. Position and duration keep their last known
    /// values; the user can retry by re-issuing play.
    pub fn on_resolve_failed(&mut self, key: &TrackKey, error: String) {
        if self.in_flight.as_ref() != Some(key) {
            tracing::debug!("discarding stale resolution failure for {key}");
            return;
        }
        self.in_flight = None;
        self.buffering = false;
        self.status = Status::Error;
        self.last_error = Some(PlayerError::Resolution(error));
    }

    /// Cover enrichment arrived. Applied in place only when that track is
    /// still the one the player is showing; returns whether it was applied so
    /// the caller can patch the matching queue entry too.
    pub fn apply_cover(&mut self, key: &TrackKey, url: &str) -> bool {
        match self.track.as_mut().filter(|t| t.is(key)) {
            Some(track) => {
                track.cover_url = Some(url.to_string());
                true
            }
            None => {
                tracing::debug!("discarding stale cover for {key}");
                false
            }
        }
    }

    pub fn on_device(&mut self, event: DeviceEvent) -> Vec<Effect> {
        match event {
            DeviceEvent::Loaded => {
                if self.status == Status::Loading {
                    self.status = Status::Playing;
                    self.position_secs = 0.0;
                    self.buffering = false;
                    // The device's pause flag survives a stream replacement,
                    // so a track loaded while paused must be unpaused
                    // explicitly or it would sit silent in Playing forever.
                    return vec![Effect::Resume];
                }
                Vec::new()
            }
            DeviceEvent::Duration { seconds } => {
                if seconds.is_finite() && seconds > 0.0 {
                    self.duration_secs = seconds;
                }
                Vec::new()
            }
            DeviceEvent::Position { seconds } => {
                // No position updates in Error state, and none while a seek
                // is waiting for confirmation.
                if self.status != Status::Error && self.seek_target.is_none() {
                    self.position_secs = seconds;
                }
                Vec::new()
            }
            DeviceEvent::Seeked => {
                self.seek_target = None;
                Vec::new()
            }
            DeviceEvent::Playing => {
                if self.status == Status::Paused {
                    self.status = Status::Playing;
                }
                Vec::new()
            }
            DeviceEvent::Paused => {
                if self.status == Status::Playing {
                    self.status = Status::Paused;
                }
                Vec::new()
            }
            DeviceEvent::Buffering(b) => {
                self.buffering = b;
                Vec::new()
            }
            DeviceEvent::Ended => {
                if !matches!(self.status, Status::Playing | Status::Paused) {
                    return Vec::new();
                }
                // Leaving Playing/Paused means a follow-up play of the same
                // track reloads instead of toggling, so a one-entry queue
                // replays from the start.
                self.status = Status::Idle;
                self.position_secs = 0.0;
                vec![Effect::Advance(Direction::Next)]
            }
            DeviceEvent::Error(msg) => {
                self.status = Status::Error;
                self.buffering = false;
                // A seek in flight when the device dies will never confirm.
                self.seek_target = None;
                self.last_error = Some(PlayerError::Device(msg));
                // No auto-advance: a corrupt stream must not cascade into
                // skipping the rest of the queue.
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Source;

    fn make_track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            source: Source::Netease,
            title: format!("Track {id}"),
            artist: "Artist".to_string(),
            album: String::new(),
            cover_url: None,
            stream_url: None,
            duration_hint: None,
            pic_id: None,
            lyric_id: None,
        }
    }

    fn has_load(effects: &[Effect]) -> bool {
        effects.iter().any(|e| matches!(e, Effect::Load(_)))
    }

    /// Drive an engine to Playing on the given track.
    fn playing(id: &str, duration: f64) -> Engine {
        let mut e = Engine::new();
        let t = make_track(id);
        let key = t.key();
        e.play(t);
        assert!(has_load(&e.on_resolved(&key, "http://stream/x")));
        e.on_device(DeviceEvent::Loaded);
        e.on_device(DeviceEvent::Duration { seconds: duration });
        assert_eq!(e.status(), Status::Playing);
        e
    }

    #[test]
    fn play_requests_resolution_enrichment_and_lyrics() {
        let mut e = Engine::new();
        let effects = e.play(make_track("a"));
        assert_eq!(e.status(), Status::Loading);
        assert!(e.buffering());
        assert!(effects.iter().any(|x| matches!(x, Effect::Resolve(_))));
        assert!(effects.iter().any(|x| matches!(x, Effect::Enrich(_))));
        assert!(effects.iter().any(|x| matches!(x, Effect::FetchLyrics(_))));
    }

    #[test]
    fn play_with_existing_cover_skips_enrichment() {
        let mut e = Engine::new();
        let mut t = make_track("a");
        t.cover_url = Some("http://img/a.jpg".into());
        let effects = e.play(t);
        assert!(!effects.iter().any(|x| matches!(x, Effect::Enrich(_))));
    }

    #[test]
    fn play_same_track_toggles_instead_of_reloading() {
        let mut e = playing("a", 100.0);
        let effects = e.play(make_track("a"));
        assert_eq!(e.status(), Status::Paused);
        assert!(matches!(effects[..], [Effect::Pause]));

        let effects = e.play(make_track("a"));
        assert_eq!(e.status(), Status::Playing);
        assert!(matches!(effects[..], [Effect::Resume]));
    }

    #[test]
    fn late_resolution_for_superseded_track_is_discarded() {
        let mut e = Engine::new();
        let a = make_track("a");
        let b = make_track("b");
        e.play(a.clone());
        e.play(b.clone());

        // A's resolution arrives after B took over: dropped entirely.
        assert!(e.on_resolved(&a.key(), "http://stream/a").is_empty());
        assert_eq!(e.current_key(), Some(b.key()));
        assert!(e.track().unwrap().stream_url.is_none());

        let effects = e.on_resolved(&b.key(), "http://stream/b");
        assert!(has_load(&effects));
        assert_eq!(
            e.track().unwrap().stream_url.as_deref(),
            Some("http://stream/b")
        );
    }

    #[test]
    fn stale_resolution_failure_is_discarded() {
        let mut e = Engine::new();
        let a = make_track("a");
        let b = make_track("b");
        e.play(a.clone());
        e.play(b.clone());
        e.on_resolve_failed(&a.key(), "timeout".into());
        assert_eq!(e.status(), Status::Loading);
    }

    #[test]
    fn resolve_failure_enters_error_and_keeps_position() {
        let mut e = playing("a", 200.0);
        e.on_device(DeviceEvent::Position { seconds: 42.0 });

        let b = make_track("b");
        e.play(b.clone());
        e.on_resolve_failed(&b.key(), "no stream".into());

        assert_eq!(e.status(), Status::Error);
        assert!(matches!(e.last_error(), Some(PlayerError::Resolution(_))));
        // Last known values survive the failure.
        assert_eq!(e.position_secs(), 42.0);
        assert_eq!(e.duration_secs(), 200.0);
    }

    #[test]
    fn seek_clamps_to_duration() {
        let mut e = playing("a", 200.0);

        let effects = e.seek(-5.0);
        assert_eq!(e.position_secs(), 0.0);
        assert!(matches!(effects[..], [Effect::Seek(t)] if t == 0.0));

        e.on_device(DeviceEvent::Seeked);
        let effects = e.seek(9999.0);
        assert_eq!(e.position_secs(), 200.0);
        assert!(matches!(effects[..], [Effect::Seek(t)] if t == 200.0));
    }

    #[test]
    fn stale_positions_are_suppressed_until_seek_confirms() {
        let mut e = playing("a", 200.0);
        e.on_device(DeviceEvent::Position { seconds: 5.0 });

        e.seek(50.0);
        assert_eq!(e.position_secs(), 50.0);

        // In-flight report from before the seek must not win.
        e.on_device(DeviceEvent::Position { seconds: 5.2 });
        assert_eq!(e.position_secs(), 50.0);

        e.on_device(DeviceEvent::Seeked);
        e.on_device(DeviceEvent::Position { seconds: 50.3 });
        assert_eq!(e.position_secs(), 50.3);
    }

    #[test]
    fn seek_without_track_is_noop() {
        let mut e = Engine::new();
        assert!(e.seek(10.0).is_empty());
    }

    #[test]
    fn ended_advances_queue_and_allows_replay() {
        let mut e = playing("a", 100.0);
        let effects = e.on_device(DeviceEvent::Ended);
        assert!(matches!(effects[..], [Effect::Advance(Direction::Next)]));
        assert_eq!(e.status(), Status::Idle);

        // Playing the same track again now reloads rather than toggling.
        let effects = e.play(make_track("a"));
        assert_eq!(e.status(), Status::Loading);
        assert!(effects.iter().any(|x| matches!(x, Effect::Resolve(_))));
    }

    #[test]
    fn track_loaded_while_paused_resumes_the_device() {
        let mut e = playing("a", 100.0);
        e.toggle();
        assert_eq!(e.status(), Status::Paused);

        let b = make_track("b");
        e.play(b.clone());
        e.on_resolved(&b.key(), "http://stream/b");
        let effects = e.on_device(DeviceEvent::Loaded);
        assert_eq!(e.status(), Status::Playing);
        assert!(effects.iter().any(|x| matches!(x, Effect::Resume)));
    }

    #[test]
    fn duplicate_ended_is_ignored() {
        let mut e = playing("a", 100.0);
        assert_eq!(e.on_device(DeviceEvent::Ended).len(), 1);
        assert!(e.on_device(DeviceEvent::Ended).is_empty());
    }

    #[test]
    fn device_error_is_inert() {
        let mut e = playing("a", 100.0);
        e.on_device(DeviceEvent::Position { seconds: 30.0 });

        let effects = e.on_device(DeviceEvent::Error("demux failure".into()));
        assert!(effects.is_empty(), "error must not auto-advance");
        assert_eq!(e.status(), Status::Error);
        assert!(matches!(e.last_error(), Some(PlayerError::Device(_))));

        // Position updates stop in Error state.
        e.on_device(DeviceEvent::Position { seconds: 31.0 });
        assert_eq!(e.position_secs(), 30.0);

        // Ended after an error must not advance either.
        assert!(e.on_device(DeviceEvent::Ended).is_empty());
    }

    #[test]
    fn play_recovers_from_error() {
        let mut e = playing("a", 100.0);
        e.on_device(DeviceEvent::Error("gone".into()));
        e.play(make_track("b"));
        assert_eq!(e.status(), Status::Loading);
        assert!(e.last_error().is_none());
    }

    #[test]
    fn buffering_toggles_independently_of_status() {
        let mut e = playing("a", 100.0);
        assert!(!e.buffering());
        e.on_device(DeviceEvent::Buffering(true));
        assert_eq!(e.status(), Status::Playing);
        assert!(e.buffering());
        e.on_device(DeviceEvent::Buffering(false));
        assert!(!e.buffering());
    }

    #[test]
    fn rejected_resume_reverts_to_paused() {
        let mut e = playing("a", 100.0);
        e.toggle();
        assert_eq!(e.status(), Status::Paused);
        e.toggle();
        assert_eq!(e.status(), Status::Playing);
        e.resume_rejected();
        assert_eq!(e.status(), Status::Paused);
    }

    #[test]
    fn toggle_without_loaded_track_is_noop() {
        let mut e = Engine::new();
        assert!(e.toggle().is_empty());
        e.play(make_track("a"));
        // Still loading: not yet toggleable.
        assert!(e.toggle().is_empty());
    }

    #[test]
    fn stale_cover_is_discarded() {
        let mut e = playing("b", 100.0);
        let stale = make_track("a").key();
        assert!(!e.apply_cover(&stale, "http://img/a.jpg"));
        assert!(e.track().unwrap().cover_url.is_none());

        assert!(e.apply_cover(&make_track("b").key(), "http://img/b.jpg"));
        assert_eq!(
            e.track().unwrap().cover_url.as_deref(),
            Some("http://img/b.jpg")
        );
    }
}
