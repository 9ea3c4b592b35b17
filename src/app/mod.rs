//! Interactive session event loop.
//!
//! One mpsc channel carries keyboard input, device callbacks and network
//! completions; the loop applies each to the engine/queue/lyrics state in
//! arrival order and executes the effects the engine asks for. All state
//! mutation happens on this task.

pub mod actions;
pub mod events;

use crate::catalog::{CatalogClient, Track};
use crate::config::Config;
use crate::input;
use crate::library::Library;
use crate::lyrics::LyricTracker;
use crate::player::{DeviceEvent, DeviceHandle, Effect, Engine, Status};
use crate::queue::{Direction, Queue};
use actions::Action;
use anyhow::Context;
use events::{Event, NetEvent};
use std::collections::VecDeque;
use std::io::Write;
use tokio::sync::mpsc;

const SEEK_STEP_SECS: f64 = 10.0;
const VOLUME_STEP: u8 = 5;

pub struct App {
    cfg: Config,
    config_path: std::path::PathBuf,
    engine: Engine,
    queue: Queue,
    lyrics: LyricTracker,
    catalog: CatalogClient,
    library: Library,
    device: Option<DeviceHandle>,
    volume: u8,
    status: String,
    should_quit: bool,
}

impl App {
    pub fn new(cfg: Config, config_path: std::path::PathBuf) -> anyhow::Result<Self> {
        let catalog = CatalogClient::new(&cfg.catalog.base_url)?;
        let library = Library::open(&cfg.library_path())?;
        let volume = cfg.player.volume;
        Ok(Self {
            cfg,
            config_path,
            engine: Engine::new(),
            queue: Queue::new(),
            lyrics: LyricTracker::new(),
            catalog,
            library,
            device: None,
            volume,
            status: String::new(),
            should_quit: false,
        })
    }

    /// Run an interactive session over the given tracks, starting playback on
    /// the first one.
    pub async fn run(&mut self, initial: Vec<Track>) -> anyhow::Result<()> {
        anyhow::ensure!(!initial.is_empty(), "nothing to play");

        let (tx, mut rx) = mpsc::channel::<Event>(256);

        let _raw = input::RawModeGuard::enter().context("enter raw mode")?;
        input::spawn_input_task(tx.clone());

        let device = DeviceHandle::spawn(tx.clone(), self.cfg.player.audio_device.as_deref())
            .await
            .context("start playback device (is mpv installed?)")?;
        device.set_volume(self.volume).await?;
        self.device = Some(device);

        self.print_keys_help();

        for track in initial {
            self.queue.enqueue_if_absent(track);
        }
        let first = self.queue.tracks()[0].clone();
        let effects = self.begin_play(first);
        self.apply_effects(effects, &tx).await;
        self.draw_status();

        while let Some(ev) = rx.recv().await {
            match ev {
                Event::Input(k) => {
                    if let Some(action) = input::map_key_to_action(k) {
                        self.handle_action(action, &tx).await;
                    }
                }
                Event::Device(de) => self.handle_device(de, &tx).await,
                Event::Net(ne) => self.handle_net(ne, &tx).await,
            }
            if self.should_quit {
                break;
            }
            self.draw_status();
        }

        // Release the device before the terminal guard drops.
        self.device = None;
        println!("\r");
        self.save_state_on_quit();
        Ok(())
    }

    fn save_state_on_quit(&mut self) {
        self.cfg.player.volume = self.volume;
        if let Err(e) = crate::config::save(&self.cfg, Some(&self.config_path)) {
            tracing::warn!("failed to save config: {e:#}");
        }
    }

    /// Make `track` the queue's current entry and ask the engine to play it.
    fn begin_play(&mut self, track: Track) -> Vec<Effect> {
        self.queue.enqueue_if_absent(track.clone());
        self.queue.set_current(&track.key());
        self.status = format!("Loading {}", track.label());
        self.engine.play(track)
    }

    async fn handle_action(&mut self, action: Action, tx: &mpsc::Sender<Event>) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::TogglePause => {
                let effects = self.engine.toggle();
                self.apply_effects(effects, tx).await;
            }
            Action::PlayNext => self.advance(Direction::Next, tx).await,
            Action::PlayPrev => self.advance(Direction::Prev, tx).await,
            Action::SeekForward => {
                let effects = self.engine.seek(self.engine.position_secs() + SEEK_STEP_SECS);
                self.apply_effects(effects, tx).await;
            }
            Action::SeekBack => {
                let effects = self.engine.seek(self.engine.position_secs() - SEEK_STEP_SECS);
                self.apply_effects(effects, tx).await;
            }
            Action::VolumeUp => {
                self.volume = self.volume.saturating_add(VOLUME_STEP).min(100);
                self.push_volume().await;
            }
            Action::VolumeDown => {
                self.volume = self.volume.saturating_sub(VOLUME_STEP);
                self.push_volume().await;
            }
            Action::ToggleFavorite => {
                let Some(track) = self.engine.track().cloned() else {
                    return;
                };
                match self.library.toggle_favorite(&track) {
                    Ok(true) => self.status = format!("Favorited {}", track.label()),
                    Ok(false) => self.status = format!("Unfavorited {}", track.label()),
                    Err(e) => self.status = format!("Library error: {e:#}"),
                }
            }
            Action::RemoveCurrent => {
                if let Some(index) = self.queue.current_index()
                    && let Some(removed) = self.queue.remove(index)
                {
                    // Index repair happens inside remove; playback continues.
                    self.status = format!("Removed {} from queue", removed.label());
                }
            }
            Action::ShowQueue => self.print_queue(),
            Action::ShowLyrics => self.print_lyrics(),
        }
    }

    async fn advance(&mut self, dir: Direction, tx: &mpsc::Sender<Event>) {
        match self.queue.advance(dir) {
            Some(track) => {
                let effects = self.begin_play(track);
                self.apply_effects(effects, tx).await;
            }
            None => self.status = "Queue is empty".into(),
        }
    }

    async fn handle_device(&mut self, event: DeviceEvent, tx: &mpsc::Sender<Event>) {
        let effects = self.engine.on_device(event);
        self.apply_effects(effects, tx).await;

        if self.engine.status() == Status::Playing || self.engine.status() == Status::Paused {
            // Re-evaluated on every position update; prints only on change.
            if self.lyrics.update(self.engine.position_secs())
                && let Some(line) = self.lyrics.active_line()
            {
                self.print_line(&format!("  {}", line.text));
            }
        }
    }

    async fn handle_net(&mut self, event: NetEvent, tx: &mpsc::Sender<Event>) {
        match event {
            NetEvent::Resolved { key, url } => {
                let effects = self.engine.on_resolved(&key, &url);
                if !effects.is_empty() {
                    self.queue.patch_stream_url(&key, &url);
                }
                self.apply_effects(effects, tx).await;
            }
            NetEvent::ResolveFailed { key, error } => {
                self.engine.on_resolve_failed(&key, error);
                if let Some(e) = self.engine.last_error() {
                    self.status = format!("{e} (press n to skip)");
                }
            }
            NetEvent::CoverLoaded { key, url } => {
                // Both the playing track and its queue entry, or neither.
                if self.engine.apply_cover(&key, &url) {
                    self.queue.patch_cover(&key, &url);
                }
            }
            NetEvent::LyricsLoaded { key, lines } => {
                if self.engine.current_key().as_ref() == Some(&key) {
                    self.lyrics.set_lines(lines);
                } else {
                    tracing::debug!("discarding stale lyrics for {key}");
                }
            }
        }
    }

    /// Execute engine effects. Effects can produce follow-up effects (e.g.
    /// end-of-stream advance starts the next track), so this drains a
    /// worklist instead of recursing.
    async fn apply_effects(&mut self, effects: Vec<Effect>, tx: &mpsc::Sender<Event>) {
        let mut work: VecDeque<Effect> = effects.into();
        while let Some(effect) = work.pop_front() {
            match effect {
                Effect::Resolve(track) => self.spawn_resolve(track, tx),
                Effect::Enrich(track) => self.spawn_enrich(track, tx),
                Effect::FetchLyrics(track) => {
                    // Old document goes away before the new fetch completes.
                    self.lyrics.clear();
                    self.spawn_lyrics_fetch(track, tx);
                }
                Effect::Load(url) => {
                    if let Some(device) = &self.device
                        && let Err(e) = device.load(&url).await
                    {
                        work.extend(
                            self.engine
                                .on_device(DeviceEvent::Error(format!("load failed: {e:#}"))),
                        );
                    }
                }
                Effect::Pause => {
                    if let Some(device) = &self.device
                        && let Err(e) = device.pause().await
                    {
                        tracing::warn!("pause failed: {e:#}");
                    }
                }
                Effect::Resume => {
                    if let Some(device) = &self.device
                        && let Err(e) = device.resume().await
                    {
                        tracing::warn!("resume failed: {e:#}");
                        self.engine.resume_rejected();
                    }
                }
                Effect::Seek(t) => {
                    if let Some(device) = &self.device
                        && let Err(e) = device.seek_absolute(t).await
                    {
                        tracing::warn!("seek failed: {e:#}");
                    }
                }
                Effect::Advance(dir) => match self.queue.advance(dir) {
                    Some(track) => {
                        self.print_line(&format!("-> {}", track.label()));
                        let next = self.begin_play(track);
                        work.extend(next);
                    }
                    None => self.status = "Playback ended".into(),
                },
            }
        }
    }

    fn spawn_resolve(&self, track: Track, tx: &mpsc::Sender<Event>) {
        let catalog = self.catalog.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let key = track.key();
            let ev = match catalog.resolve_stream_url(&track).await {
                Ok(url) => NetEvent::Resolved { key, url },
                Err(e) => NetEvent::ResolveFailed {
                    key,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(Event::Net(ev)).await;
        });
    }

    fn spawn_enrich(&self, track: Track, tx: &mpsc::Sender<Event>) {
        let catalog = self.catalog.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let key = track.key();
            match catalog.fetch_track_info(&track).await {
                Ok(Some(url)) => {
                    let _ = tx.send(Event::Net(NetEvent::CoverLoaded { key, url })).await;
                }
                Ok(None) => {}
                // Enrichment failures never surface.
                Err(e) => tracing::debug!("cover fetch failed for {key}: {e:#}"),
            }
        });
    }

    fn spawn_lyrics_fetch(&self, track: Track, tx: &mpsc::Sender<Event>) {
        let catalog = self.catalog.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let key = track.key();
            let lines = crate::lyrics::fetch_lyrics(&catalog, &track).await;
            let _ = tx.send(Event::Net(NetEvent::LyricsLoaded { key, lines })).await;
        });
    }

    async fn push_volume(&mut self) {
        self.status = format!("Volume {}%", self.volume);
        if let Some(device) = &self.device {
            let _ = device.set_volume(self.volume).await;
        }
    }

    fn print_keys_help(&self) {
        self.print_line("space play/pause | n/p next/prev | h/l seek | +/- volume | f favorite | d dequeue | s/Q lyrics/queue | q quit");
    }

    fn print_queue(&self) {
        if self.queue.is_empty() {
            self.print_line("queue is empty");
            return;
        }
        self.print_line(&format!("queue ({} tracks):", self.queue.len()));
        for (i, t) in self.queue.tracks().iter().enumerate() {
            let marker = if Some(i) == self.queue.current_index() { ">" } else { " " };
            self.print_line(&format!("{marker} {:02}. {}", i + 1, t.label()));
        }
    }

    fn print_lyrics(&self) {
        if self.lyrics.lines().is_empty() {
            self.print_line("no lyrics loaded");
            return;
        }
        for (i, line) in self.lyrics.lines().iter().enumerate() {
            let marker = if Some(i) == self.lyrics.active_index() { ">" } else { " " };
            self.print_line(&format!("{marker} {}", line.text));
        }
    }

    /// Print a full line above the status line (raw mode needs explicit \r\n).
    fn print_line(&self, line: &str) {
        print!("\r\x1b[2K{line}\r\n");
        let _ = std::io::stdout().flush();
    }

    fn draw_status(&self) {
        let s = self.engine.snapshot();
        let icon = match s.status {
            Status::Idle => " ",
            Status::Loading => "~",
            Status::Playing => ">",
            Status::Paused => "|",
            Status::Error => "!",
        };
        let label = s.track.as_ref().map(Track::label).unwrap_or_default();
        let fav = if s
            .track
            .as_ref()
            .is_some_and(|t| self.library.is_favorite(&t.key()))
        {
            " *"
        } else {
            ""
        };
        let buffering = if s.buffering { " [buffering]" } else { "" };
        print!(
            "\r\x1b[2K{icon} {label}{fav}  {}/{}{buffering}  vol {}%  {}",
            format_time(s.position_secs),
            format_time(s.duration_secs),
            self.volume,
            self.status
        );
        let _ = std::io::stdout().flush();
    }
}

fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_positions() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(61.4), "1:01");
        assert_eq!(format_time(600.0), "10:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}
