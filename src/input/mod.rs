//! Keyboard input for the interactive session.

use crate::app::actions::Action;
use crate::app::events::Event;
use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEventKind};
use tokio::sync::mpsc;

/// Raw-mode guard for the session. Keys are read unbuffered; restored on drop
/// even when the loop exits through an error.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enter() -> anyhow::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

pub fn spawn_input_task(tx: mpsc::Sender<Event>) {
    tokio::task::spawn_blocking(move || {
        loop {
            if event::poll(std::time::Duration::from_millis(250)).unwrap_or(false) {
                match event::read() {
                    Ok(CtEvent::Key(k)) => {
                        if k.kind == KeyEventKind::Press
                            && tx.blocking_send(Event::Input(k)).is_err()
                        {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            if tx.is_closed() {
                break;
            }
        }
    });
}

pub fn map_key_to_action(k: crossterm::event::KeyEvent) -> Option<Action> {
    match k.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char(' ') => Some(Action::TogglePause),
        KeyCode::Char('n') => Some(Action::PlayNext),
        KeyCode::Char('p') => Some(Action::PlayPrev),
        KeyCode::Right | KeyCode::Char('l') => Some(Action::SeekForward),
        KeyCode::Left | KeyCode::Char('h') => Some(Action::SeekBack),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::VolumeUp),
        KeyCode::Char('-') => Some(Action::VolumeDown),
        KeyCode::Char('f') => Some(Action::ToggleFavorite),
        KeyCode::Char('d') => Some(Action::RemoveCurrent),
        KeyCode::Char('Q') => Some(Action::ShowQueue),
        KeyCode::Char('s') => Some(Action::ShowLyrics),
        _ => None,
    }
}
