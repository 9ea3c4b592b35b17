//! Fetching, parsing and time-synchronizing lyrics.

pub mod parser;
pub mod sync;

pub use parser::{LyricLine, parse_lrc, placeholder};
pub use sync::LyricTracker;

use crate::catalog::{CatalogClient, Track};

/// Fetch and parse lyrics for a track. Failures are silent: any error or an
/// empty document degrades to the placeholder line, never to an error the
/// player would surface.
pub async fn fetch_lyrics(client: &CatalogClient, track: &Track) -> Vec<LyricLine> {
    match client.fetch_lyrics(track).await {
        Ok(raw) => {
            let lines = parse_lrc(&raw);
            if lines.is_empty() { placeholder() } else { lines }
        }
        Err(e) => {
            tracing::debug!("lyrics fetch failed for {}: {e:#}", track.key());
            placeholder()
        }
    }
}
