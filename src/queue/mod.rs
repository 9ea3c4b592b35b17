//! Play queue: ordered, identity-deduplicated tracks with a current pointer.

use crate::catalog::{Track, TrackKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    current: Option<usize>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track unless an entry with the same identity already exists.
    /// Returns true when the track was added.
    pub fn enqueue_if_absent(&mut self, track: Track) -> bool {
        if self.position_of(&track.key()).is_some() {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn position_of(&self, key: &TrackKey) -> Option<usize> {
        self.tracks.iter().position(|t| t.is(key))
    }

    /// Point the current index at the entry with this identity.
    pub fn set_current(&mut self, key: &TrackKey) -> bool {
        match self.position_of(key) {
            Some(i) => {
                self.current = Some(i);
                true
            }
            None => false,
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Move the current pointer one step with wraparound and return the new
    /// current track. The current track is located by identity, not by stored
    /// index, since entries are enriched in place. A one-entry queue yields
    /// that same entry (replay); an empty queue or unset current is a no-op.
    pub fn advance(&mut self, dir: Direction) -> Option<Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let key = self.current_track()?.key();
        let index = self.position_of(&key)?;
        let len = self.tracks.len();
        let next = match dir {
            Direction::Next => (index + 1) % len,
            Direction::Prev => (index + len - 1) % len,
        };
        self.current = Some(next);
        self.tracks.get(next).cloned()
    }

    /// Remove the entry at `index`, repairing the current pointer: entries
    /// before it shift down; removing the current entry clamps the pointer
    /// into bounds, or invalidates it when the queue empties.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let removed = self.tracks.remove(index);
        if let Some(current) = self.current {
            if index < current {
                self.current = Some(current - 1);
            } else if index == current {
                if self.tracks.is_empty() {
                    self.current = None;
                } else if current >= self.tracks.len() {
                    self.current = Some(self.tracks.len() - 1);
                }
            }
        }
        Some(removed)
    }

    /// Backfill a resolved stream URL onto the matching entry.
    pub fn patch_stream_url(&mut self, key: &TrackKey, url: &str) {
        if let Some(i) = self.position_of(key) {
            self.tracks[i].stream_url = Some(url.to_string());
        }
    }

    /// Backfill enrichment results onto the matching entry.
    pub fn patch_cover(&mut self, key: &TrackKey, url: &str) {
        if let Some(i) = self.position_of(key) {
            self.tracks[i].cover_url = Some(url.to_string());
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
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

    fn filled(ids: &[&str]) -> Queue {
        let mut q = Queue::new();
        for id in ids {
            q.enqueue_if_absent(make_track(id));
        }
        q
    }

    #[test]
    fn enqueue_deduplicates_by_identity() {
        let mut q = Queue::new();
        assert!(q.enqueue_if_absent(make_track("a")));
        assert!(!q.enqueue_if_absent(make_track("a")));
        assert_eq!(q.len(), 1);

        // Same id, different source: distinct identity.
        let mut other = make_track("a");
        other.source = Source::Kuwo;
        assert!(q.enqueue_if_absent(other));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn advance_wraps_both_ways() {
        let mut q = filled(&["a", "b", "c"]);
        q.set_current(&make_track("b").key());

        assert_eq!(q.advance(Direction::Next).unwrap().id, "c");
        assert_eq!(q.advance(Direction::Next).unwrap().id, "a");
        assert_eq!(q.advance(Direction::Prev).unwrap().id, "c");
    }

    #[test]
    fn single_entry_replays() {
        let mut q = filled(&["a"]);
        q.set_current(&make_track("a").key());
        assert_eq!(q.advance(Direction::Next).unwrap().id, "a");
        assert_eq!(q.advance(Direction::Prev).unwrap().id, "a");
    }

    #[test]
    fn advance_without_current_is_noop() {
        let mut q = filled(&["a", "b"]);
        assert!(q.advance(Direction::Next).is_none());
        assert!(Queue::new().advance(Direction::Prev).is_none());
    }

    #[test]
    fn remove_before_current_shifts_pointer() {
        let mut q = filled(&["a", "b", "c"]);
        q.set_current(&make_track("b").key());
        q.remove(0);
        assert_eq!(q.current_track().unwrap().id, "b");
    }

    #[test]
    fn remove_current_clamps_or_invalidates() {
        let mut q = filled(&["a", "b", "c"]);
        q.set_current(&make_track("c").key());
        q.remove(2);
        // Clamped to the last remaining entry.
        assert_eq!(q.current_track().unwrap().id, "b");

        q.remove(1);
        q.remove(0);
        assert!(q.current_index().is_none());
        assert!(q.advance(Direction::Next).is_none());
    }

    #[test]
    fn patch_cover_hits_matching_entry_only() {
        let mut q = filled(&["a", "b"]);
        q.patch_cover(&make_track("b").key(), "http://img/b.jpg");
        assert!(q.tracks()[0].cover_url.is_none());
        assert_eq!(q.tracks()[1].cover_url.as_deref(), Some("http://img/b.jpg"));
    }
}
