//! Active-line selection for synchronized lyrics.
//!
//! A line is active over `[line[i].time, line[i+1].time)`; the last line's
//! interval extends to the end of the track. The tracker only reports a
//! change when the active index actually moves, so consumers can scroll or
//! reprint on every position update without jitter.

use super::parser::LyricLine;

/// Index of the active line at `position_secs`, or `None` when the position
/// is before the first timestamp or the sequence is empty.
///
/// A linear scan over the interval predicate rather than a binary search:
/// timestamps are non-decreasing as authored, but the scan stays correct for
/// sequences that violate that.
pub fn active_index_at(lines: &[LyricLine], position_secs: f64) -> Option<usize> {
    for (i, line) in lines.iter().enumerate() {
        let next = lines.get(i + 1);
        if position_secs >= line.time_secs
            && next.is_none_or(|n| position_secs < n.time_secs)
        {
            return Some(i);
        }
    }
    None
}

/// Holds the lyric document for the currently displayed track and remembers
/// the last emitted active index.
#[derive(Debug, Default)]
pub struct LyricTracker {
    lines: Vec<LyricLine>,
    active: Option<usize>,
}

impl LyricTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the document wholesale (track change). Resets the remembered
    /// index so the first update after a swap always emits.
    pub fn set_lines(&mut self, lines: Vec<LyricLine>) {
        self.lines = lines;
        self.active = None;
    }

    /// Drop the document. Called when a track change is initiated, before the
    /// new lyrics arrive, so old lines are never matched against the new
    /// track's position.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.active = None;
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_line(&self) -> Option<&LyricLine> {
        self.active.and_then(|i| self.lines.get(i))
    }

    /// Recompute the active line for a new position. Returns true when the
    /// active index changed since the last emission.
    pub fn update(&mut self, position_secs: f64) -> bool {
        let computed = active_index_at(&self.lines, position_secs);
        if computed == self.active {
            return false;
        }
        self.active = computed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq() -> Vec<LyricLine> {
        vec![
            LyricLine::new(1.0, "one"),
            LyricLine::new(3.0, "three"),
            LyricLine::new(10.0, "ten"),
        ]
    }

    #[test]
    fn selects_interval_containing_position() {
        let lines = seq();
        assert_eq!(active_index_at(&lines, 1.0), Some(0));
        assert_eq!(active_index_at(&lines, 2.9), Some(0));
        assert_eq!(active_index_at(&lines, 3.0), Some(1));
        assert_eq!(active_index_at(&lines, 4.0), Some(1));
        assert_eq!(active_index_at(&lines, 10.0), Some(2));
    }

    #[test]
    fn last_line_extends_to_infinity() {
        assert_eq!(active_index_at(&seq(), 9001.0), Some(2));
    }

    #[test]
    fn none_before_first_or_empty() {
        assert_eq!(active_index_at(&seq(), 0.5), None);
        assert_eq!(active_index_at(&[], 5.0), None);
    }

    #[test]
    fn update_emits_only_on_change() {
        let mut tracker = LyricTracker::new();
        tracker.set_lines(seq());

        assert!(tracker.update(1.5));
        assert_eq!(tracker.active_index(), Some(0));
        // Many updates inside the same interval: no re-emission.
        assert!(!tracker.update(1.6));
        assert!(!tracker.update(2.9));
        assert!(tracker.update(3.1));
        assert_eq!(tracker.active_index(), Some(1));
    }

    #[test]
    fn seek_before_first_line_clears_active() {
        let mut tracker = LyricTracker::new();
        tracker.set_lines(seq());
        assert!(tracker.update(5.0));
        assert!(tracker.update(0.2));
        assert_eq!(tracker.active_index(), None);
        assert!(!tracker.update(0.3));
    }

    #[test]
    fn track_change_resets_remembered_index() {
        let mut tracker = LyricTracker::new();
        tracker.set_lines(seq());
        assert!(tracker.update(1.5));

        tracker.clear();
        assert_eq!(tracker.active_index(), None);
        assert!(tracker.lines().is_empty());

        tracker.set_lines(vec![LyricLine::new(1.0, "new")]);
        // Same position as before the swap still emits for the new document.
        assert!(tracker.update(1.5));
        assert_eq!(tracker.active_line().map(|l| l.text.as_str()), Some("new"));
    }

    #[test]
    fn tolerates_non_monotonic_timestamps() {
        let lines = vec![
            LyricLine::new(10.0, "late"),
            LyricLine::new(2.0, "early"),
        ];
        // First line whose interval contains the position wins.
        assert_eq!(active_index_at(&lines, 5.0), Some(1));
        assert_eq!(active_index_at(&lines, 1.0), None);
    }
}
