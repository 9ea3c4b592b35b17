//! LRC format parser
//!
//! Parses synchronized lyrics in LRC format:
//! [mm:ss.xx] Lyrics line here
//!
//! A line may carry several leading time tags; each tag yields one entry
//! sharing the line's text. Lines without a valid time tag are dropped.

/// A single timestamped lyric line.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// Seconds from the start of the track.
    pub time_secs: f64,
    pub text: String,
}

impl LyricLine {
    pub fn new(time_secs: f64, text: impl Into<String>) -> Self {
        Self {
            time_secs,
            text: text.into(),
        }
    }
}

/// Shown when a track has no usable lyrics.
pub const NO_LYRICS_TEXT: &str = "No lyrics available";

/// The single line callers substitute for an empty parse result.
pub fn placeholder() -> Vec<LyricLine> {
    vec![LyricLine::new(0.0, NO_LYRICS_TEXT)]
}

/// Parse raw LRC text into timestamped lines, in source order.
///
/// Empty or tag-free input yields an empty vec; callers treat that as
/// "no lyrics available" and substitute [`placeholder`].
pub fn parse_lrc(raw: &str) -> Vec<LyricLine> {
    let mut out = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (times, rest) = leading_time_tags(line);
        if times.is_empty() {
            continue;
        }
        let text = rest.trim();
        if text.is_empty() {
            continue;
        }
        for t in times {
            out.push(LyricLine::new(t, text));
        }
    }
    out
}

/// Strip all leading `[mm:ss.xx]` tags, returning their times and the rest of
/// the line. Stops at the first bracket pair that is not a time tag, so
/// metadata tags like `[ti:Title]` leave the line untagged.
fn leading_time_tags(line: &str) -> (Vec<f64>, &str) {
    let mut times = Vec::new();
    let mut rest = line;
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(end) = inner.find(']') else { break };
        let Some(t) = parse_time_tag(&inner[..end]) else {
            break;
        };
        times.push(t);
        rest = &inner[end + 1..];
    }
    (times, rest)
}

/// Parse `mm:ss.xx` (2- or 3-digit fraction) into seconds.
///
/// The fraction is divided by 1000 regardless of digit count, so 2-digit
/// hundredths are scaled as if they were thousandths. This matches the
/// upstream catalog's lyric timing and must not be changed independently.
fn parse_time_tag(s: &str) -> Option<f64> {
    let (mins, rest) = s.split_once(':')?;
    let (secs, frac) = rest.split_once('.')?;
    if !(2..=3).contains(&frac.len()) {
        return None;
    }
    if !all_ascii_digits(mins) || !all_ascii_digits(secs) || !all_ascii_digits(frac) {
        return None;
    }
    let mins: u32 = mins.parse().ok()?;
    let secs: u32 = secs.parse().ok()?;
    let frac: u32 = frac.parse().ok()?;
    Some(f64::from(mins) * 60.0 + f64::from(secs) + f64::from(frac) / 1000.0)
}

fn all_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
