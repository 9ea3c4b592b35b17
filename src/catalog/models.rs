use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog platform a track was found on. Track identity is scoped by source,
/// so the same upstream id on two platforms is two different tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Netease,
    Kuwo,
    Qq,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Netease => "netease",
            Source::Kuwo => "kuwo",
            Source::Qq => "qq",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "netease" => Ok(Source::Netease),
            "kuwo" => Ok(Source::Kuwo),
            "qq" => Ok(Source::Qq),
            other => Err(format!("unknown source '{other}' (expected netease, kuwo or qq)")),
        }
    }
}

/// Stable identity of a track: `(source, id)`. Two tracks with equal keys are
/// the same logical track even if other fields differ across fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub source: Source,
    pub id: String,
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub source: Source,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Cover art URL, backfilled by enrichment when missing.
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Playable stream URL, resolved lazily.
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub duration_hint: Option<f64>,
    /// Catalog-side lookup key for cover art, when it differs from the track id.
    #[serde(default)]
    pub pic_id: Option<String>,
    /// Catalog-side lookup key for lyrics, when it differs from the track id.
    #[serde(default)]
    pub lyric_id: Option<String>,
}

impl Track {
    pub fn key(&self) -> TrackKey {
        TrackKey {
            source: self.source,
            id: self.id.clone(),
        }
    }

    pub fn is(&self, key: &TrackKey) -> bool {
        self.source == key.source && self.id == key.id
    }

    /// "Title - Artist" label used by list output and the session status line.
    pub fn label(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

/// A chart advertised by a catalog source, browsable without a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub update_frequency: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Unix seconds at creation time.
    pub create_time: i64,
    #[serde(default)]
    pub songs: Vec<Track>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_str() {
        for s in [Source::Netease, Source::Kuwo, Source::Qq] {
            assert_eq!(s.as_str().parse::<Source>(), Ok(s));
        }
        assert!("spotify".parse::<Source>().is_err());
    }

    #[test]
    fn identity_is_source_qualified() {
        let a = TrackKey { source: Source::Netease, id: "42".into() };
        let b = TrackKey { source: Source::Kuwo, id: "42".into() };
        assert_ne!(a, b);
    }
}
