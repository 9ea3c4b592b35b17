//! Favorites and playlists, persisted as a single JSON document:
//! `{ "favorites": [Track], "playlists": [{id, name, create_time, songs}] }`.
//!
//! Every mutation writes the file back immediately; the in-memory copy is
//! authoritative for the process lifetime.

use crate::catalog::{Playlist, Track, TrackKey};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    favorites: Vec<Track>,
    #[serde(default)]
    playlists: Vec<Playlist>,
}

/// Versioned export envelope; import accepts both this and the bare file.
#[derive(Debug, Serialize, Deserialize)]
struct ExportFile {
    version: u32,
    exported_at: i64,
    #[serde(default)]
    favorites: Vec<Track>,
    #[serde(default)]
    playlists: Vec<Playlist>,
}

#[derive(Debug)]
pub struct Library {
    path: PathBuf,
    favorites: Vec<Track>,
    playlists: Vec<Playlist>,
}

impl Library {
    /// Open the library document, starting empty when the file is missing.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let data = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str::<LibraryFile>(&raw)
                .with_context(|| format!("parse {}", path.display()))?
        } else {
            LibraryFile::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            favorites: data.favorites,
            playlists: data.playlists,
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let data = LibraryFile {
            favorites: self.favorites.clone(),
            playlists: self.playlists.clone(),
        };
        let raw = serde_json::to_string_pretty(&data).context("serialize library")?;
        fs::write(&self.path, raw).with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }

    pub fn favorites(&self) -> &[Track] {
        &self.favorites
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn is_favorite(&self, key: &TrackKey) -> bool {
        self.favorites.iter().any(|t| t.is(key))
    }

    /// Add or remove a favorite; newest first. Returns whether the track is a
    /// favorite afterwards.
    pub fn toggle_favorite(&mut self, track: &Track) -> anyhow::Result<bool> {
        let key = track.key();
        let now_favorite = match self.favorites.iter().position(|t| t.is(&key)) {
            Some(i) => {
                self.favorites.remove(i);
                false
            }
            None => {
                self.favorites.insert(0, track.clone());
                true
            }
        };
        self.save()?;
        Ok(now_favorite)
    }

    /// Create an empty playlist, newest first. The id is derived from the
    /// creation timestamp.
    pub fn create_playlist(&mut self, name: &str) -> anyhow::Result<&Playlist> {
        let now = unix_seconds();
        let playlist = Playlist {
            id: format!("{}{:03}", now, self.playlists.len() % 1000),
            name: name.to_string(),
            create_time: now,
            songs: Vec::new(),
        };
        self.playlists.insert(0, playlist);
        self.save()?;
        Ok(&self.playlists[0])
    }

    pub fn delete_playlist(&mut self, id: &str) -> anyhow::Result<bool> {
        let before = self.playlists.len();
        self.playlists.retain(|p| p.id != id);
        let removed = self.playlists.len() != before;
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn playlist(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    /// Append a track to a playlist unless an entry with the same identity is
    /// already present. Returns whether it was added.
    pub fn add_to_playlist(&mut self, playlist_id: &str, track: &Track) -> anyhow::Result<bool> {
        let Some(p) = self.playlists.iter_mut().find(|p| p.id == playlist_id) else {
            anyhow::bail!("no playlist with id {playlist_id}");
        };
        if p.songs.iter().any(|t| t.is(&track.key())) {
            return Ok(false);
        }
        p.songs.push(track.clone());
        self.save()?;
        Ok(true)
    }

    pub fn remove_from_playlist(&mut self, playlist_id: &str, key: &TrackKey) -> anyhow::Result<bool> {
        let Some(p) = self.playlists.iter_mut().find(|p| p.id == playlist_id) else {
            anyhow::bail!("no playlist with id {playlist_id}");
        };
        let before = p.songs.len();
        p.songs.retain(|t| !t.is(key));
        let removed = p.songs.len() != before;
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Write a versioned backup of the whole library.
    pub fn export(&self, out: &Path) -> anyhow::Result<()> {
        let data = ExportFile {
            version: 2,
            exported_at: unix_seconds(),
            favorites: self.favorites.clone(),
            playlists: self.playlists.clone(),
        };
        let raw = serde_json::to_string_pretty(&data).context("serialize export")?;
        fs::write(out, raw).with_context(|| format!("write {}", out.display()))?;
        Ok(())
    }

    /// Replace favorites and playlists from a backup file. Unknown fields are
    /// ignored so exports from newer versions still import.
    pub fn import(&mut self, path: &Path) -> anyhow::Result<()> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let data: LibraryFile =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        self.favorites = data.favorites;
        self.playlists = data.playlists;
        self.save()
    }
}

fn unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
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

    fn temp_library(tag: &str) -> (PathBuf, Library) {
        let path = std::env::temp_dir().join(format!(
            "cadence-library-test-{tag}-{}.json",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        let lib = Library::open(&path).unwrap();
        (path, lib)
    }

    #[test]
    fn favorites_toggle_and_persist() {
        let (path, mut lib) = temp_library("fav");
        let t = make_track("a");

        assert!(lib.toggle_favorite(&t).unwrap());
        assert!(lib.is_favorite(&t.key()));

        // Reopen from disk.
        let reopened = Library::open(&path).unwrap();
        assert!(reopened.is_favorite(&t.key()));

        assert!(!lib.toggle_favorite(&t).unwrap());
        assert!(!lib.is_favorite(&t.key()));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn newest_favorite_comes_first() {
        let (path, mut lib) = temp_library("order");
        lib.toggle_favorite(&make_track("a")).unwrap();
        lib.toggle_favorite(&make_track("b")).unwrap();
        assert_eq!(lib.favorites()[0].id, "b");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn playlist_roundtrip_and_dedup() {
        let (path, mut lib) = temp_library("pl");
        let id = lib.create_playlist("road trip").unwrap().id.clone();

        assert!(lib.add_to_playlist(&id, &make_track("a")).unwrap());
        assert!(!lib.add_to_playlist(&id, &make_track("a")).unwrap());
        assert_eq!(lib.playlist(&id).unwrap().songs.len(), 1);

        assert!(lib.remove_from_playlist(&id, &make_track("a").key()).unwrap());
        assert!(lib.playlist(&id).unwrap().songs.is_empty());

        assert!(lib.delete_playlist(&id).unwrap());
        assert!(lib.playlist(&id).is_none());
        assert!(lib.add_to_playlist(&id, &make_track("b")).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn export_and_import() {
        let (path, mut lib) = temp_library("export");
        lib.toggle_favorite(&make_track("a")).unwrap();
        lib.create_playlist("mix").unwrap();

        let backup = std::env::temp_dir().join(format!(
            "cadence-library-backup-{}.json",
            std::process::id()
        ));
        lib.export(&backup).unwrap();

        let (path2, mut other) = temp_library("import");
        other.import(&backup).unwrap();
        assert!(other.is_favorite(&make_track("a").key()));
        assert_eq!(other.playlists().len(), 1);

        for p in [path, path2, backup] {
            let _ = fs::remove_file(&p);
        }
    }
}
