//! HTTP client for the multi-source music catalog API.
//!
//! The API is a single endpoint taking a `types` parameter:
//! `?types=search`, `?types=url`, `?types=pic`, `?types=lyric`.
//! Responses are JSON; ids may arrive as strings or numbers depending on the
//! upstream platform, so search results are walked as raw values.

use super::models::{Source, TopList, Track};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

/// Stream resolution failed; surfaced to the user as the player's Error state.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("catalog request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("catalog returned no stream url for {track}")]
    NoStream { track: String },
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UrlResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PicResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LyricResponse {
    lyric: Option<String>,
}

impl CatalogClient {
    const USER_AGENT: &'static str = "cadence/0.1.0";

    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build catalog http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Search the catalog. Items that cannot be mapped to a track are skipped.
    pub async fn search(
        &self,
        query: &str,
        source: Source,
        count: usize,
        page: usize,
    ) -> anyhow::Result<Vec<Track>> {
        let url = format!(
            "{}?types=search&source={}&name={}&count={}&pages={}",
            self.base_url,
            source,
            urlencoding::encode(query),
            count,
            page
        );
        let v: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("catalog search request")?
            .error_for_status()
            .context("catalog search status")?
            .json()
            .await
            .context("decode catalog search response")?;

        let items = v.as_array().cloned().unwrap_or_default();
        let tracks = items
            .iter()
            .filter_map(|item| track_from_search_item(item, source))
            .collect();
        Ok(tracks)
    }

    /// Resolve a playable stream URL for a track.
    pub async fn resolve_stream_url(&self, track: &Track) -> Result<String, ResolveError> {
        let url = format!(
            "{}?types=url&source={}&id={}&br=320",
            self.base_url,
            track.source,
            urlencoding::encode(&track.id)
        );
        let resp: UrlResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        match resp.url {
            Some(u) if !u.trim().is_empty() => Ok(u),
            _ => Err(ResolveError::NoStream {
                track: track.key().to_string(),
            }),
        }
    }

    /// Fetch cover art URL for a track. Best-effort enrichment only.
    pub async fn fetch_track_info(&self, track: &Track) -> anyhow::Result<Option<String>> {
        let pic_id = track.pic_id.as_deref().unwrap_or(&track.id);
        let url = format!(
            "{}?types=pic&source={}&id={}&size=400",
            self.base_url,
            track.source,
            urlencoding::encode(pic_id)
        );
        let resp: PicResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("catalog pic request")?
            .error_for_status()
            .context("catalog pic status")?
            .json()
            .await
            .context("decode catalog pic response")?;
        Ok(resp.url.filter(|u| !u.trim().is_empty()))
    }

    /// Fetch raw timed lyric text for a track. Empty string means no lyrics.
    ///
    /// Some deployments return `{"lyric": "..."}`; others return the LRC text
    /// directly. Accept both.
    pub async fn fetch_lyrics(&self, track: &Track) -> anyhow::Result<String> {
        let lyric_id = track.lyric_id.as_deref().unwrap_or(&track.id);
        let url = format!(
            "{}?types=lyric&source={}&id={}",
            self.base_url,
            track.source,
            urlencoding::encode(lyric_id)
        );
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .context("catalog lyric request")?
            .error_for_status()
            .context("catalog lyric status")?
            .text()
            .await
            .context("read catalog lyric response")?;

        if let Ok(resp) = serde_json::from_str::<LyricResponse>(&body) {
            return Ok(resp.lyric.unwrap_or_default());
        }
        Ok(body)
    }

    /// List the charts a source advertises. Items that cannot be mapped are
    /// skipped; an empty list means the source serves no charts.
    pub async fn fetch_top_lists(&self, source: Source) -> anyhow::Result<Vec<TopList>> {
        let url = format!("{}?types=toplist&source={}", self.base_url, source);
        let v: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("catalog toplist request")?
            .error_for_status()
            .context("catalog toplist status")?
            .json()
            .await
            .context("decode catalog toplist response")?;
        let items = v.as_array().cloned().unwrap_or_default();
        Ok(items.iter().filter_map(toplist_from_item).collect())
    }

    /// Fetch a chart's tracks. Charts resolve like playlists on the catalog
    /// side; the response is either a bare track array or wrapped in
    /// `{"playlist": {"tracks": [...]}}` depending on the source.
    pub async fn fetch_top_list_detail(
        &self,
        list_id: &str,
        source: Source,
    ) -> anyhow::Result<Vec<Track>> {
        let url = format!(
            "{}?types=playlist&source={}&id={}",
            self.base_url,
            source,
            urlencoding::encode(list_id)
        );
        let v: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("catalog playlist request")?
            .error_for_status()
            .context("catalog playlist status")?
            .json()
            .await
            .context("decode catalog playlist response")?;
        let items = v
            .as_array()
            .cloned()
            .or_else(|| {
                v.get("playlist")
                    .and_then(|p| p.get("tracks"))
                    .and_then(|t| t.as_array())
                    .cloned()
            })
            .unwrap_or_default();
        Ok(items
            .iter()
            .filter_map(|item| track_from_search_item(item, source))
            .collect())
    }
}

fn toplist_from_item(item: &Value) -> Option<TopList> {
    let id = value_to_id(item.get("id")?)?;
    let name = item.get("name")?.as_str()?.to_string();
    let update_frequency = item
        .get("updateFrequency")
        .and_then(|x| x.as_str())
        .map(str::to_string);
    let cover_url = item
        .get("picUrl")
        .and_then(|x| x.as_str())
        .map(str::to_string);
    Some(TopList {
        id,
        name,
        update_frequency,
        cover_url,
    })
}

fn track_from_search_item(item: &Value, default_source: Source) -> Option<Track> {
    let id = value_to_id(item.get("id")?)?;
    let title = item.get("name")?.as_str()?.to_string();
    let artist = match item.get("artist") {
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" / "),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let album = item
        .get("album")
        .and_then(|a| a.as_str())
        .unwrap_or_default()
        .to_string();
    let source = item
        .get("source")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_source);
    let pic_id = item.get("pic_id").and_then(value_to_id);
    let lyric_id = item.get("lyric_id").and_then(value_to_id);
    let duration_hint = item
        .get("duration")
        .and_then(|d| d.as_f64())
        .filter(|d| *d > 0.0);

    Some(Track {
        id,
        source,
        title,
        artist,
        album,
        cover_url: None,
        stream_url: None,
        duration_hint,
        pic_id,
        lyric_id,
    })
}

fn value_to_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
