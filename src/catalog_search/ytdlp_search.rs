//! Catalog search through `yt-dlp --flat-playlist --dump-single-json`.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{format_duration, CatalogSearch, SearchError, Track};

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_TITLE: &str = "Unknown Title";
const PLACEHOLDER_THUMBNAIL: &str = "/placeholder.svg?height=64&width=64";

/// yt-dlp playlist JSON, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct SearchPlaylist {
    #[serde(default)]
    entries: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    thumbnails: Vec<SearchThumbnail>,
}

#[derive(Debug, Deserialize)]
struct SearchThumbnail {
    url: String,
}

impl SearchEntry {
    fn into_track(self) -> Option<Track> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(Track {
            id,
            title: self.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            artist: self
                .channel
                .or(self.uploader)
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            // yt-dlp lists thumbnails from smallest to largest
            thumbnail: self
                .thumbnails
                .into_iter()
                .last()
                .map(|t| t.url)
                .unwrap_or_else(|| PLACEHOLDER_THUMBNAIL.to_string()),
            duration: format_duration(
                self.duration
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .map(|d| d as u64)
                    .unwrap_or(0),
            ),
        })
    }
}

pub struct YtDlpSearch {
    binary: PathBuf,
    cookies_file: Option<PathBuf>,
}

impl YtDlpSearch {
    pub fn new(binary: PathBuf, cookies_file: Option<PathBuf>) -> Self {
        Self {
            binary,
            cookies_file,
        }
    }
}

#[async_trait]
impl CatalogSearch for YtDlpSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, SearchError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--flat-playlist", "--dump-single-json", "--no-warnings"]);
        if let Some(cookies) = &self.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        let output = cmd
            .arg(format!("ytsearch{}:{}", limit, query))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(SearchError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SearchError::Failed {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        let tracks = parse_search_output(&output.stdout, limit)?;
        debug!("Search {:?} returned {} tracks", query, tracks.len());
        Ok(tracks)
    }
}

fn parse_search_output(stdout: &[u8], limit: usize) -> Result<Vec<Track>, SearchError> {
    let playlist: SearchPlaylist =
        serde_json::from_slice(stdout).map_err(|e| SearchError::Parse(e.to_string()))?;
    Ok(playlist
        .entries
        .into_iter()
        .filter_map(SearchEntry::into_track)
        .take(limit)
        .collect())
}
