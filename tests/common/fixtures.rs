//! Fake collaborators for end-to-end tests
//!
//! The fetcher and the catalog search are scripted by source id and query,
//! so tests never touch the network or an external executable.

use super::constants::*;
use async_trait::async_trait;
use octavia_server::catalog_search::{CatalogSearch, SearchError, Track};
use octavia_server::fetcher::{resolve_output_template, FetchError, MediaFetcher, ProgressListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;

/// Fetcher whose behavior is chosen by the source id (see constants).
pub struct ScriptedFetcher {
    gate: Arc<Notify>,
}

impl ScriptedFetcher {
    pub fn new(gate: Arc<Notify>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        source_id: &str,
        output_template: &Path,
        progress: &dyn ProgressListener,
    ) -> Result<PathBuf, FetchError> {
        let total = TEST_AUDIO_BYTES.len() as u64;

        match source_id {
            SOURCE_FAILING => {
                progress.on_progress(total / 4, Some(total));
                let partial = resolve_output_template(output_template, "webm.part");
                tokio::fs::write(&partial, &TEST_AUDIO_BYTES[..4]).await?;
                return Err(FetchError::Failed {
                    code: Some(1),
                    stderr: FAILING_SOURCE_ERROR.to_string(),
                });
            }
            SOURCE_GATED => {
                progress.on_progress(GATED_PROGRESS_PERCENT, Some(100));
                self.gate.notified().await;
            }
            _ => {}
        }

        progress.on_progress(total / 2, Some(total));
        progress.on_progress(total, Some(total));
        progress.on_download_complete();

        let path = resolve_output_template(output_template, "mp3");
        tokio::fs::write(&path, TEST_AUDIO_BYTES).await?;
        Ok(path)
    }
}

/// Catalog search over a fixed set of tracks.
pub struct FakeCatalogSearch;

pub fn fake_tracks() -> Vec<Track> {
    (1..=SEARCH_CATALOG_SIZE)
        .map(|i| Track {
            id: format!("track{}", i),
            title: format!("Song {}", i),
            artist: format!("Artist {}", i),
            thumbnail: format!("https://i.ytimg.com/vi/track{}/hq.jpg", i),
            duration: format!("{}:0{}", i, i),
        })
        .collect()
}

#[async_trait]
impl CatalogSearch for FakeCatalogSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, SearchError> {
        if query == SEARCH_FAILING_QUERY {
            return Err(SearchError::Failed {
                code: Some(1),
                stderr: "ERROR: search backend unavailable".to_string(),
            });
        }
        Ok(fake_tracks().into_iter().take(limit).collect())
    }
}
