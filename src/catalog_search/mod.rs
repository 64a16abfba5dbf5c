//! Catalog search adapter.
//!
//! Translates a free-text query into a small list of [`Track`] records.

mod ytdlp_search;

pub use ytdlp_search::YtDlpSearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Failed to start search process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Search process exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Failed to parse search results: {0}")]
    Parse(String),
}

/// A search hit, as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Source id, usable with the download endpoint
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    /// Formatted as `M:SS`
    pub duration: String,
}

#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, SearchError>;
}

/// Formats a duration in seconds as `M:SS`.
pub fn format_duration(duration_secs: u64) -> String {
    format!("{}:{:02}", duration_secs / 60, duration_secs % 60)
}
