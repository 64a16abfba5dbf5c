//! Media fetcher: retrieves a track and transcodes it to a local audio file.
//!
//! The fetcher reports byte-level progress through a [`ProgressListener`]
//! and is otherwise opaque to the job lifecycle.

mod progress;
mod ytdlp;

pub use progress::{ChannelProgress, FetchEvent};
pub use ytdlp::{YtDlpFetcher, YtDlpSettings};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder for the output file extension inside an output template.
pub const EXT_PLACEHOLDER: &str = "%(ext)s";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to start fetcher process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetcher exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Fetcher did not produce an output file: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Fetch timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid source id: {0:?}")]
    InvalidSource(String),
}

/// Receives progress events from a running fetch.
pub trait ProgressListener: Send + Sync {
    /// Bytes transferred so far. `total_bytes` is `None` when the size is unknown.
    fn on_progress(&self, downloaded_bytes: u64, total_bytes: Option<u64>);

    /// The transfer is complete and transcoding is starting.
    fn on_download_complete(&self);
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetches `source_id` and transcodes it to audio.
    ///
    /// `output_template` is a path whose file name contains [`EXT_PLACEHOLDER`];
    /// the fetcher substitutes the real extension and returns the final path.
    async fn fetch(
        &self,
        source_id: &str,
        output_template: &Path,
        progress: &dyn ProgressListener,
    ) -> Result<PathBuf, FetchError>;
}

/// Resolves an output template for a known extension.
pub fn resolve_output_template(output_template: &Path, extension: &str) -> PathBuf {
    PathBuf::from(
        output_template
            .to_string_lossy()
            .replace(EXT_PLACEHOLDER, extension),
    )
}
