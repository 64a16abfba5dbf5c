//! Octavia Server Library
//!
//! Search a music catalog, fetch a track to a temporary audio file in the
//! background, poll its progress, stream it once and delete it.
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog_search;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod jobs;
pub mod server;
pub mod storage;
pub mod streaming;

// Re-export commonly used types for convenience
pub use catalog_search::{CatalogSearch, Track, YtDlpSearch};
pub use error::{ServiceError, ServiceResult};
pub use fetcher::{MediaFetcher, YtDlpFetcher};
pub use jobs::{JobController, JobPhase, JobSnapshot, JobStore};
pub use server::{run_server, RequestsLoggingLevel};
pub use storage::StorageJanitor;
pub use streaming::StreamingGateway;
