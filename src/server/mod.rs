pub mod config;
mod error_response;
mod http_layers;
mod job_routes;
pub mod metrics;
mod search;
pub mod server;
pub mod state;
mod stream_audio;
mod thumbnail_proxy;

pub use config::{default_thumbnail_hosts, ServerConfig, DEFAULT_THUMBNAIL_HOSTS};
pub use error_response::ErrorBody;
pub use http_layers::*;
pub use job_routes::{DeleteResponse, DownloadResponse};
pub use search::SearchResponse;
pub use server::{make_app, make_metrics_app, run_server, ServerStats};
