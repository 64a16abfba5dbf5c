use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, middleware, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

use super::job_routes::make_job_routes;
use super::metrics::metrics_handler;
use super::search::make_search_routes;
use super::state::ServerState;
use super::stream_audio::stream_audio;
use super::thumbnail_proxy::{is_host_allowed, thumbnail_proxy};
use super::{log_requests, ServerConfig};
use crate::catalog_search::CatalogSearch;
use crate::jobs::JobController;
use crate::storage::StorageJanitor;
use crate::streaming::StreamingGateway;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_UPSTREAM_REDIRECTS: usize = 5;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub active_jobs: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_jobs: state.job_store.count_in_flight(),
    };
    Json(stats)
}

impl ServerState {
    fn new(
        config: ServerConfig,
        job_controller: JobController,
        storage_janitor: Arc<StorageJanitor>,
        catalog_search: Arc<dyn CatalogSearch>,
    ) -> Result<ServerState> {
        let job_store = job_controller.store().clone();
        let allowed_hosts = config.thumbnail_hosts.clone();
        let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_UPSTREAM_REDIRECTS {
                attempt.stop()
            } else if is_host_allowed(attempt.url(), &allowed_hosts) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });
        let http_client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .redirect(redirect_policy)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ServerState {
            config,
            start_time: Instant::now(),
            streaming_gateway: Arc::new(StreamingGateway::new(job_store.clone())),
            job_store,
            job_controller,
            storage_janitor,
            catalog_search,
            http_client,
        })
    }
}

pub fn make_app(
    config: ServerConfig,
    job_controller: JobController,
    storage_janitor: Arc<StorageJanitor>,
    catalog_search: Arc<dyn CatalogSearch>,
) -> Result<Router> {
    let state = ServerState::new(
        config.clone(),
        job_controller,
        storage_janitor,
        catalog_search,
    )?;

    let media_routes: Router = Router::new()
        .route("/stream", get(stream_audio))
        .route("/thumbnail-proxy", get(thumbnail_proxy))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .merge(make_job_routes(state.clone()))
        .merge(make_search_routes(state.clone()))
        .merge(media_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(CorsLayer::permissive());

    Ok(app)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the API until `shutdown` resolves, with metrics on their own port.
pub async fn run_server<F>(
    config: ServerConfig,
    job_controller: JobController,
    storage_janitor: Arc<StorageJanitor>,
    catalog_search: Arc<dyn CatalogSearch>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, job_controller, storage_janitor, catalog_search)?;

    let metrics_listener = tokio::net::TcpListener::bind(("0.0.0.0", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}
