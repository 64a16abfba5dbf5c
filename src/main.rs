use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use octavia_server::catalog_search::{CatalogSearch, YtDlpSearch};
use octavia_server::config;
use octavia_server::fetcher::{MediaFetcher, YtDlpFetcher};
use octavia_server::jobs::{JobController, JobStore};
use octavia_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use octavia_server::storage::StorageJanitor;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Error resolving path {}: {}", s, e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[command(version, about = "Fetch, stream and discard music tracks on demand")]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// Directory where fetched audio is kept until deleted. Wiped on start and stop.
    #[clap(long, value_parser = parse_path, default_value = "./temp")]
    pub temp_dir: PathBuf,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Path or name of the yt-dlp executable.
    #[clap(long, default_value = "yt-dlp")]
    pub yt_dlp_path: PathBuf,

    /// Audio format fetched tracks are converted to.
    #[clap(long, default_value = "mp3")]
    pub audio_format: String,

    /// Audio quality passed to the converter (e.g. "192K", or "0" for best VBR).
    #[clap(long, default_value = "192K")]
    pub audio_quality: String,

    /// Netscape cookies file passed to yt-dlp.
    #[clap(long, value_parser = parse_path)]
    pub cookies_file: Option<PathBuf>,

    /// Maximum duration of a single fetch, in seconds.
    #[clap(long, default_value_t = 600)]
    pub fetch_timeout_sec: u64,

    /// Maximum number of search results.
    #[clap(long, default_value_t = 10)]
    pub search_limit: usize,

    /// Host the thumbnail proxy may fetch from (subdomains included). Repeatable;
    /// "*" allows any host. Defaults to the YouTube image CDNs.
    #[clap(long = "thumbnail-host")]
    pub thumbnail_hosts: Vec<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            metrics_port: args.metrics_port,
            temp_dir: args.temp_dir.clone(),
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            yt_dlp_path: args.yt_dlp_path.clone(),
            audio_format: args.audio_format.clone(),
            audio_quality: args.audio_quality.clone(),
            cookies_file: args.cookies_file.clone(),
            fetch_timeout_sec: args.fetch_timeout_sec,
            search_limit: args.search_limit,
            thumbnail_hosts: args.thumbnail_hosts.clone(),
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  temp_dir: {:?}", app_config.temp_dir);
    info!("  port: {}", app_config.port);
    info!("  yt-dlp: {:?}", app_config.fetcher.yt_dlp_path);
    info!(
        "  audio: {} @ {}",
        app_config.fetcher.audio_format, app_config.fetcher.audio_quality
    );

    info!("Initializing metrics...");
    metrics::init_metrics();

    let janitor = Arc::new(StorageJanitor::new(&app_config.temp_dir));
    janitor
        .clean_on_boot()
        .await
        .context("Failed to prepare temp directory")?;

    let fetcher: Arc<dyn MediaFetcher> =
        Arc::new(YtDlpFetcher::new(app_config.fetcher.ytdlp_settings()));
    let catalog_search: Arc<dyn CatalogSearch> = Arc::new(YtDlpSearch::new(
        app_config.fetcher.yt_dlp_path.clone(),
        app_config.fetcher.cookies_file.clone(),
    ));
    let job_controller = JobController::new(
        Arc::new(JobStore::new()),
        fetcher,
        janitor.clone(),
        app_config.fetcher.timeout(),
    );

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        search_limit: app_config.search_limit,
        thumbnail_hosts: app_config.thumbnail_hosts.clone(),
    };

    let result = run_server(
        server_config,
        job_controller,
        janitor.clone(),
        catalog_search,
        shutdown_signal(),
    )
    .await;
    info!("HTTP server stopped: {:?}", result);

    if let Err(e) = janitor.clean_on_shutdown().await {
        warn!("Failed to clean temp directory on shutdown: {}", e);
    }

    result
}
