mod file_config;

pub use file_config::{FetcherConfig, FileConfig, SearchConfig};

use crate::fetcher::YtDlpSettings;
use crate::server::{default_thumbnail_hosts, RequestsLoggingLevel};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// Audio codecs yt-dlp can extract to.
pub const SUPPORTED_AUDIO_FORMATS: &[&str] = &["mp3", "m4a", "opus", "vorbis", "flac", "wav", "aac"];

pub const MAX_SEARCH_LIMIT: usize = 50;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub temp_dir: PathBuf,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub yt_dlp_path: PathBuf,
    pub audio_format: String,
    pub audio_quality: String,
    pub cookies_file: Option<PathBuf>,
    pub fetch_timeout_sec: u64,
    pub search_limit: usize,
    /// Empty means the built-in thumbnail hosts
    pub thumbnail_hosts: Vec<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            metrics_port: 9091,
            temp_dir: PathBuf::from("./temp"),
            logging_level: RequestsLoggingLevel::default(),
            frontend_dir_path: None,
            yt_dlp_path: PathBuf::from("yt-dlp"),
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            cookies_file: None,
            fetch_timeout_sec: 600,
            search_limit: 10,
            thumbnail_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub metrics_port: u16,
    pub temp_dir: PathBuf,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Collaborator settings
    pub fetcher: FetcherSettings,
    pub search_limit: usize,
    pub thumbnail_hosts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub yt_dlp_path: PathBuf,
    pub audio_format: String,
    pub audio_quality: String,
    pub cookies_file: Option<PathBuf>,
    pub timeout_sec: u64,
}

impl FetcherSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    pub fn ytdlp_settings(&self) -> YtDlpSettings {
        YtDlpSettings {
            binary: self.yt_dlp_path.clone(),
            audio_format: self.audio_format.clone(),
            audio_quality: self.audio_quality.clone(),
            cookies_file: self.cookies_file.clone(),
            ..Default::default()
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port {
            bail!("port and metrics_port must differ (both are {})", port);
        }

        let temp_dir = file
            .temp_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.temp_dir.clone());
        if temp_dir.exists() && !temp_dir.is_dir() {
            bail!("temp_dir is not a directory: {:?}", temp_dir);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let fetcher_file = file.fetcher.unwrap_or_default();
        let fetcher = FetcherSettings {
            yt_dlp_path: fetcher_file
                .yt_dlp_path
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.yt_dlp_path.clone()),
            audio_format: fetcher_file
                .audio_format
                .unwrap_or_else(|| cli.audio_format.clone())
                .to_lowercase(),
            audio_quality: fetcher_file
                .audio_quality
                .unwrap_or_else(|| cli.audio_quality.clone()),
            cookies_file: fetcher_file
                .cookies_file
                .map(PathBuf::from)
                .or_else(|| cli.cookies_file.clone()),
            timeout_sec: fetcher_file.timeout_sec.unwrap_or(cli.fetch_timeout_sec),
        };

        if !SUPPORTED_AUDIO_FORMATS.contains(&fetcher.audio_format.as_str()) {
            bail!(
                "Unsupported audio format {:?}, expected one of: {}",
                fetcher.audio_format,
                SUPPORTED_AUDIO_FORMATS.join(", ")
            );
        }
        if fetcher.timeout_sec == 0 {
            bail!("Fetch timeout must be at least one second");
        }
        if let Some(cookies) = &fetcher.cookies_file {
            if !cookies.is_file() {
                bail!("Cookies file not found: {:?}", cookies);
            }
        }

        let search_file = file.search.unwrap_or_default();
        let search_limit = search_file.limit.unwrap_or(cli.search_limit);
        if !(1..=MAX_SEARCH_LIMIT).contains(&search_limit) {
            bail!(
                "Search limit must be between 1 and {}, got {}",
                MAX_SEARCH_LIMIT,
                search_limit
            );
        }

        let thumbnail_hosts = match search_file.thumbnail_hosts {
            Some(hosts) => hosts,
            None if cli.thumbnail_hosts.is_empty() => default_thumbnail_hosts(),
            None => cli.thumbnail_hosts.clone(),
        };
        if thumbnail_hosts.iter().any(|host| host.trim().is_empty()) {
            bail!("Thumbnail hosts must not be blank");
        }

        Ok(Self {
            port,
            metrics_port,
            temp_dir,
            logging_level,
            frontend_dir_path,
            fetcher,
            search_limit,
            thumbnail_hosts,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
