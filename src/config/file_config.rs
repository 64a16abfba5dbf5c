use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub temp_dir: Option<String>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Collaborator configs
    pub fetcher: Option<FetcherConfig>,
    pub search: Option<SearchConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FetcherConfig {
    pub yt_dlp_path: Option<String>,
    pub audio_format: Option<String>,
    pub audio_quality: Option<String>,
    pub cookies_file: Option<String>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results returned per query
    pub limit: Option<usize>,
    /// Hosts the thumbnail proxy may fetch result thumbnails from
    pub thumbnail_hosts: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
