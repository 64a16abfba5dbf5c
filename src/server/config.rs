use super::RequestsLoggingLevel;

/// Hosts thumbnails may be proxied from by default (YouTube image CDNs).
pub const DEFAULT_THUMBNAIL_HOSTS: &[&str] = &["ytimg.com", "ggpht.com", "googleusercontent.com"];

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub frontend_dir_path: Option<String>,
    /// Maximum number of tracks returned by a search
    pub search_limit: usize,
    /// Hosts (and their subdomains) the thumbnail proxy may fetch from; "*" allows any
    pub thumbnail_hosts: Vec<String>,
}

pub fn default_thumbnail_hosts() -> Vec<String> {
    DEFAULT_THUMBNAIL_HOSTS
        .iter()
        .map(|host| host.to_string())
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 8000,
            metrics_port: 9091,
            frontend_dir_path: None,
            search_limit: 10,
            thumbnail_hosts: default_thumbnail_hosts(),
        }
    }
}
