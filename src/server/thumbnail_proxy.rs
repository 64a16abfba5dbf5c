//! Relays search result thumbnails so browsers only ever talk to this server.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use super::error_response::{bad_request, error_response};
use super::ServerConfig;

/// Upper bound on a relayed thumbnail.
pub const MAX_THUMBNAIL_BYTES: usize = 5 * 1024 * 1024;

/// Host entry that lets any host through.
pub const ANY_HOST: &str = "*";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ThumbnailParams {
    url: Option<String>,
}

fn parse_upstream_url(raw: Option<String>) -> Option<Url> {
    let url = Url::parse(raw?.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// True if the URL's host is one of `allowed_hosts` or a subdomain of one.
pub fn is_host_allowed(url: &Url, allowed_hosts: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    allowed_hosts.iter().any(|allowed| {
        allowed == ANY_HOST
            || host.eq_ignore_ascii_case(allowed)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", allowed.to_ascii_lowercase()))
    })
}

/// Upstream content type when it names an image, otherwise sniffed from the bytes.
fn resolve_content_type(upstream: Option<&str>, bytes: &[u8]) -> String {
    if let Some(content_type) = upstream.filter(|ct| ct.starts_with("image/")) {
        return content_type.to_string();
    }
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

enum ReadError {
    TooLarge,
    Transfer(reqwest::Error),
}

/// Collects the upstream body, giving up as soon as it exceeds `limit`.
async fn read_capped(upstream: reqwest::Response, limit: usize) -> Result<Vec<u8>, ReadError> {
    if upstream
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(ReadError::TooLarge);
    }

    let mut body = Vec::new();
    let mut chunks = upstream.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(ReadError::Transfer)?;
        if body.len() + chunk.len() > limit {
            return Err(ReadError::TooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

pub async fn thumbnail_proxy(
    State(config): State<ServerConfig>,
    State(client): State<reqwest::Client>,
    Query(params): Query<ThumbnailParams>,
) -> Response {
    let Some(url) = parse_upstream_url(params.url) else {
        return bad_request("Query parameter 'url' must be an http(s) URL");
    };
    if !is_host_allowed(&url, &config.thumbnail_hosts) {
        debug!("Refusing thumbnail from {}", url);
        return error_response(
            StatusCode::FORBIDDEN,
            format!("Host {} is not an allowed thumbnail source", url.host_str().unwrap_or("")),
        );
    }
    debug!("Proxying thumbnail {}", url);

    let upstream = match client.get(url.clone()).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            warn!("Thumbnail {} answered {}", url, response.status());
            return error_response(
                StatusCode::BAD_GATEWAY,
                format!("Upstream answered {}", response.status()),
            );
        }
        Err(err) => {
            warn!("Failed to fetch thumbnail {}: {}", url, err);
            return error_response(StatusCode::BAD_GATEWAY, "Failed to fetch thumbnail");
        }
    };

    let upstream_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = match read_capped(upstream, MAX_THUMBNAIL_BYTES).await {
        Ok(bytes) => bytes,
        Err(ReadError::TooLarge) => {
            warn!("Thumbnail {} exceeds {} bytes", url, MAX_THUMBNAIL_BYTES);
            return error_response(StatusCode::BAD_GATEWAY, "Thumbnail too large");
        }
        Err(ReadError::Transfer(err)) => {
            warn!("Failed to read thumbnail {}: {}", url, err);
            return error_response(StatusCode::BAD_GATEWAY, "Failed to read thumbnail");
        }
    };

    let content_type = resolve_content_type(upstream_type.as_deref(), &bytes);
    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn accepts_only_http_urls() {
        assert!(parse_upstream_url(Some("https://i.ytimg.com/vi/a/hq.jpg".into())).is_some());
        assert!(parse_upstream_url(Some("http://example.com/a.png".into())).is_some());
        assert!(parse_upstream_url(Some("ftp://example.com/a.png".into())).is_none());
        assert!(parse_upstream_url(Some("file:///etc/passwd".into())).is_none());
        assert!(parse_upstream_url(Some("not a url".into())).is_none());
        assert!(parse_upstream_url(None).is_none());
    }

    #[test]
    fn allows_listed_hosts_and_their_subdomains() {
        let allowed = hosts(&["ytimg.com", "googleusercontent.com"]);
        assert!(is_host_allowed(&url("https://i.ytimg.com/vi/a/hq.jpg"), &allowed));
        assert!(is_host_allowed(&url("https://ytimg.com/a.jpg"), &allowed));
        assert!(is_host_allowed(&url("https://lh3.googleusercontent.com/x"), &allowed));
        assert!(is_host_allowed(&url("https://I.YTIMG.COM/a.jpg"), &allowed));
    }

    #[test]
    fn refuses_other_hosts() {
        let allowed = hosts(&["ytimg.com"]);
        assert!(!is_host_allowed(&url("http://127.0.0.1/a.jpg"), &allowed));
        assert!(!is_host_allowed(&url("http://169.254.169.254/latest/meta-data"), &allowed));
        assert!(!is_host_allowed(&url("http://localhost:9091/metrics"), &allowed));
        assert!(!is_host_allowed(&url("https://evilytimg.com/a.jpg"), &allowed));
        assert!(!is_host_allowed(&url("https://ytimg.com.evil.net/a.jpg"), &allowed));
        assert!(!is_host_allowed(&url("https://i.ytimg.com/a.jpg"), &[]));
    }

    #[test]
    fn wildcard_allows_any_host() {
        let allowed = hosts(&[ANY_HOST]);
        assert!(is_host_allowed(&url("http://127.0.0.1:8080/a.jpg"), &allowed));
    }

    fn upstream(body: Vec<u8>) -> reqwest::Response {
        reqwest::Response::from(axum::http::Response::new(body))
    }

    #[tokio::test]
    async fn reads_bodies_up_to_the_limit() {
        let body = read_capped(upstream(vec![7u8; 16]), 16).await.ok();
        assert_eq!(body, Some(vec![7u8; 16]));
    }

    #[tokio::test]
    async fn refuses_bodies_over_the_limit() {
        let result = read_capped(upstream(vec![7u8; 17]), 16).await;
        assert!(matches!(result, Err(ReadError::TooLarge)));
    }

    #[test]
    fn prefers_upstream_image_type() {
        assert_eq!(
            resolve_content_type(Some("image/webp"), PNG_HEADER),
            "image/webp"
        );
    }

    #[test]
    fn sniffs_when_upstream_type_is_missing_or_generic() {
        assert_eq!(resolve_content_type(None, PNG_HEADER), "image/png");
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), PNG_HEADER),
            "image/png"
        );
        assert_eq!(
            resolve_content_type(None, b"plain"),
            "application/octet-stream"
        );
    }
}
