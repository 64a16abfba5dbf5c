//! Audio streaming route

use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use super::error_response::bad_request;
use super::state::GuardedStreamingGateway;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamParams {
    job_id: Option<String>,
    /// Accepted for compatibility; the job's own source id names the file
    source_id: Option<String>,
}

/// Keeps the suggested filename safe inside a quoted header value.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub async fn stream_audio(
    State(gateway): State<GuardedStreamingGateway>,
    Query(params): Query<StreamParams>,
) -> Response {
    let Some(job_id) = params.job_id.filter(|id| !id.trim().is_empty()) else {
        return bad_request("jobId is required");
    };

    let stream = match gateway.open_stream(job_id.trim()).await {
        Ok(stream) => stream,
        Err(err) => return err.into_response(),
    };

    if let Some(requested) = params.source_id {
        if requested != stream.source_id {
            debug!(
                "Stream of job {} requested as {}, serving {}",
                stream.job_id, requested, stream.source_id
            );
        }
    }

    let headers = [
        (header::CONTENT_TYPE, stream.content_type().to_string()),
        (header::CONTENT_LENGTH, stream.len.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                sanitize_filename(&stream.attachment_filename())
            ),
        ),
    ];
    (headers, Body::from_stream(stream.into_byte_stream())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_filename("abc-123_x.mp3"), "abc-123_x.mp3");
        assert_eq!(sanitize_filename("a\"b c.mp3"), "a_b_c.mp3");
    }
}
