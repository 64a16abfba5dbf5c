//! Job submission, polling and deletion routes

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error_response::bad_request;
use super::state::{GuardedJobStore, GuardedStorageJanitor, ServerState};
use crate::jobs::JobController;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct DownloadBody {
    source_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub job_id: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct JobIdParams {
    job_id: Option<String>,
}

impl JobIdParams {
    fn job_id(self) -> Option<String> {
        self.job_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub detail: String,
}

/// Unwraps a JSON body, turning a missing or malformed one into a 400 `{detail}`.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            debug!("Rejected request body: {}", rejection.body_text());
            Err(bad_request(format!(
                "Invalid request body: {}",
                rejection.body_text()
            )))
        }
    }
}

async fn start_download(
    State(controller): State<JobController>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(source_id) = body
        .source_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        return bad_request("sourceId is required");
    };

    match controller.start_job(&source_id) {
        Ok(job_id) => Json(DownloadResponse { job_id }).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_progress(
    State(store): State<GuardedJobStore>,
    Query(params): Query<JobIdParams>,
) -> Response {
    let Some(job_id) = params.job_id() else {
        return bad_request("jobId is required");
    };

    match store.get(&job_id) {
        Ok(job) => Json(job.snapshot()).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn delete_audio(
    State(store): State<GuardedJobStore>,
    State(janitor): State<GuardedStorageJanitor>,
    body: Result<Json<JobIdParams>, JsonRejection>,
) -> Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(job_id) = body.job_id() else {
        return bad_request("jobId is required");
    };

    match janitor.delete_job(&store, &job_id).await {
        Ok(()) => {
            debug!("Audio of job {} deleted on request", job_id);
            Json(DeleteResponse {
                detail: format!("Job {} deleted", job_id),
            })
            .into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub fn make_job_routes(state: ServerState) -> Router {
    Router::new()
        .route("/download", post(start_download))
        .route("/progress", get(get_progress))
        .route("/delete_audio", delete(delete_audio))
        .with_state(state)
}
