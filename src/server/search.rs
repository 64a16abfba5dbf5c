//! Search API routes

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error_response::bad_request;
use super::metrics::record_search;
use super::state::{GuardedCatalogSearch, ServerState};
use super::ServerConfig;
use crate::catalog_search::Track;
use crate::error::ServiceError;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<Track>,
}

async fn search(
    State(config): State<ServerConfig>,
    State(catalog_search): State<GuardedCatalogSearch>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(query) = params
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
    else {
        record_search("rejected");
        return bad_request("Query parameter 'q' is required");
    };

    match catalog_search.search(&query, config.search_limit).await {
        Ok(results) => {
            record_search("ok");
            Json(SearchResponse { results }).into_response()
        }
        Err(err) => {
            record_search("error");
            ServiceError::from(err).into_response()
        }
    }
}

pub fn make_search_routes(state: ServerState) -> Router {
    Router::new()
        .route("/search", get(search))
        .with_state(state)
}
