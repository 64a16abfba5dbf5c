use axum::extract::FromRef;

use crate::catalog_search::CatalogSearch;
use crate::jobs::{JobController, JobStore};
use crate::storage::StorageJanitor;
use crate::streaming::StreamingGateway;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedJobStore = Arc<JobStore>;
pub type GuardedStreamingGateway = Arc<StreamingGateway>;
pub type GuardedStorageJanitor = Arc<StorageJanitor>;
pub type GuardedCatalogSearch = Arc<dyn CatalogSearch>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub job_store: GuardedJobStore,
    pub job_controller: JobController,
    pub streaming_gateway: GuardedStreamingGateway,
    pub storage_janitor: GuardedStorageJanitor,
    pub catalog_search: GuardedCatalogSearch,
    pub http_client: reqwest::Client,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedJobStore {
    fn from_ref(input: &ServerState) -> Self {
        input.job_store.clone()
    }
}

impl FromRef<ServerState> for JobController {
    fn from_ref(input: &ServerState) -> Self {
        input.job_controller.clone()
    }
}

impl FromRef<ServerState> for GuardedStreamingGateway {
    fn from_ref(input: &ServerState) -> Self {
        input.streaming_gateway.clone()
    }
}

impl FromRef<ServerState> for GuardedStorageJanitor {
    fn from_ref(input: &ServerState) -> Self {
        input.storage_janitor.clone()
    }
}

impl FromRef<ServerState> for GuardedCatalogSearch {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_search.clone()
    }
}

impl FromRef<ServerState> for reqwest::Client {
    fn from_ref(input: &ServerState) -> Self {
        input.http_client.clone()
    }
}
