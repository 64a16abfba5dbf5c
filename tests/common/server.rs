//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own temp directory and job store.

use super::constants::*;
use super::fixtures::{FakeCatalogSearch, ScriptedFetcher};
use octavia_server::jobs::{JobController, JobStore};
use octavia_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use octavia_server::storage::StorageJanitor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Test server instance with an isolated temp directory
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Job store for direct state inspection in tests
    pub job_store: Arc<JobStore>,

    /// Storage janitor bound to the server's temp directory
    pub janitor: Arc<StorageJanitor>,

    // Private fields - keep resources alive until drop
    gate: Arc<Notify>,
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with an empty temp directory
    pub async fn spawn() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self::spawn_in(temp_dir).await
    }

    /// Spawns a test server over an existing temp directory
    ///
    /// Runs the boot cleanup first, exactly as the binary does.
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - The boot cleanup fails
    /// - Port binding fails
    /// - Server doesn't become ready within timeout
    pub async fn spawn_in(temp_dir: TempDir) -> Self {
        let janitor = Arc::new(StorageJanitor::new(temp_dir.path()));
        janitor
            .clean_on_boot()
            .await
            .expect("Failed to clean temp dir on boot");

        let gate = Arc::new(Notify::new());
        let job_store = Arc::new(JobStore::new());
        let controller = JobController::new(
            job_store.clone(),
            Arc::new(ScriptedFetcher::new(gate.clone())),
            janitor.clone(),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            search_limit: TEST_SEARCH_LIMIT,
            thumbnail_hosts: vec![TEST_THUMBNAIL_HOST.to_string()],
            ..Default::default()
        };

        let app = make_app(
            config,
            controller,
            janitor.clone(),
            Arc::new(FakeCatalogSearch),
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            job_store,
            janitor,
            gate,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    pub fn temp_dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Files currently present in the temp directory
    pub fn temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp_dir())
            .expect("Failed to list temp dir")
            .map(|entry| entry.expect("Failed to read dir entry").path())
            .collect()
    }

    /// Lets the (single) pending fetch of `SOURCE_GATED` complete
    pub fn release_gated_fetch(&self) {
        self.gate.notify_one();
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
