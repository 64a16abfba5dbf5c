//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, SOURCE_OK};
//! use octavia_server::jobs::JobPhase;
//!
//! #[tokio::test]
//! async fn test_job_becomes_ready() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let job_id = client.start_job(SOURCE_OK).await;
//!     client.wait_for_phase(&job_id, JobPhase::Ready).await;
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;

#[allow(unused_imports)]
pub use fixtures::fake_tracks;
