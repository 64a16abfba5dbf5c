//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use octavia_server::jobs::{JobPhase, JobSnapshot};
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(self.url("/"))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// GET /search?q=<query>
    pub async fn search(&self, query: &str) -> Response {
        self.client
            .get(self.url("/search"))
            .query(&[("q", query)])
            .send()
            .await
            .expect("Search request failed")
    }

    /// GET /search without a query parameter
    pub async fn search_without_query(&self) -> Response {
        self.client
            .get(self.url("/search"))
            .send()
            .await
            .expect("Search request failed")
    }

    /// GET /thumbnail-proxy?url=<url>
    pub async fn thumbnail_proxy(&self, url: &str) -> Response {
        self.client
            .get(self.url("/thumbnail-proxy"))
            .query(&[("url", url)])
            .send()
            .await
            .expect("Thumbnail proxy request failed")
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// POST /download with an arbitrary JSON body
    pub async fn download_raw(&self, body: Value) -> Response {
        self.client
            .post(self.url("/download"))
            .json(&body)
            .send()
            .await
            .expect("Download request failed")
    }

    /// POST /download with no body at all
    pub async fn download_without_body(&self) -> Response {
        self.client
            .post(self.url("/download"))
            .send()
            .await
            .expect("Download request failed")
    }

    /// POST /download {sourceId}
    pub async fn download(&self, source_id: &str) -> Response {
        self.download_raw(json!({ "sourceId": source_id })).await
    }

    /// Starts a download and returns its job id
    ///
    /// # Panics
    ///
    /// Panics if the server does not accept the download.
    pub async fn start_job(&self, source_id: &str) -> String {
        let response = self.download(source_id).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("Invalid download response");
        body["jobId"]
            .as_str()
            .expect("Download response without jobId")
            .to_string()
    }

    /// GET /progress?jobId=<id>
    pub async fn progress(&self, job_id: &str) -> Response {
        self.client
            .get(self.url("/progress"))
            .query(&[("jobId", job_id)])
            .send()
            .await
            .expect("Progress request failed")
    }

    /// Current snapshot of a job that is expected to exist
    pub async fn snapshot(&self, job_id: &str) -> JobSnapshot {
        let response = self.progress(job_id).await;
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.expect("Invalid progress response")
    }

    /// Polls the job until it reaches `phase`, returning every snapshot seen
    ///
    /// # Panics
    ///
    /// Panics if the phase is not reached within `JOB_WAIT_TIMEOUT_MS`.
    pub async fn wait_for_phase(&self, job_id: &str, phase: JobPhase) -> Vec<JobSnapshot> {
        let start = std::time::Instant::now();
        let mut seen = Vec::new();
        loop {
            let snapshot = self.snapshot(job_id).await;
            let reached = snapshot.phase == phase;
            seen.push(snapshot);
            if reached {
                return seen;
            }
            if start.elapsed() > Duration::from_millis(JOB_WAIT_TIMEOUT_MS) {
                panic!("Job {} never reached {}, seen: {:?}", job_id, phase, seen);
            }
            tokio::time::sleep(Duration::from_millis(JOB_POLL_INTERVAL_MS)).await;
        }
    }

    /// GET /stream?jobId=<id>&sourceId=<source>
    pub async fn stream(&self, job_id: &str, source_id: &str) -> Response {
        self.client
            .get(self.url("/stream"))
            .query(&[("jobId", job_id), ("sourceId", source_id)])
            .send()
            .await
            .expect("Stream request failed")
    }

    /// DELETE /delete_audio with an arbitrary JSON body
    pub async fn delete_audio_raw(&self, body: Value) -> Response {
        self.client
            .delete(self.url("/delete_audio"))
            .json(&body)
            .send()
            .await
            .expect("Delete request failed")
    }

    /// DELETE /delete_audio with no body at all
    pub async fn delete_audio_without_body(&self) -> Response {
        self.client
            .delete(self.url("/delete_audio"))
            .send()
            .await
            .expect("Delete request failed")
    }

    /// DELETE /delete_audio {jobId}
    pub async fn delete_audio(&self, job_id: &str) -> Response {
        self.delete_audio_raw(json!({ "jobId": job_id })).await
    }
}
