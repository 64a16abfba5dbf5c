//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When fake collaborator behavior changes, update only this file.

// ============================================================================
// Source IDs understood by the fake fetcher
// ============================================================================

/// Fetched immediately and successfully
pub const SOURCE_OK: &str = "abc123";

/// Another successful source, for tests running several jobs
pub const SOURCE_OK_2: &str = "def456";

/// Fails mid-download after leaving a partial file behind
pub const SOURCE_FAILING: &str = "broken-src";

/// Reports some progress, then blocks until `TestServer::release_gated_fetch`
pub const SOURCE_GATED: &str = "gated-src";

/// Progress reported by the gated source before it blocks
pub const GATED_PROGRESS_PERCENT: u64 = 25;

/// Error message produced by the failing source
pub const FAILING_SOURCE_ERROR: &str = "ERROR: unable to download video data";

// ============================================================================
// Fake audio and search data
// ============================================================================

/// Bytes written by the fake fetcher for every successful job
pub const TEST_AUDIO_BYTES: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00fake mp3 frames for tests";

/// Query that makes the fake catalog search fail
pub const SEARCH_FAILING_QUERY: &str = "explode";

/// Number of tracks the fake catalog search knows about
pub const SEARCH_CATALOG_SIZE: usize = 3;

/// Result limit configured on the test server
pub const TEST_SEARCH_LIMIT: usize = 2;

/// Only host the test server's thumbnail proxy may fetch from
pub const TEST_THUMBNAIL_HOST: &str = "127.0.0.1";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Maximum time to wait for a job to reach a phase (milliseconds)
pub const JOB_WAIT_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for a job phase (milliseconds)
pub const JOB_POLL_INTERVAL_MS: u64 = 10;
