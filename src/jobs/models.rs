//! Job data model and phase transition rules.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle phase of a fetch-and-convert job.
///
/// ```text
/// queued -> downloading -> converting -> ready -> consumed
///    \__________\_______________\
///                                -> error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Queued,
    Downloading,
    Converting,
    Ready,
    Consumed, // terminal
    Error,    // terminal
}

impl JobPhase {
    /// Returns true if no further transitions are accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Consumed | JobPhase::Error)
    }

    pub fn can_transition_to(&self, next: JobPhase) -> bool {
        matches!(
            (self, next),
            (JobPhase::Queued, JobPhase::Downloading)
                | (JobPhase::Downloading, JobPhase::Converting)
                | (JobPhase::Converting, JobPhase::Ready)
                | (JobPhase::Ready, JobPhase::Consumed)
                | (
                    JobPhase::Queued | JobPhase::Downloading | JobPhase::Converting,
                    JobPhase::Error
                )
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Queued => "queued",
            JobPhase::Downloading => "downloading",
            JobPhase::Converting => "converting",
            JobPhase::Ready => "ready",
            JobPhase::Consumed => "consumed",
            JobPhase::Error => "error",
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of feeding an event into a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The event did not fit the current phase (late or out of order) and was dropped.
    Discarded,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

const UNKNOWN_ERROR_DETAIL: &str = "Unknown error";

/// A tracked fetch-and-convert request and its resulting file.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Opaque unique token (UUID v4)
    pub id: String,
    /// External catalog key of the track being fetched
    pub source_id: String,
    pub phase: JobPhase,
    /// 0-100, meaningful only while downloading or converting
    pub progress_percent: u8,
    /// Set if and only if phase is Ready or Consumed
    pub file_path: Option<PathBuf>,
    /// Set only in the Error phase
    pub error_detail: Option<String>,
    /// Creation time (Unix timestamp)
    pub created_at: i64,
}

impl Job {
    pub fn new(id: String, source_id: String) -> Self {
        Self {
            id,
            source_id,
            phase: JobPhase::Queued,
            progress_percent: 0,
            file_path: None,
            error_detail: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    fn advance(&mut self, next: JobPhase) -> Transition {
        if self.phase.can_transition_to(next) {
            self.phase = next;
            Transition::Applied
        } else {
            Transition::Discarded
        }
    }

    pub fn begin_download(&mut self) -> Transition {
        let transition = self.advance(JobPhase::Downloading);
        if transition.is_applied() {
            self.progress_percent = 0;
        }
        transition
    }

    /// Applies a byte-level progress report. The percentage never moves
    /// backwards and stays put when the total size is unknown.
    pub fn record_download_progress(
        &mut self,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    ) -> Transition {
        if self.phase != JobPhase::Downloading {
            return Transition::Discarded;
        }
        if let Some(percent) = progress_percent(downloaded_bytes, total_bytes) {
            self.progress_percent = self.progress_percent.max(percent);
        }
        Transition::Applied
    }

    pub fn begin_conversion(&mut self) -> Transition {
        let transition = self.advance(JobPhase::Converting);
        if transition.is_applied() {
            self.progress_percent = 0;
        }
        transition
    }

    pub fn mark_ready(&mut self, file_path: PathBuf) -> Transition {
        let transition = self.advance(JobPhase::Ready);
        if transition.is_applied() {
            self.progress_percent = 100;
            self.file_path = Some(file_path);
        }
        transition
    }

    pub fn mark_failed(&mut self, detail: &str) -> Transition {
        let transition = self.advance(JobPhase::Error);
        if transition.is_applied() {
            let detail = detail.trim();
            self.progress_percent = 0;
            self.file_path = None;
            self.error_detail = Some(if detail.is_empty() {
                UNKNOWN_ERROR_DETAIL.to_string()
            } else {
                detail.to_string()
            });
        }
        transition
    }

    pub fn consume(&mut self) -> Transition {
        self.advance(JobPhase::Consumed)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            phase: self.phase,
            progress_percent: self.progress_percent,
            source_id: self.source_id.clone(),
            error_detail: self.error_detail.clone(),
        }
    }
}

/// Client-facing view of a job, as returned by the progress endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    pub phase: JobPhase,
    pub progress_percent: u8,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// `floor(downloaded / total * 100)`, capped at 100. `None` when the total is unknown or zero.
pub fn progress_percent(downloaded_bytes: u64, total_bytes: Option<u64>) -> Option<u8> {
    let total = total_bytes.filter(|t| *t > 0)?;
    let percent = (downloaded_bytes as u128 * 100) / total as u128;
    Some(percent.min(100) as u8)
}
