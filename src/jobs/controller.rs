//! Job lifecycle controller.
//!
//! Owns the background execution of a fetch: every job runs in its own tokio
//! task, and the only channel back to request handlers is the [`JobStore`].
//! Progress events travel from the fetcher over an mpsc channel and are
//! applied to the store in order while the fetch is still running.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::fetcher::{ChannelProgress, FetchError, FetchEvent, MediaFetcher};
use crate::server::metrics;
use crate::storage::StorageJanitor;

use super::models::{Job, JobPhase, Transition};
use super::store::JobStore;

/// How a background job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Ready,
    Failed,
    /// The job was deleted while its fetch was running.
    Orphaned,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Ready => "ready",
            JobOutcome::Failed => "error",
            JobOutcome::Orphaned => "orphaned",
        }
    }
}

/// How long after a timeout the job's artifacts are swept a second time.
/// Converter processes spawned by the fetcher can outlive it and still write.
const DEFAULT_STRAGGLER_GRACE: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct JobController {
    store: Arc<JobStore>,
    fetcher: Arc<dyn MediaFetcher>,
    janitor: Arc<StorageJanitor>,
    fetch_timeout: Duration,
    straggler_grace: Duration,
}

impl JobController {
    pub fn new(
        store: Arc<JobStore>,
        fetcher: Arc<dyn MediaFetcher>,
        janitor: Arc<StorageJanitor>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            janitor,
            fetch_timeout,
            straggler_grace: DEFAULT_STRAGGLER_GRACE,
        }
    }

    pub fn with_straggler_grace(mut self, grace: Duration) -> Self {
        self.straggler_grace = grace;
        self
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Registers a new job in `queued` and launches its fetch in the
    /// background. Returns the job id without waiting for the fetch.
    pub fn start_job(&self, source_id: &str) -> ServiceResult<String> {
        let job_id = Uuid::new_v4().to_string();
        self.store
            .create(Job::new(job_id.clone(), source_id.to_string()))?;
        info!("Queued job {} for source {}", job_id, source_id);

        let controller = self.clone();
        let id = job_id.clone();
        let source_id = source_id.to_string();
        tokio::spawn(async move {
            controller.run_job(&id, &source_id).await;
        });

        Ok(job_id)
    }

    /// Drives a queued job to completion. Never fails: every error ends up
    /// recorded on the job itself.
    pub async fn run_job(&self, job_id: &str, source_id: &str) -> JobOutcome {
        let started = Instant::now();
        metrics::record_job_started();

        let outcome = self.execute(job_id, source_id).await;

        metrics::record_job_finished(outcome.as_str(), started.elapsed());
        info!(
            "Job {} finished as {} after {:.1}s",
            job_id,
            outcome.as_str(),
            started.elapsed().as_secs_f64()
        );
        outcome
    }

    async fn execute(&self, job_id: &str, source_id: &str) -> JobOutcome {
        match self.store.update(job_id, |job| Ok(job.begin_download())) {
            Ok(Transition::Applied) => {}
            Ok(Transition::Discarded) | Err(_) => {
                debug!("Job {} is gone or no longer queued, not fetching", job_id);
                return JobOutcome::Orphaned;
            }
        }

        let stem = StorageJanitor::file_stem(job_id, source_id);
        let output_template = self.janitor.output_template(&stem);
        let (progress, events) = ChannelProgress::channel();

        // The listener is moved in so the channel closes as soon as the fetch ends.
        let fetch = async move {
            let progress = progress;
            match tokio::time::timeout(
                self.fetch_timeout,
                self.fetcher.fetch(source_id, &output_template, &progress),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(self.fetch_timeout.as_secs())),
            }
        };
        let (result, ()) = tokio::join!(fetch, self.apply_events(job_id, events));

        match result {
            Ok(path) => self.finish_ready(job_id, &stem, path).await,
            Err(err @ FetchError::Timeout(_)) => {
                let outcome = self.finish_failed(job_id, &stem, &err.to_string()).await;
                self.sweep_stragglers(job_id, stem);
                outcome
            }
            Err(err) => self.finish_failed(job_id, &stem, &err.to_string()).await,
        }
    }

    async fn apply_events(&self, job_id: &str, mut events: UnboundedReceiver<FetchEvent>) {
        while let Some(event) = events.recv().await {
            let result = self.store.update(job_id, |job| {
                Ok(match event {
                    FetchEvent::Progress {
                        downloaded_bytes,
                        total_bytes,
                    } => job.record_download_progress(downloaded_bytes, total_bytes),
                    FetchEvent::DownloadComplete => job.begin_conversion(),
                })
            });
            match (event, result) {
                (FetchEvent::DownloadComplete, Ok(Transition::Applied)) => {
                    debug!("Job {} download complete, converting", job_id)
                }
                (_, Ok(_)) => {}
                // Deleted mid-fetch: keep draining, the fetch still runs to the end.
                (_, Err(_)) => debug!("Ignoring progress for deleted job {}", job_id),
            }
        }
    }

    async fn finish_ready(&self, job_id: &str, stem: &str, path: PathBuf) -> JobOutcome {
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let detail = format!(
                "Fetcher reported {} but the file does not exist",
                path.display()
            );
            return self.finish_failed(job_id, stem, &detail).await;
        }

        let committed = self.store.update(job_id, |job| {
            // Fetchers that never report the end of the transfer skip straight here.
            if job.phase == JobPhase::Downloading {
                job.begin_conversion();
            }
            Ok(job.mark_ready(path.clone()))
        });

        match committed {
            Ok(Transition::Applied) => {
                info!("Job {} ready at {}", job_id, path.display());
                JobOutcome::Ready
            }
            Ok(Transition::Discarded) | Err(_) => {
                debug!("Job {} was deleted during its fetch, dropping output", job_id);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to remove orphaned {}: {}", path.display(), e);
                }
                JobOutcome::Orphaned
            }
        }
    }

    /// Sweeps the job's artifacts again once `straggler_grace` has passed.
    fn sweep_stragglers(&self, job_id: &str, stem: String) {
        let janitor = self.janitor.clone();
        let grace = self.straggler_grace;
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let removed = janitor.remove_job_artifacts(&stem).await;
            if removed > 0 {
                warn!(
                    "Removed {} file(s) written after job {} timed out",
                    removed, job_id
                );
            }
        });
    }

    async fn finish_failed(&self, job_id: &str, stem: &str, detail: &str) -> JobOutcome {
        // Partial files go first so an errored job never points at leftovers.
        let removed = self.janitor.remove_job_artifacts(stem).await;
        if removed > 0 {
            debug!("Removed {} partial file(s) of job {}", removed, job_id);
        }

        match self.store.update(job_id, |job| Ok(job.mark_failed(detail))) {
            Ok(_) => {
                warn!("Job {} failed: {}", job_id, detail);
                JobOutcome::Failed
            }
            Err(_) => JobOutcome::Orphaned,
        }
    }
}
