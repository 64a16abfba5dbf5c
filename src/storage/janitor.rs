//! Storage janitor: owns the temp directory where fetched audio lands.
//!
//! The directory is wiped on boot (leftovers of a previous run), wiped and
//! recreated on shutdown, and individual job files are deleted on demand.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::fetcher::EXT_PLACEHOLDER;
use crate::jobs::JobStore;

pub struct StorageJanitor {
    temp_dir: PathBuf,
}

impl StorageJanitor {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// File name stem for a job's output. Derived from the job id so that two
    /// jobs for the same source never share a file.
    pub fn file_stem(job_id: &str, source_id: &str) -> String {
        let source: String = source_id
            .chars()
            .take(64)
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}", source, job_id)
    }

    /// Output template handed to the fetcher for the given stem.
    pub fn output_template(&self, stem: &str) -> PathBuf {
        self.temp_dir.join(format!("{}.{}", stem, EXT_PLACEHOLDER))
    }

    /// Removes every file left in the temp directory, creating it if needed.
    /// Returns the number of files removed.
    pub async fn clean_on_boot(&self) -> ServiceResult<usize> {
        fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| ServiceError::storage(&self.temp_dir, e))?;

        let removed = self.remove_files_matching(|_| true).await?;
        if removed > 0 {
            info!(
                "Removed {} leftover file(s) from {}",
                removed,
                self.temp_dir.display()
            );
        }
        Ok(removed)
    }

    /// Removes the whole temp directory and recreates it empty.
    pub async fn clean_on_shutdown(&self) -> ServiceResult<()> {
        match fs::remove_dir_all(&self.temp_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(ServiceError::storage(&self.temp_dir, e)),
        }
        fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| ServiceError::storage(&self.temp_dir, e))?;
        info!("Temp directory {} cleaned", self.temp_dir.display());
        Ok(())
    }

    /// Best-effort removal of whatever a failed fetch left behind for `stem`
    /// (partial downloads, intermediate formats).
    pub async fn remove_job_artifacts(&self, stem: &str) -> usize {
        let prefix = format!("{}.", stem);
        match self
            .remove_files_matching(|name| name.starts_with(&prefix))
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to clean artifacts of {}: {}", stem, e);
                0
            }
        }
    }

    /// Deletes a job's file, then its record.
    ///
    /// The record is only dropped once the file is gone (or was never there).
    /// If the file cannot be removed the job stays in the store and the error
    /// is returned, so the caller may retry.
    pub async fn delete_job(&self, store: &JobStore, job_id: &str) -> ServiceResult<()> {
        let job = store.get(job_id)?;

        if let Some(path) = &job.file_path {
            remove_file_if_present(path).await?;
        }

        self.forget_job(store, job_id, job.file_path.as_deref()).await;
        info!("Deleted job {}", job_id);
        Ok(())
    }

    /// Drops the record. A fetch may have committed its file after
    /// `known_file` was read, in which case that file goes too.
    async fn forget_job(&self, store: &JobStore, job_id: &str, known_file: Option<&Path>) {
        let Some(removed) = store.remove(job_id) else {
            return;
        };
        if let Some(path) = removed.file_path.filter(|p| Some(p.as_path()) != known_file) {
            debug!("Removing late file {} of deleted job {}", path.display(), job_id);
            if let Err(e) = remove_file_if_present(&path).await {
                warn!("Failed to remove late file of deleted job {}: {}", job_id, e);
            }
        }
    }

    async fn remove_files_matching<F>(&self, matches: F) -> ServiceResult<usize>
    where
        F: Fn(&str) -> bool,
    {
        let mut entries = match fs::read_dir(&self.temp_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ServiceError::storage(&self.temp_dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ServiceError::storage(&self.temp_dir, e))?
        {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file || !matches(&entry.file_name().to_string_lossy()) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

async fn remove_file_if_present(path: &Path) -> ServiceResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ServiceError::storage(path, e)),
    }
}
