//! Error taxonomy shared by the job store, lifecycle controller,
//! streaming gateway and storage janitor.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog_search::SearchError;
use crate::fetcher::FetchError;
use crate::jobs::JobPhase;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The job id is unknown (never created, or already deleted).
    #[error("Job {0} not found")]
    NotFound(String),

    /// The job exists but is not in a phase that allows the operation.
    #[error("Job {id} is not ready (phase: {phase})")]
    NotReady { id: String, phase: JobPhase },

    /// A job with this id already exists.
    #[error("Job {0} already exists")]
    Conflict(String),

    /// The job claims a file that is not on disk.
    #[error("Audio file not found at {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Storage error on {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure of an external collaborator (search or fetch).
    #[error("{0}")]
    Adapter(String),
}

impl ServiceError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ServiceError::Storage {
            path: path.into(),
            source,
        }
    }
}

impl From<FetchError> for ServiceError {
    fn from(err: FetchError) -> Self {
        ServiceError::Adapter(err.to_string())
    }
}

impl From<SearchError> for ServiceError {
    fn from(err: SearchError) -> Self {
        ServiceError::Adapter(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
