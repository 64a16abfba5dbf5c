use axum::body::Bytes;
use futures::{Stream, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::jobs::{JobPhase, JobStore};
use crate::server::metrics;

const READ_BUFFER_SIZE: usize = 4096 * 16;

pub struct StreamingGateway {
    store: Arc<JobStore>,
}

/// An opened, already consumed job file.
#[derive(Debug)]
pub struct AudioStream {
    pub job_id: String,
    pub source_id: String,
    pub path: PathBuf,
    pub len: u64,
    file: File,
}

impl StreamingGateway {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Opens the file of a `ready` job and marks the job `consumed`.
    ///
    /// The file is opened before the transition, and the transition is the
    /// only point of contention: of two concurrent callers exactly one gets
    /// the stream, the other gets `NotReady`. No store lock is held while the
    /// returned stream is read.
    pub async fn open_stream(&self, job_id: &str) -> ServiceResult<AudioStream> {
        let job = self.store.get(job_id)?;
        if job.phase != JobPhase::Ready {
            return Err(ServiceError::NotReady {
                id: job.id,
                phase: job.phase,
            });
        }
        let Some(path) = job.file_path else {
            return Err(ServiceError::MissingFile(PathBuf::new()));
        };

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ServiceError::MissingFile(path))
            }
            Err(e) => return Err(ServiceError::storage(&path, e)),
        };
        let metadata = file
            .metadata()
            .await
            .map_err(|e| ServiceError::storage(&path, e))?;
        if !metadata.is_file() {
            return Err(ServiceError::MissingFile(path));
        }

        self.store.update(job_id, |job| {
            if job.phase != JobPhase::Ready || job.file_path.as_deref() != Some(path.as_path()) {
                return Err(ServiceError::NotReady {
                    id: job.id.clone(),
                    phase: job.phase,
                });
            }
            job.consume();
            Ok(())
        })?;
        info!("Job {} consumed, streaming {}", job_id, path.display());

        Ok(AudioStream {
            job_id: job.id,
            source_id: job.source_id,
            path,
            len: metadata.len(),
            file,
        })
    }
}

impl AudioStream {
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.path)
    }

    /// Name suggested to the client, `<sourceId>.<ext>`.
    pub fn attachment_filename(&self) -> String {
        format!("{}.{}", self.source_id, self.extension())
    }

    /// Reads the file to the end, sequentially.
    pub fn into_byte_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
        let job_id = self.job_id;
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, self.file);
        ReaderStream::with_capacity(reader, READ_BUFFER_SIZE).inspect(move |chunk| match chunk {
            Ok(bytes) => metrics::record_streamed_bytes(bytes.len() as u64),
            Err(e) => debug!("Stream of job {} interrupted: {}", job_id, e),
        })
    }
}

/// MIME type from the audio file's extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("opus") | Some("ogg") | Some("oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        Some("aac") => "audio/aac",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}
