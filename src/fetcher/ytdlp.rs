//! Media fetcher backed by the `yt-dlp` executable.
//!
//! yt-dlp downloads the best audio stream and hands it to ffmpeg for
//! extraction. Progress is read from stdout through a machine-readable
//! progress template, one event per line.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{resolve_output_template, FetchError, MediaFetcher, ProgressListener};

const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s";
const FINAL_PATH_TEMPLATE: &str = "after_move:[filepath] %(filepath)s";
const FINAL_PATH_PREFIX: &str = "[filepath] ";
const MAX_STDERR_LINES: usize = 20;

lazy_static! {
    static ref PROGRESS_LINE: Regex =
        Regex::new(r"^\[progress\] (\S+) (\S+) (\S+) (\S+)\s*$")
            .expect("Failed to compile progress line regex");
}

#[derive(Debug, Clone)]
pub struct YtDlpSettings {
    /// Path or name of the yt-dlp executable
    pub binary: PathBuf,
    /// Target audio codec passed to `--audio-format`
    pub audio_format: String,
    /// Passed to `--audio-quality` (e.g. "192K" or "0")
    pub audio_quality: String,
    /// Netscape cookies file for sources that need a session
    pub cookies_file: Option<PathBuf>,
    /// Prefix joined with the source id to form the fetched URL
    pub watch_url_base: String,
}

impl Default for YtDlpSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            cookies_file: None,
            watch_url_base: "https://www.youtube.com/watch?v=".to_string(),
        }
    }
}

pub struct YtDlpFetcher {
    settings: YtDlpSettings,
}

impl YtDlpFetcher {
    pub fn new(settings: YtDlpSettings) -> Self {
        Self { settings }
    }

    fn command(&self, source_id: &str, output_template: &Path) -> Command {
        let mut cmd = Command::new(&self.settings.binary);
        cmd.args([
            "--no-playlist",
            "--no-warnings",
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            self.settings.audio_format.as_str(),
            "--audio-quality",
            self.settings.audio_quality.as_str(),
            "--newline",
            "--progress",
            "--progress-template",
            PROGRESS_TEMPLATE,
            "--print",
            FINAL_PATH_TEMPLATE,
        ]);
        if let Some(cookies) = &self.settings.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg("-o")
            .arg(output_template)
            .arg(format!("{}{}", self.settings.watch_url_base, source_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        source_id: &str,
        output_template: &Path,
        progress: &dyn ProgressListener,
    ) -> Result<PathBuf, FetchError> {
        validate_source_id(source_id)?;
        if let Some(parent) = output_template.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut child = self
            .command(source_id, output_template)
            .spawn()
            .map_err(FetchError::Spawn)?;

        let stdout = child.stdout.take().ok_or_else(|| {
            FetchError::Io(std::io::Error::other("Failed to capture fetcher stdout"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            FetchError::Io(std::io::Error::other("Failed to capture fetcher stderr"))
        })?;
        let stderr_task = tokio::spawn(collect_tail(stderr, MAX_STDERR_LINES));

        let mut final_path = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_output_line(&line) {
                OutputLine::Progress {
                    finished,
                    downloaded_bytes,
                    total_bytes,
                } => {
                    if let Some(downloaded) = downloaded_bytes {
                        progress.on_progress(downloaded, total_bytes);
                    }
                    if finished {
                        progress.on_download_complete();
                    }
                }
                OutputLine::FinalPath(path) => {
                    debug!("yt-dlp produced {}", path.display());
                    final_path = Some(path);
                }
                OutputLine::Other => debug!("[yt-dlp] {}", line),
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            warn!("yt-dlp failed for {}: {}", source_id, stderr);
            return Err(FetchError::Failed {
                code: status.code(),
                stderr,
            });
        }

        final_path.ok_or_else(|| {
            FetchError::MissingOutput(resolve_output_template(
                output_template,
                self.settings.audio_format.as_str(),
            ))
        })
    }
}

/// Source ids are catalog keys such as `dQw4w9WgXcQ`.
fn validate_source_id(source_id: &str) -> Result<(), FetchError> {
    let valid = !source_id.is_empty()
        && source_id.len() <= 64
        && source_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidSource(source_id.to_string()))
    }
}

async fn collect_tail<R: AsyncRead + Unpin>(reader: R, max_lines: usize) -> String {
    let mut tail: Vec<String> = Vec::new();
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == max_lines {
            tail.remove(0);
        }
        tail.push(line);
    }
    tail.join("\n")
}

#[derive(Debug, PartialEq)]
enum OutputLine {
    Progress {
        finished: bool,
        downloaded_bytes: Option<u64>,
        total_bytes: Option<u64>,
    },
    FinalPath(PathBuf),
    Other,
}

fn parse_output_line(line: &str) -> OutputLine {
    if let Some(path) = line.strip_prefix(FINAL_PATH_PREFIX) {
        let path = path.trim();
        if !path.is_empty() {
            return OutputLine::FinalPath(PathBuf::from(path));
        }
    }

    match PROGRESS_LINE.captures(line) {
        Some(caps) => OutputLine::Progress {
            finished: &caps[1] == "finished",
            downloaded_bytes: parse_byte_count(&caps[2]),
            total_bytes: parse_byte_count(&caps[3]).or_else(|| parse_byte_count(&caps[4])),
        },
        None => OutputLine::Other,
    }
}

/// yt-dlp prints "NA" for unknown values and floats for estimates.
fn parse_byte_count(value: &str) -> Option<u64> {
    value.parse::<u64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_downloading_progress() {
        assert_eq!(
            parse_output_line("[progress] downloading 1024 4096 NA"),
            OutputLine::Progress {
                finished: false,
                downloaded_bytes: Some(1024),
                total_bytes: Some(4096),
            }
        );
    }

    #[test]
    fn falls_back_to_estimated_total() {
        assert_eq!(
            parse_output_line("[progress] downloading 1024 NA 8191.7"),
            OutputLine::Progress {
                finished: false,
                downloaded_bytes: Some(1024),
                total_bytes: Some(8191),
            }
        );
    }

    #[test]
    fn unknown_totals_stay_unknown() {
        assert_eq!(
            parse_output_line("[progress] downloading 1024 NA NA"),
            OutputLine::Progress {
                finished: false,
                downloaded_bytes: Some(1024),
                total_bytes: None,
            }
        );
    }

    #[test]
    fn parses_finished_progress() {
        assert!(matches!(
            parse_output_line("[progress] finished 4096 4096 NA"),
            OutputLine::Progress { finished: true, .. }
        ));
    }

    #[test]
    fn parses_final_path() {
        assert_eq!(
            parse_output_line("[filepath] /tmp/audio/abc_1.mp3"),
            OutputLine::FinalPath(PathBuf::from("/tmp/audio/abc_1.mp3"))
        );
        assert_eq!(parse_output_line("[filepath] "), OutputLine::Other);
    }

    #[test]
    fn ignores_unrelated_output() {
        assert_eq!(
            parse_output_line("[youtube] abc: Downloading webpage"),
            OutputLine::Other
        );
        assert_eq!(parse_output_line(""), OutputLine::Other);
    }

    #[test]
    fn validates_source_ids() {
        assert!(validate_source_id("dQw4w9WgXcQ").is_ok());
        assert!(validate_source_id("-abc_123").is_ok());
        assert!(validate_source_id("").is_err());
        assert!(validate_source_id("../etc/passwd").is_err());
        assert!(validate_source_id("abc def").is_err());
        assert!(validate_source_id(&"a".repeat(65)).is_err());
    }

    #[tokio::test]
    async fn keeps_only_stderr_tail() {
        let input: &[u8] = b"one\ntwo\nthree\nfour\n";
        assert_eq!(collect_tail(input, 2).await, "three\nfour");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = YtDlpFetcher::new(YtDlpSettings {
            binary: dir.path().join("no-such-yt-dlp"),
            ..Default::default()
        });
        let (progress, _rx) = super::super::ChannelProgress::channel();

        let result = fetcher
            .fetch("abc123", &dir.path().join("x.%(ext)s"), &progress)
            .await;

        assert!(matches!(result, Err(FetchError::Spawn(_))));
    }
}
