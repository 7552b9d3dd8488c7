//! Wrapper around the `yt-dlp` executable.
//!
//! All three entry points shell out through a [`CommandRunner`], so tests can
//! script the tool's stdout/stderr without spawning anything.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{ExtractError, RunError};
use crate::formats::{RawFormat, normalize};
use crate::models::{
    SearchResultItem, Thumbnail, ToolDiagnostics, UNKNOWN, VideoMetadata, truncate_description,
};
use crate::runner::CommandRunner;

pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(60);
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const SELF_TEST_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const PREVIEW_CHARS: usize = 500;

/// Subset of a `--dump-json` record needed for a single-video lookup.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<Value>,
}

/// One line of `--flat-playlist` search output.
#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    description: Option<String>,
    thumbnail: Option<String>,
}

impl SearchEntry {
    fn into_item(self) -> Option<SearchResultItem> {
        let video_id = self.id.filter(|id| !id.is_empty())?;
        Some(SearchResultItem {
            video_id,
            title: self.title.unwrap_or_default(),
            author: self.uploader.unwrap_or_else(|| UNKNOWN.to_owned()),
            length_seconds: self
                .duration
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(|seconds| seconds.round() as u64),
            view_count: self.view_count,
            published_text: UNKNOWN.to_owned(),
            description: truncate_description(self.description.as_deref()),
            video_thumbnails: self
                .thumbnail
                .filter(|url| !url.is_empty())
                .map(|url| {
                    vec![Thumbnail {
                        url,
                        quality: None,
                        width: None,
                        height: None,
                    }]
                })
                .unwrap_or_default(),
        })
    }
}

/// Either a finished diagnostic run or the reason it could not run.
#[derive(Debug)]
pub enum SelfTest {
    Completed(ToolDiagnostics),
    Failed { error: String, kind: &'static str },
}

pub struct Extractor {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl Extractor {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Resolves one video page into its metadata and playable formats.
    pub fn extract_metadata(&self, url: &str) -> Result<VideoMetadata, ExtractError> {
        let args = lookup_args(url);
        let output = self
            .runner
            .run(&self.program, &args, LOOKUP_TIMEOUT)
            .map_err(|err| match err {
                RunError::Timeout { .. } => ExtractError::Timeout,
                other => {
                    error!(error = %other, "yt-dlp could not be run");
                    ExtractError::Unexpected(other.to_string())
                }
            })?;

        debug!(
            code = ?output.code,
            stdout_preview = preview(&output.stdout),
            stderr = %output.stderr,
            "yt-dlp lookup finished"
        );

        if !output.success() {
            let stderr = output.stderr.trim();
            let message = if stderr.is_empty() {
                "Unknown error occurred"
            } else {
                stderr
            };
            error!(error = message, "yt-dlp lookup failed");
            return Err(ExtractError::ToolFailed(message.to_owned()));
        }

        let Some(first_line) = output.stdout.lines().map(str::trim).find(|line| !line.is_empty())
        else {
            return Err(ExtractError::NoInformation);
        };

        let info: VideoInfo = serde_json::from_str(first_line).map_err(|err| {
            error!(error = %err, raw = preview(first_line), "yt-dlp output is not valid JSON");
            ExtractError::Parse(err.to_string())
        })?;
        debug!(
            title = info.title.as_deref().unwrap_or(UNKNOWN),
            format_count = info.formats.len(),
            "parsed video info"
        );

        let raw_formats: Vec<RawFormat> = info
            .formats
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(format) => Some(format),
                Err(err) => {
                    debug!(error = %err, "skipping unreadable format record");
                    None
                }
            })
            .collect();

        let formats = normalize(&raw_formats);
        if formats.is_empty() {
            debug!("no compatible formats found");
            return Err(ExtractError::NoCompatibleFormat);
        }
        debug!(count = formats.len(), "compatible formats found");

        Ok(VideoMetadata {
            title: info.title.unwrap_or_else(|| "Unknown Title".to_owned()),
            duration: info.duration,
            uploader: info.uploader.unwrap_or_else(|| UNKNOWN.to_owned()),
            thumbnail: info.thumbnail,
            formats,
        })
    }

    /// Runs a `ytsearch` query directly through the tool.
    ///
    /// Returns `None` when the tool fails outright; malformed lines are
    /// skipped, so `Some` may still hold an empty list.
    pub fn search(&self, query: &str, limit: usize) -> Option<Vec<SearchResultItem>> {
        let args = search_args(query, limit);
        info!(query, limit, "searching with yt-dlp");

        let output = match self.runner.run(&self.program, &args, SEARCH_TIMEOUT) {
            Ok(output) => output,
            Err(err) => {
                error!(error = %err, "yt-dlp search failed");
                return None;
            }
        };
        if !output.success() {
            error!(code = ?output.code, stderr = %output.stderr, "yt-dlp search failed");
            return None;
        }
        if output.stdout.trim().is_empty() {
            return None;
        }

        let results: Vec<SearchResultItem> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match serde_json::from_str::<SearchEntry>(line) {
                Ok(entry) => entry.into_item(),
                Err(err) => {
                    warn!(error = %err, "skipping malformed search line");
                    None
                }
            })
            .collect();
        debug!(count = results.len(), "yt-dlp search parsed");
        Some(results)
    }

    /// Runs a fixed lookup and reports exactly what the tool printed.
    pub fn self_test(&self) -> SelfTest {
        let args = self_test_args();
        let command = std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        match self.runner.run(&self.program, &args, SEARCH_TIMEOUT) {
            Ok(output) => SelfTest::Completed(ToolDiagnostics {
                command,
                return_code: output.code,
                stdout_length: output.stdout.len(),
                stderr: output.stderr.clone(),
                stdout_preview: if output.stdout.is_empty() {
                    "Empty".to_owned()
                } else {
                    preview(&output.stdout).to_owned()
                },
                has_output: !output.stdout.trim().is_empty(),
            }),
            Err(err) => SelfTest::Failed {
                kind: err.kind(),
                error: err.to_string(),
            },
        }
    }
}

fn lookup_args(url: &str) -> Vec<String> {
    [
        "--dump-json",
        "--no-warnings",
        "--no-playlist",
        "--skip-download",
        url,
    ]
    .map(String::from)
    .to_vec()
}

fn search_args(query: &str, limit: usize) -> Vec<String> {
    vec![
        "--dump-json".to_owned(),
        "--no-warnings".to_owned(),
        "--skip-download".to_owned(),
        "--flat-playlist".to_owned(),
        format!("ytsearch{limit}:{query}"),
    ]
}

fn self_test_args() -> Vec<String> {
    [
        "--dump-json",
        "--no-playlist",
        "--skip-download",
        SELF_TEST_URL,
    ]
    .map(String::from)
    .to_vec()
}

/// First [`PREVIEW_CHARS`] characters, cut on a char boundary.
fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
