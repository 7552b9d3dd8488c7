//! Typed failures returned across module boundaries.
//!
//! The `Display` text of `ExtractError` and `SearchError` is what the HTTP
//! layer hands back to end users, so the wording here is user-facing. Search
//! messages and the "no compatible format" message are Japanese while the
//! rest are English; both are kept exactly as users of the service see them.

use std::time::Duration;

use thiserror::Error;

/// Failure to run an external program to completion.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{program} did not finish within {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    /// Short machine-readable name used by the diagnostics route.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "Timeout",
            Self::Spawn { .. } => "SpawnError",
            Self::Wait { .. } => "WaitError",
        }
    }
}

/// Transport-level failure of a single outbound HTTP request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// Why a single-video lookup produced no playable formats.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Failed to fetch video: {0}")]
    ToolFailed(String),

    #[error("No video information returned by yt-dlp")]
    NoInformation,

    #[error("Failed to parse video information: {0}")]
    Parse(String),

    #[error("この動画には対応可能な形式が見つかりませんでした")]
    NoCompatibleFormat,

    #[error("Request timeout - video processing took too long")]
    Timeout,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Request bodies rejected before any tool or network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("URL is required")]
    MissingUrl,

    #[error("URL cannot be empty")]
    EmptyUrl,

    #[error("Please enter a valid YouTube URL")]
    InvalidUrl,

    #[error("検索クエリが必要です")]
    MissingQuery,
}

/// Outcome of a search that returned nothing usable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("検索クエリが空です")]
    EmptyQuery,

    #[error("すべての検索方法で失敗しました。ネットワーク接続を確認して再試行してください。")]
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_message_carries_stderr() {
        let err = ExtractError::ToolFailed("ERROR: Video unavailable".into());
        assert_eq!(
            err.to_string(),
            "Failed to fetch video: ERROR: Video unavailable"
        );
    }

    #[test]
    fn run_error_kinds_are_stable() {
        let err = RunError::Timeout {
            program: "yt-dlp".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.kind(), "Timeout");
        assert_eq!(err.to_string(), "yt-dlp did not finish within 30s");
    }
}
