//! Shapes exchanged between the resolver components and exposed by the API.
//!
//! Everything here is built fresh for a single request and dropped once the
//! response is written.

use serde::{Deserialize, Serialize};

/// Metadata for one video plus the playable formats the normalizer kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub title: String,
    pub duration: Option<f64>,
    pub uploader: String,
    pub thumbnail: Option<String>,
    pub formats: Vec<FormatCandidate>,
}

/// A single directly playable stream.
///
/// `height` is `0` when the extractor did not report one, which also makes
/// such entries sort last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatCandidate {
    pub format_id: String,
    pub ext: String,
    #[serde(rename = "quality")]
    pub quality_label: String,
    pub url: String,
    pub filesize: Option<i64>,
    pub fps: Option<f64>,
    pub height: i64,
}

/// Thumbnail record in the mirror API layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// One search hit. Both `yt-dlp` and the mirrors are normalized into this
/// shape so callers cannot tell which backend answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub video_id: String,
    pub title: String,
    pub author: String,
    pub length_seconds: Option<u64>,
    pub view_count: Option<u64>,
    pub published_text: String,
    pub description: String,
    pub video_thumbnails: Vec<Thumbnail>,
}

pub const DESCRIPTION_LIMIT: usize = 200;
pub const UNKNOWN: &str = "Unknown";

/// Cuts a description down to [`DESCRIPTION_LIMIT`] characters.
pub fn truncate_description(text: Option<&str>) -> String {
    text.map(|value| value.chars().take(DESCRIPTION_LIMIT).collect())
        .unwrap_or_default()
}

/// Where a mirror host came from during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointTier {
    Priority,
    Discovered,
    StaticFallback,
}

/// A mirror host considered for one search call.
///
/// `live` is only `true` when a probe or the directory's monitor confirmed
/// the host; static fallback hosts are tried unconfirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCandidate {
    pub host: String,
    pub tier: EndpointTier,
    pub live: bool,
}

/// Which backend produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchMethod {
    #[serde(rename = "yt-dlp")]
    YtDlp,
    #[serde(rename = "invidious")]
    Invidious,
}

pub const DIRECT_TOOL_INSTANCE: &str = "yt-dlp-direct";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResultItem>,
    pub instance: String,
    pub method: SearchMethod,
    pub used_fallback: bool,
}

/// Raw report of a diagnostic `yt-dlp` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDiagnostics {
    pub command: String,
    pub return_code: Option<i32>,
    pub stdout_length: usize,
    pub stderr: String,
    pub stdout_preview: String,
    pub has_output: bool,
}
