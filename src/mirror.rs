//! Client for the Invidious-compatible mirror API: the stats probe used for
//! liveness checks and the search endpoint used as a fallback.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::HttpError;
use crate::http::{HttpClient, HttpRequest};
use crate::models::{SearchResultItem, Thumbnail, UNKNOWN, truncate_description};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);
pub const RESULT_WINDOW: usize = 12;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Why one mirror did not produce results. Never surfaced to users; the
/// orchestrator just moves on to the next host.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MirrorError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("no video results")]
    Empty,

    #[error(transparent)]
    Http(#[from] HttpError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MirrorVideo {
    #[serde(rename = "type")]
    kind: Option<String>,
    video_id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    length_seconds: Option<u64>,
    view_count: Option<u64>,
    published_text: Option<String>,
    description: Option<String>,
    video_thumbnails: Option<Vec<Thumbnail>>,
}

impl MirrorVideo {
    fn into_item(self) -> Option<SearchResultItem> {
        if self.kind.as_deref() != Some("video") {
            return None;
        }
        let video_id = self.video_id.filter(|id| !id.is_empty())?;
        Some(SearchResultItem {
            video_id,
            title: self.title.unwrap_or_default(),
            author: self.author.unwrap_or_else(|| UNKNOWN.to_owned()),
            length_seconds: self.length_seconds,
            view_count: self.view_count,
            published_text: self
                .published_text
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_owned()),
            description: truncate_description(self.description.as_deref()),
            video_thumbnails: self.video_thumbnails.unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct MirrorClient {
    http: Arc<dyn HttpClient>,
}

impl MirrorClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// `true` when `GET /api/v1/stats` answers 200 within the probe timeout.
    pub fn probe(&self, host: &str) -> bool {
        let request = HttpRequest::get(stats_url(host), PROBE_TIMEOUT);
        match self.http.get(&request) {
            Ok(response) if response.is_ok() => {
                debug!(host, "mirror is alive");
                true
            }
            Ok(response) => {
                debug!(host, status = response.status, "mirror probe rejected");
                false
            }
            Err(err) => {
                debug!(host, error = %err, "mirror probe failed");
                false
            }
        }
    }

    /// Searches one mirror and normalizes its answer.
    pub fn search(&self, host: &str, query: &str) -> Result<Vec<SearchResultItem>, MirrorError> {
        let request = search_request(host, query);
        let response = self.http.get(&request)?;
        if !response.is_ok() {
            return Err(MirrorError::Status(response.status));
        }

        let entries: Vec<Value> = serde_json::from_str(&response.body)
            .map_err(|err| MirrorError::Decode(err.to_string()))?;

        let results: Vec<SearchResultItem> = entries
            .into_iter()
            .take(RESULT_WINDOW)
            .filter_map(|entry| serde_json::from_value::<MirrorVideo>(entry).ok())
            .filter_map(MirrorVideo::into_item)
            .collect();

        if results.is_empty() {
            return Err(MirrorError::Empty);
        }
        Ok(results)
    }
}

pub fn stats_url(host: &str) -> String {
    format!("https://{host}/api/v1/stats")
}

pub fn search_url(host: &str) -> String {
    format!("https://{host}/api/v1/search")
}

/// Search request with a browser-like header set; several mirrors reject
/// requests that look scripted.
fn search_request(host: &str, query: &str) -> HttpRequest {
    HttpRequest::get(search_url(host), SEARCH_TIMEOUT)
        .query("q", query)
        .query("type", "video")
        .query("sort_by", "relevance")
        .query("page", "1")
        .header("User-Agent", USER_AGENT)
        .header("Accept", "application/json, text/plain, */*")
        .header("Accept-Language", "ja,en-US;q=0.9,en;q=0.8")
        .header("DNT", "1")
        .header("Connection", "keep-alive")
        .header("Sec-Fetch-Dest", "empty")
        .header("Sec-Fetch-Mode", "cors")
        .header("Sec-Fetch-Site", "same-origin")
        .header("Referer", format!("https://{host}/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedHttp;
    use serde_json::json;

    fn video(id: &str) -> Value {
        json!({
            "type": "video",
            "videoId": id,
            "title": format!("Video {id}"),
            "author": "Someone",
            "lengthSeconds": 300,
            "viewCount": 42,
            "publishedText": "3 days ago",
            "description": "d".repeat(250),
            "videoThumbnails": [
                {"quality": "medium", "url": format!("https://img.example/{id}.jpg"),
                 "width": 320, "height": 180}
            ]
        })
    }

    #[test]
    fn search_normalizes_video_entries() {
        let http = Arc::new(ScriptedHttp::new());
        http.respond(
            &search_url("yewtu.be"),
            200,
            &json!([
                video("a"),
                {"type": "channel", "author": "A channel"},
                {"type": "video", "videoId": ""},
                {"type": "video", "videoId": "bare"}
            ])
            .to_string(),
        );

        let results = MirrorClient::new(http.clone()).search("yewtu.be", "lofi").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].video_id, "a");
        assert_eq!(results[0].published_text, "3 days ago");
        assert_eq!(results[0].description.chars().count(), 200);
        assert_eq!(results[0].video_thumbnails[0].width, Some(320));

        assert_eq!(results[1].video_id, "bare");
        assert_eq!(results[1].author, "Unknown");
        assert_eq!(results[1].published_text, "Unknown");
        assert!(results[1].video_thumbnails.is_empty());

        let request = &http.requests()[0];
        assert_eq!(request.timeout, SEARCH_TIMEOUT);
        assert!(request.query.contains(&("q".to_string(), "lofi".to_string())));
        assert!(request.query.contains(&("type".to_string(), "video".to_string())));
        assert!(
            request
                .headers
                .contains(&("Referer".to_string(), "https://yewtu.be/".to_string()))
        );
    }

    #[test]
    fn search_only_considers_first_twelve_entries() {
        let http = Arc::new(ScriptedHttp::new());
        let mut entries: Vec<Value> = (0..12).map(|_| json!({"type": "playlist"})).collect();
        entries.push(video("late"));
        http.respond(&search_url("h"), 200, &Value::Array(entries).to_string());

        let err = MirrorClient::new(http).search("h", "q").unwrap_err();
        assert_eq!(err, MirrorError::Empty);
    }

    #[test]
    fn search_caps_results_at_twelve() {
        let http = Arc::new(ScriptedHttp::new());
        let entries: Vec<Value> = (0..20).map(|i| video(&i.to_string())).collect();
        http.respond(&search_url("h"), 200, &Value::Array(entries).to_string());

        let results = MirrorClient::new(http).search("h", "q").unwrap();
        assert_eq!(results.len(), 12);
        assert_eq!(results[11].video_id, "11");
    }

    #[test]
    fn search_reports_status_decode_and_transport_failures() {
        let http = Arc::new(ScriptedHttp::new());
        http.respond(&search_url("busy"), 429, "Too Many Requests");
        http.respond(&search_url("html"), 200, "<html>blocked</html>");
        http.respond(&search_url("object"), 200, r#"{"error": "nope"}"#);
        http.timeout(&search_url("slow"));
        let client = MirrorClient::new(http);

        assert_eq!(client.search("busy", "q").unwrap_err(), MirrorError::Status(429));
        assert!(matches!(client.search("html", "q"), Err(MirrorError::Decode(_))));
        assert!(matches!(client.search("object", "q"), Err(MirrorError::Decode(_))));
        assert!(matches!(
            client.search("slow", "q"),
            Err(MirrorError::Http(HttpError::Timeout { .. }))
        ));
    }

    #[test]
    fn probe_requires_200() {
        let http = Arc::new(ScriptedHttp::new());
        http.respond(&stats_url("up"), 200, "{}");
        http.respond(&stats_url("down"), 503, "");
        http.timeout(&stats_url("slow"));
        let client = MirrorClient::new(http.clone());

        assert!(client.probe("up"));
        assert!(!client.probe("down"));
        assert!(!client.probe("slow"));
        assert!(!client.probe("unknown"));
        assert!(
            http.requests()
                .iter()
                .all(|request| request.timeout == PROBE_TIMEOUT)
        );
    }
}
