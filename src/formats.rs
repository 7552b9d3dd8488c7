//! Turns yt-dlp's raw format list into a ranked, de-duplicated set of
//! streams a browser can play directly.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::debug;

use crate::models::FormatCandidate;

const PREFERRED_EXT: &str = "mp4";
const FALLBACK_EXTS: [&str; 2] = ["mp4", "webm"];
const NO_CODEC: &str = "none";

/// One entry of the `formats` array in `yt-dlp --dump-json` output. Every
/// field is optional because extractors fill them in very unevenly.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub url: Option<String>,
    pub height: Option<i64>,
    pub fps: Option<f64>,
    pub filesize: Option<i64>,
}

impl RawFormat {
    fn playable_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }

    fn has_video(&self) -> bool {
        has_codec(self.vcodec.as_deref())
    }

    fn has_audio(&self) -> bool {
        has_codec(self.acodec.as_deref())
    }

    fn height(&self) -> i64 {
        self.height.unwrap_or(0)
    }
}

fn has_codec(codec: Option<&str>) -> bool {
    codec.is_some_and(|codec| !codec.is_empty() && codec != NO_CODEC)
}

/// Picks the playable formats, best resolution first.
///
/// Muxed mp4 streams are preferred. Only when none exist do we fall back to
/// any mp4/webm stream, skipping DASH segments that carry no video.
pub fn normalize(raw: &[RawFormat]) -> Vec<FormatCandidate> {
    for format in raw {
        debug!(
            format_id = format.format_id.as_deref().unwrap_or_default(),
            ext = format.ext.as_deref().unwrap_or_default(),
            vcodec = format.vcodec.as_deref().unwrap_or_default(),
            acodec = format.acodec.as_deref().unwrap_or_default(),
            has_url = format.playable_url().is_some(),
            "inspecting format"
        );
    }

    let mut candidates: Vec<FormatCandidate> = raw
        .iter()
        .filter(|format| is_muxed_mp4(format))
        .filter_map(|format| to_candidate(format, false))
        .collect();

    if candidates.is_empty() {
        debug!("no muxed mp4 formats, trying browser-compatible fallbacks");
        candidates = raw
            .iter()
            .filter(|format| is_fallback_compatible(format))
            .filter_map(|format| to_candidate(format, true))
            .collect();
    }

    // `sort_by` is stable, so equal heights keep their extractor order.
    candidates.sort_by(|a, b| b.height.cmp(&a.height));

    let mut seen = HashSet::new();
    candidates.retain(|candidate| seen.insert((candidate.height, candidate.quality_label.clone())));
    candidates
}

fn is_muxed_mp4(format: &RawFormat) -> bool {
    format.ext.as_deref() == Some(PREFERRED_EXT)
        && format.has_video()
        && format.has_audio()
        && format.playable_url().is_some()
}

fn is_fallback_compatible(format: &RawFormat) -> bool {
    let ext_ok = format
        .ext
        .as_deref()
        .is_some_and(|ext| FALLBACK_EXTS.contains(&ext));
    // Heuristic: DASH ids mark adaptive segments; keep them only when they
    // still declare a video codec.
    let is_dash = format
        .format_id
        .as_deref()
        .unwrap_or_default()
        .to_lowercase()
        .contains("dash");
    let video_declared = format.vcodec.as_deref() != Some(NO_CODEC);

    format.playable_url().is_some() && ext_ok && (!is_dash || video_declared)
}

fn to_candidate(format: &RawFormat, with_container: bool) -> Option<FormatCandidate> {
    let url = format.playable_url()?;
    let ext = format.ext.clone().unwrap_or_default();
    let height = format.height();
    let quality_label = quality_label(height, with_container.then_some(ext.as_str()));

    Some(FormatCandidate {
        format_id: format.format_id.clone().unwrap_or_default(),
        ext,
        quality_label,
        url: url.to_owned(),
        filesize: format.filesize,
        fps: format.fps,
        height,
    })
}

/// `720p`, `Unknown`, or with a container suffix: `720p (webm)`.
fn quality_label(height: i64, container: Option<&str>) -> String {
    let base = if height > 0 {
        format!("{height}p")
    } else {
        "Unknown".to_owned()
    };
    match container {
        Some(ext) => format!("{base} ({ext})"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(id: &str, ext: &str, vcodec: &str, acodec: &str, height: Option<i64>) -> RawFormat {
        RawFormat {
            format_id: Some(id.into()),
            ext: Some(ext.into()),
            vcodec: Some(vcodec.into()),
            acodec: Some(acodec.into()),
            url: Some(format!("https://cdn.example/{id}")),
            height,
            fps: Some(30.0),
            filesize: None,
        }
    }

    fn labels(candidates: &[FormatCandidate]) -> Vec<&str> {
        candidates
            .iter()
            .map(|candidate| candidate.quality_label.as_str())
            .collect()
    }

    #[test]
    fn keeps_only_muxed_mp4_when_available() {
        let raw = vec![
            format("18", "mp4", "avc1.42001E", "mp4a.40.2", Some(360)),
            format("134", "mp4", "avc1.4d401e", "none", Some(360)),
            format("251", "webm", "none", "opus", None),
            format("22", "mp4", "avc1.64001F", "mp4a.40.2", Some(720)),
        ];

        let candidates = normalize(&raw);
        assert_eq!(labels(&candidates), vec!["720p", "360p"]);
        assert_eq!(candidates[0].format_id, "22");
        assert_eq!(candidates[1].url, "https://cdn.example/18");
    }

    #[test]
    fn drops_entries_without_url() {
        let mut no_url = format("22", "mp4", "avc1", "mp4a", Some(720));
        no_url.url = None;
        let mut blank_url = format("37", "mp4", "avc1", "mp4a", Some(1080));
        blank_url.url = Some(String::new());
        let raw = vec![no_url, blank_url, format("18", "mp4", "avc1", "mp4a", Some(360))];

        let candidates = normalize(&raw);
        assert_eq!(labels(&candidates), vec!["360p"]);
        assert!(candidates.iter().all(|candidate| !candidate.url.is_empty()));
    }

    #[test]
    fn missing_codecs_do_not_count_as_muxed() {
        let mut raw = format("18", "mp4", "avc1", "mp4a", Some(360));
        raw.acodec = None;
        let candidates = normalize(&[raw]);
        // Falls through to the fallback pass, which labels the container.
        assert_eq!(labels(&candidates), vec!["360p (mp4)"]);
    }

    #[test]
    fn fallback_pass_labels_container_and_skips_audio_only_dash() {
        let raw = vec![
            format("137-dash", "mp4", "avc1.640028", "none", Some(1080)),
            format("140-dash", "m4a", "none", "mp4a.40.2", None),
            format("251-dash", "webm", "none", "opus", None),
            format("248", "webm", "vp9", "none", Some(1080)),
            format("sb0", "mhtml", "none", "none", Some(180)),
            format("audio", "webm", "none", "opus", None),
        ];

        let candidates = normalize(&raw);
        assert_eq!(
            labels(&candidates),
            vec!["1080p (mp4)", "1080p (webm)", "Unknown (webm)"]
        );
        assert_eq!(candidates[2].format_id, "audio");
    }

    #[test]
    fn output_is_sorted_with_unknown_heights_last() {
        let raw = vec![
            format("a", "mp4", "avc1", "mp4a", None),
            format("b", "mp4", "avc1", "mp4a", Some(240)),
            format("c", "mp4", "avc1", "mp4a", Some(1080)),
            format("d", "mp4", "avc1", "mp4a", Some(0)),
            format("e", "mp4", "avc1", "mp4a", Some(480)),
        ];

        let candidates = normalize(&raw);
        let heights: Vec<i64> = candidates.iter().map(|candidate| candidate.height).collect();
        assert_eq!(heights, vec![1080, 480, 240, 0]);
        assert_eq!(candidates[3].quality_label, "Unknown");
        assert_eq!(candidates[3].format_id, "a");
    }

    #[test]
    fn duplicates_collapse_to_first_seen() {
        let raw = vec![
            format("first", "mp4", "avc1", "mp4a", Some(720)),
            format("second", "mp4", "avc1", "mp4a", Some(720)),
        ];
        let forward = normalize(&raw);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].format_id, "first");

        let reversed: Vec<RawFormat> = raw.into_iter().rev().collect();
        let backward = normalize(&reversed);
        assert_eq!(backward.len(), 1);
        assert_eq!(backward[0].format_id, "second");
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let raw = vec![
            format("x", "webm", "vp9", "none", Some(720)),
            format("y", "mp4", "avc1", "none", Some(720)),
            format("z", "webm", "vp9", "none", Some(360)),
        ];
        assert_eq!(normalize(&raw), normalize(&raw));
        assert_eq!(
            labels(&normalize(&raw)),
            vec!["720p (webm)", "720p (mp4)", "360p (webm)"]
        );
    }

    #[test]
    fn nothing_usable_gives_empty_list() {
        assert!(normalize(&[]).is_empty());
        let raw = vec![
            format("140", "m4a", "none", "mp4a", None),
            format("sb1", "mhtml", "none", "none", Some(90)),
        ];
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn raw_format_deserializes_sparse_records() {
        let raw: RawFormat = serde_json::from_str(
            r#"{"format_id": "18", "ext": "mp4", "height": null, "fps": 25, "extra": true}"#,
        )
        .unwrap();
        assert_eq!(raw.format_id.as_deref(), Some("18"));
        assert_eq!(raw.height, None);
        assert_eq!(raw.fps, Some(25.0));
        assert!(raw.url.is_none());
    }
}
