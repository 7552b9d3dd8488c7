//! Recognizes the YouTube URL shapes the lookup route accepts.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Watch page, short link, embed and mobile watch page. Each pattern is
/// anchored at the start only, so anything after a valid prefix is ignored.
static SOURCE_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(?:https?://)?(?:www\.)?youtube\.com/watch\?v=[\w-]+",
        r"^(?:https?://)?(?:www\.)?youtu\.be/[\w-]+",
        r"^(?:https?://)?(?:www\.)?youtube\.com/embed/[\w-]+",
        r"^(?:https?://)?(?:m\.)?youtube\.com/watch\?v=[\w-]+",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("static source URL pattern"))
    .collect()
});

/// Returns `true` when `text` parses as an absolute URL with a host and
/// starts with one of the supported YouTube URL shapes.
pub fn is_valid_source_url(text: Option<&str>) -> bool {
    let Some(text) = text.filter(|value| !value.is_empty()) else {
        return false;
    };

    match Url::parse(text) {
        Ok(parsed) if parsed.host_str().is_some_and(|host| !host.is_empty()) => {}
        _ => return false,
    }

    SOURCE_URL_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(text))
}
