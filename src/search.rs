//! Search with a fallback chain: `yt-dlp` first, then mirror hosts one by one.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::discovery::EndpointDiscovery;
use crate::error::SearchError;
use crate::extractor::Extractor;
use crate::mirror::{MirrorClient, RESULT_WINDOW};
use crate::models::{DIRECT_TOOL_INSTANCE, SearchMethod, SearchOutcome};

/// Sentinel for "no preferred mirror".
pub const AUTO_INSTANCE: &str = "auto";

pub struct SearchOrchestrator {
    extractor: Arc<Extractor>,
    discovery: EndpointDiscovery,
    mirror: MirrorClient,
    backoff: Arc<dyn Backoff>,
}

impl SearchOrchestrator {
    pub fn new(
        extractor: Arc<Extractor>,
        discovery: EndpointDiscovery,
        mirror: MirrorClient,
        backoff: Arc<dyn Backoff>,
    ) -> Self {
        Self {
            extractor,
            discovery,
            mirror,
            backoff,
        }
    }

    /// Runs `query` against `yt-dlp`, then against mirrors until one answers
    /// with at least one video. `preferred` is tried first when it names a
    /// host.
    pub fn search(&self, query: &str, preferred: Option<&str>) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let preferred = preferred
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(AUTO_INSTANCE);

        info!(query, "trying yt-dlp direct search first");
        if let Some(results) = self.extractor.search(query, RESULT_WINDOW)
            && !results.is_empty()
        {
            debug!(count = results.len(), "yt-dlp answered the search");
            return Ok(SearchOutcome {
                results,
                instance: DIRECT_TOOL_INSTANCE.to_owned(),
                method: SearchMethod::YtDlp,
                used_fallback: false,
            });
        }

        info!("yt-dlp found nothing, falling back to mirrors");
        let hosts = attempt_order(preferred, self.discovery.host_names());
        debug!(?hosts, "mirror attempt order");

        for (attempt, host) in hosts.iter().enumerate() {
            if attempt > 0 {
                self.backoff.pause(attempt);
            }
            debug!(host = host.as_str(), attempt, "trying mirror");

            match self.mirror.search(host, query) {
                Ok(results) => {
                    debug!(host = host.as_str(), count = results.len(), "mirror answered");
                    return Ok(SearchOutcome {
                        results,
                        instance: host.clone(),
                        method: SearchMethod::Invidious,
                        used_fallback: host != preferred,
                    });
                }
                Err(err) => warn!(host = host.as_str(), error = %err, "mirror search failed"),
            }
        }

        warn!(attempts = hosts.len(), "every search source failed");
        Err(SearchError::Exhausted)
    }
}

/// Preferred host first (unless it is [`AUTO_INSTANCE`]), then the
/// discovered hosts without it.
fn attempt_order(preferred: &str, discovered: Vec<String>) -> Vec<String> {
    if preferred == AUTO_INSTANCE {
        return discovered;
    }
    std::iter::once(preferred.to_owned())
        .chain(discovered.into_iter().filter(|host| host != preferred))
        .collect()
}
