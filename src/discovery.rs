//! Builds the ordered list of mirror hosts to try for one search call.
//!
//! Priority hosts are probed live and kept in their configured order. The
//! public instance directory supplies extra hosts; when it cannot be read a
//! fixed list stands in. Nothing here ever fails: the worst case is a list
//! made only of the static fallbacks.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::{HttpClient, HttpRequest};
use crate::mirror::MirrorClient;
use crate::models::{EndpointCandidate, EndpointTier};

pub const DEFAULT_DIRECTORY_URL: &str = "https://api.invidious.io/";
pub const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(8);
pub const MAX_DISCOVERED: usize = 5;

pub const PRIORITY_HOSTS: [&str; 3] = ["yewtu.be", "invidious.fdn.fr", "invidious.snopyta.org"];
pub const STATIC_FALLBACK_HOSTS: [&str; 4] = [
    "yt.artemislena.eu",
    "invidious.projectsegfau.lt",
    "invidious.flokinet.to",
    "iv.melmac.space",
];

#[derive(Debug, Deserialize)]
struct InstanceDescriptor {
    #[serde(default)]
    api: Option<bool>,
    #[serde(rename = "type")]
    transport: Option<String>,
    uri: Option<String>,
    monitor: Option<Monitor>,
}

#[derive(Debug, Deserialize)]
struct Monitor {
    #[serde(rename = "statusClass")]
    status_class: Option<String>,
}

impl InstanceDescriptor {
    fn is_usable(&self) -> bool {
        self.api == Some(true)
            && self.transport.as_deref() == Some("https")
            && self
                .monitor
                .as_ref()
                .and_then(|monitor| monitor.status_class.as_deref())
                == Some("up")
    }

    fn host(&self) -> Option<String> {
        let uri = self.uri.as_deref()?;
        let host = uri
            .strip_prefix("https://")
            .unwrap_or(uri)
            .trim_end_matches('/');
        (!host.is_empty()).then(|| host.to_owned())
    }
}

#[derive(Clone)]
pub struct EndpointDiscovery {
    http: Arc<dyn HttpClient>,
    mirror: MirrorClient,
    directory_url: String,
    priority: Vec<String>,
    static_fallback: Vec<String>,
}

impl EndpointDiscovery {
    pub fn new(http: Arc<dyn HttpClient>, directory_url: impl Into<String>) -> Self {
        Self {
            mirror: MirrorClient::new(http.clone()),
            http,
            directory_url: directory_url.into(),
            priority: PRIORITY_HOSTS.map(String::from).to_vec(),
            static_fallback: STATIC_FALLBACK_HOSTS.map(String::from).to_vec(),
        }
    }

    /// Live priority hosts first, then directory (or static fallback) hosts.
    pub fn discover(&self) -> Vec<EndpointCandidate> {
        let mut endpoints: Vec<EndpointCandidate> = self
            .priority
            .iter()
            .filter(|host| self.mirror.probe(host))
            .map(|host| EndpointCandidate {
                host: host.clone(),
                tier: EndpointTier::Priority,
                live: true,
            })
            .collect();

        match self.fetch_directory() {
            Ok(hosts) => endpoints.extend(hosts.into_iter().map(|host| EndpointCandidate {
                host,
                tier: EndpointTier::Discovered,
                live: true,
            })),
            Err(reason) => {
                warn!(%reason, "instance directory unavailable, using static fallback hosts");
                endpoints.extend(self.static_fallback.iter().map(|host| EndpointCandidate {
                    host: host.clone(),
                    tier: EndpointTier::StaticFallback,
                    live: false,
                }));
            }
        }

        debug!(
            hosts = ?endpoints.iter().map(|endpoint| endpoint.host.as_str()).collect::<Vec<_>>(),
            "discovered mirror hosts"
        );
        endpoints
    }

    /// Host names from [`Self::discover`], in order.
    pub fn host_names(&self) -> Vec<String> {
        self.discover()
            .into_iter()
            .map(|endpoint| endpoint.host)
            .collect()
    }

    fn fetch_directory(&self) -> Result<Vec<String>, String> {
        let request = HttpRequest::get(&self.directory_url, DIRECTORY_TIMEOUT);
        let response = self.http.get(&request).map_err(|err| err.to_string())?;
        if !response.is_ok() {
            return Err(format!("HTTP {}", response.status));
        }
        let entries: Vec<Value> =
            serde_json::from_str(&response.body).map_err(|err| err.to_string())?;

        let hosts = entries
            .into_iter()
            .filter_map(descriptor_of)
            .filter(InstanceDescriptor::is_usable)
            .filter_map(|descriptor| descriptor.host())
            .filter(|host| !self.priority.contains(host))
            .take(MAX_DISCOVERED)
            .collect();
        Ok(hosts)
    }
}

/// The directory lists `[name, descriptor]` pairs; a bare descriptor object
/// is accepted too.
fn descriptor_of(entry: Value) -> Option<InstanceDescriptor> {
    let descriptor = match entry {
        Value::Array(mut pair) if pair.len() == 2 => pair.pop()?,
        object @ Value::Object(_) => object,
        _ => return None,
    };
    serde_json::from_value(descriptor).ok()
}
