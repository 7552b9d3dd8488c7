//! Blocking HTTP GET capability used for mirror probes, mirror searches and
//! the instance directory.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use tracing::debug;

use crate::error::HttpError;

/// A GET request with its own deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_owned(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_owned(), value.into()));
        self
    }
}

/// Any response that made it back, including non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

pub trait HttpClient: Send + Sync {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// [`HttpClient`] backed by a shared `ureq::Agent`.
#[derive(Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .build();
        Self { agent }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut call = self.agent.get(&request.url).timeout(request.timeout);
        for (key, value) in &request.query {
            call = call.query(key, value);
        }
        for (key, value) in &request.headers {
            call = call.set(key, value);
        }

        let response = match call.call() {
            Ok(response) => response,
            // ureq reports 4xx/5xx as errors; callers want them as plain statuses.
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                debug!(url = %request.url, error = %transport, "transport error");
                return Err(if is_timeout(&transport) {
                    HttpError::Timeout {
                        url: request.url.clone(),
                    }
                } else {
                    HttpError::Transport {
                        url: request.url.clone(),
                        message: transport.to_string(),
                    }
                });
            }
        };

        let status = response.status();
        let body = response.into_string().map_err(|err| {
            if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                HttpError::Timeout {
                    url: request.url.clone(),
                }
            } else {
                HttpError::Transport {
                    url: request.url.clone(),
                    message: format!("reading body: {err}"),
                }
            }
        })?;
        Ok(HttpResponse { status, body })
    }
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut source = transport.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            )
        {
            return true;
        }
        source = err.source();
    }
    transport.to_string().contains("timed out")
}
