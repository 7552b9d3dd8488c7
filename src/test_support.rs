//! Scripted stand-ins for the process and HTTP capabilities.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backoff::Backoff;
use crate::error::{HttpError, RunError};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::runner::{CommandOutput, CommandRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Hands out queued results in order and records every invocation.
#[derive(Default)]
pub struct ScriptedRunner {
    queue: Mutex<VecDeque<Result<CommandOutput, RunError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, output: CommandOutput) {
        self.queue.lock().push_back(Ok(output));
    }

    pub fn push_stdout(&self, stdout: &str) {
        self.push_output(CommandOutput {
            code: Some(0),
            stdout: stdout.to_owned(),
            stderr: String::new(),
        });
    }

    pub fn push_timeout(&self) {
        self.queue.lock().push_back(Err(RunError::Timeout {
            program: "yt-dlp".into(),
            timeout: Duration::from_secs(60),
        }));
    }

    pub fn push_spawn_error(&self) {
        self.queue.lock().push_back(Err(RunError::Spawn {
            program: "yt-dlp".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        }));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        self.calls.lock().push(RecordedCall {
            program: program.to_owned(),
            args: args.to_vec(),
            timeout,
        });
        self.queue.lock().pop_front().unwrap_or_else(|| {
            Err(RunError::Spawn {
                program: program.to_owned(),
                source: io::Error::other("no scripted output left"),
            })
        })
    }
}

/// Answers by exact URL (query string excluded); unknown URLs fail to
/// connect.
#[derive(Default)]
pub struct ScriptedHttp {
    routes: Mutex<HashMap<String, Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().insert(
            url.to_owned(),
            Ok(HttpResponse {
                status,
                body: body.to_owned(),
            }),
        );
    }

    pub fn timeout(&self, url: &str) {
        self.routes.lock().insert(
            url.to_owned(),
            Err(HttpError::Timeout {
                url: url.to_owned(),
            }),
        );
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }
}

impl HttpClient for ScriptedHttp {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests.lock().push(request.clone());
        self.routes
            .lock()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| {
                Err(HttpError::Transport {
                    url: request.url.clone(),
                    message: "connection refused".into(),
                })
            })
    }
}

/// Records pacing requests instead of sleeping.
#[derive(Default)]
pub struct RecordingBackoff {
    attempts: Mutex<Vec<usize>>,
}

impl RecordingBackoff {
    pub fn attempts(&self) -> Vec<usize> {
        self.attempts.lock().clone()
    }
}

impl Backoff for RecordingBackoff {
    fn pause(&self, attempt: usize) {
        self.attempts.lock().push(attempt);
    }
}
