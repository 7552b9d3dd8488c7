#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::backoff::DEFAULT_PACING;
use crate::discovery::DEFAULT_DIRECTORY_URL;
use crate::extractor::DEFAULT_YTDLP_BIN;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_TUBELINK_PORT: u16 = 5000;
pub const DEFAULT_TUBELINK_HOST: &str = "0.0.0.0";
pub const DEFAULT_SESSION_SECRET: &str = "dev-secret-key";

/// Everything the server needs at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub host: String,
    pub port: u16,
    pub session_secret: String,
    pub ytdlp_bin: String,
    pub directory_url: String,
    pub pacing: Duration,
    pub www_root: Option<PathBuf>,
}

impl RuntimeSettings {
    pub fn uses_default_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }
}

/// Values given on the command line; they beat both the environment and the
/// `.env` file.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub www_root: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    Ok(build_runtime_settings(&file_vars, env_var_string, overrides))
}

/// Precedence: override, then process environment, then `.env`, then the
/// built-in default. Unparseable numbers count as unset.
fn build_runtime_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> RuntimeSettings {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let host = overrides
        .host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup("TUBELINK_HOST"))
        .unwrap_or_else(|| DEFAULT_TUBELINK_HOST.to_string());
    let port = overrides
        .port
        .or_else(|| lookup("TUBELINK_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_TUBELINK_PORT);
    let pacing = lookup("TUBELINK_PACING_MS")
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_PACING);
    let www_root = overrides
        .www_root
        .or_else(|| lookup("WWW_ROOT").map(PathBuf::from));

    RuntimeSettings {
        host,
        port,
        session_secret: lookup("SESSION_SECRET")
            .unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_string()),
        ytdlp_bin: lookup("YTDLP_BIN").unwrap_or_else(|| DEFAULT_YTDLP_BIN.to_string()),
        directory_url: lookup("TUBELINK_DIRECTORY_URL")
            .unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string()),
        pacing,
        www_root,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

/// Parses `KEY=value` lines. `export` prefixes, surrounding quotes, blank
/// lines and `#` comments are handled; anything else without `=` is skipped.
/// A missing file is not an error.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;

    let vars = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect();
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}
