#![forbid(unsafe_code)]

//! HTTP entry point: resolves settings, wires the resolver and serves it
//! until Ctrl+C.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tubelink::api::{AppState, router};
use tubelink::config::{RuntimeOverrides, resolve_runtime_settings};

const DEFAULT_LOG_FILTER: &str = "tubelink=debug,info";

#[derive(Debug, Parser)]
#[command(name = "backend", about = "Video link resolver and search service")]
struct BackendArgs {
    /// Address to bind (overrides TUBELINK_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides TUBELINK_PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Directory of static frontend files (overrides WWW_ROOT).
    #[arg(long)]
    www_root: Option<PathBuf>,

    /// Path of the `.env` file to read.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl BackendArgs {
    fn into_overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            host: self.host,
            port: self.port,
            www_root: self.www_root,
            env_path: self.env_file,
        }
    }
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/TUBELINK_HOST")
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = BackendArgs::parse();
    init_tracing();

    let settings = resolve_runtime_settings(args.into_overrides())?;
    if settings.uses_default_secret() {
        warn!("SESSION_SECRET is not set; using the development default");
    }
    match &settings.www_root {
        Some(root) => info!(www_root = %root.display(), "serving static files"),
        None => info!("no WWW_ROOT configured; static files disabled"),
    }

    let host = parse_host_arg(&settings.host)?;
    let addr = SocketAddr::new(host, settings.port);
    let app = router(AppState::from_settings(&settings));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!(%addr, ytdlp = %settings.ytdlp_bin, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "failed to install Ctrl+C handler");
    }
}
