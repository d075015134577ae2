//! rmx-daemon entry point.
//!
//! This file is intentionally thin: it resolves configuration, sets up
//! tracing, builds the shared state, spawns the refresh pipeline, wires
//! middleware, and starts the HTTP server.  All route handlers live in
//! `routes.rs`; shared state and the pipeline live in `state.rs`.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use rmx_config::{load_file_config, Overrides, Settings};
use rmx_daemon::{routes, state};
use rmx_engine::MergePolicy;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

/// Serve a continuously refreshed reconciled ROA export over HTTP.
#[derive(Debug, Parser)]
#[command(name = "rmx-daemon", version)]
struct Args {
    /// Path to a YAML config file (default: ./roamix.yaml, then /etc/roamix/roamix.yaml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Local registry dump to reconcile against (repeatable).
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: Vec<String>,

    /// Registry dump URL to reconcile against, http(s) or ftp (repeatable).
    #[arg(short = 'i', long = "irrdb", value_name = "URL")]
    irrdb: Vec<String>,

    /// Authoritative ROA export URL.
    #[arg(short = 'r', long = "rpki", value_name = "URL")]
    rpki: Option<String>,

    /// Listen address, host:port.
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Seconds between refresh rounds.
    #[arg(short = 'R', long = "refresh-secs", value_name = "SECS")]
    refresh_secs: Option<u64>,

    /// Append covered registry routes instead of dropping them.
    #[arg(long = "unsafe")]
    unsafe_merge: bool,

    /// Force debug-level logging regardless of RUST_LOG.
    #[arg(short = 'd', long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let args = Args::parse();
    init_tracing(args.debug);

    let (file_cfg, cfg_path) = load_file_config(args.config.as_deref())?;
    if let Some(path) = &cfg_path {
        info!(config = %path.display(), "loaded config file");
    }
    let settings = Settings::resolve(
        file_cfg,
        Overrides {
            files: args.file,
            urls: args.irrdb,
            rpki: args.rpki,
            refresh_secs: args.refresh_secs,
            unsafe_merge: args.unsafe_merge,
            listen: args.listen,
            output: None,
        },
    )?;

    let policy = if settings.unsafe_merge {
        MergePolicy::Unsafe
    } else {
        MergePolicy::Safe
    };
    let shared = Arc::new(state::AppState::new(policy));

    let client = reqwest::Client::new();
    state::spawn_route_producer(
        Arc::clone(&shared),
        settings.files.clone(),
        settings.urls.clone(),
        client.clone(),
        settings.refresh,
    );
    state::spawn_roa_producer(
        Arc::clone(&shared),
        client,
        settings.rpki.clone(),
        settings.refresh,
    );
    state::spawn_reconciler(Arc::clone(&shared));

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = bind_addr(&settings.listen)?;
    info!("rmx-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// `RMX_DAEMON_ADDR` overrides the configured listen address.
fn bind_addr(listen: &str) -> anyhow::Result<SocketAddr> {
    let raw = std::env::var("RMX_DAEMON_ADDR").unwrap_or_else(|_| listen.to_string());
    raw.parse()
        .with_context(|| format!("bad listen address '{raw}'"))
}
