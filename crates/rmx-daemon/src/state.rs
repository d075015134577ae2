//! Shared runtime state for rmx-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum. The refresh pipeline lives here too so
//! integration tests can drive it without the binary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rmx_engine::{merge, sort_canonical, MergePolicy};
use rmx_irr::{acquire_sources, build_sources};
use rmx_model::{Roa, RoaExport, SourceMap};
use rmx_rpki::fetch_export;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One published reconciliation result.
///
/// `encoded` is the exact JSON document served by `GET /export.json`. It is
/// rendered once per publication so handlers never re-serialize.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Pretty-printed ROA export, served verbatim.
    pub encoded: String,
    /// Number of ROAs in the published table.
    pub roas: usize,
    /// Publication counter; 1 for the first snapshot after boot.
    pub generation: u64,
    /// Wall-clock time of publication.
    pub refreshed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers and pipeline tasks.
#[derive(Clone)]
pub struct AppState {
    /// Static build metadata.
    pub build: BuildInfo,
    /// Merge policy fixed at startup.
    pub policy: MergePolicy,
    /// Latest parsed registry routes, keyed by source location.
    pub routes: Arc<RwLock<SourceMap>>,
    /// Latest authoritative ROA table.
    pub roas: Arc<RwLock<Vec<Roa>>>,
    /// Latest published snapshot; `None` until the first successful round.
    ///
    /// HTTP handlers touch only this cell; the input cells above belong to
    /// the producers and the reconciler.
    pub snapshot: Arc<RwLock<Option<Snapshot>>>,
    /// Rung by a producer after it replaces its cell. `Notify` stores at most
    /// one permit, so a burst of refreshes coalesces into one merge.
    pub updated: Arc<Notify>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(MergePolicy::default())
    }
}

impl AppState {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            build: BuildInfo {
                service: "rmx-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            policy,
            routes: Arc::new(RwLock::new(SourceMap::new())),
            roas: Arc::new(RwLock::new(Vec::new())),
            snapshot: Arc::new(RwLock::new(None)),
            updated: Arc::new(Notify::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Refresh pipeline
// ---------------------------------------------------------------------------

/// Spawn the registry producer.
///
/// Every `refresh` interval (first round fires immediately), fetch and parse
/// all configured registry sources, replace the route cell wholesale, and
/// ring `updated`. A failed round keeps the previous routes and waits for the
/// next tick; the whole round is bounded by `refresh` inside
/// [`acquire_sources`].
pub fn spawn_route_producer(
    state: Arc<AppState>,
    files: Vec<String>,
    urls: Vec<String>,
    client: reqwest::Client,
    refresh: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh);
        loop {
            ticker.tick().await;
            let sources = build_sources(&files, &urls, &client);
            match acquire_sources(sources, refresh).await {
                Ok(map) => {
                    debug!(sources = map.len(), "registry routes refreshed");
                    *state.routes.write().await = map;
                    state.updated.notify_one();
                }
                Err(e) => {
                    warn!(error = %e, "registry refresh failed; keeping previous routes");
                }
            }
        }
    });
}

/// Spawn the authoritative-export producer.
///
/// Same cadence and failure handling as the registry producer, but for the
/// single ROA export URL.
pub fn spawn_roa_producer(
    state: Arc<AppState>,
    client: reqwest::Client,
    url: String,
    refresh: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh);
        loop {
            ticker.tick().await;
            match tokio::time::timeout(refresh, fetch_export(&client, &url)).await {
                Ok(Ok(roas)) => {
                    debug!(roas = roas.len(), "authoritative export refreshed");
                    *state.roas.write().await = roas;
                    state.updated.notify_one();
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "export refresh failed; keeping previous table");
                }
                Err(_) => {
                    warn!(
                        limit_secs = refresh.as_secs(),
                        "export refresh timed out; keeping previous table"
                    );
                }
            }
        }
    });
}

/// Spawn the reconciler: each time `updated` is rung, merge the current
/// input cells into a fresh snapshot.
pub fn spawn_reconciler(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            state.updated.notified().await;
            publish_snapshot(&state).await;
        }
    });
}

/// Merge the current route and ROA cells and publish the result.
///
/// Reads clone both cells up front so no lock is held across the merge. On
/// merge or encode failure the prior snapshot is retained; serving a stale
/// table beats serving none.
pub async fn publish_snapshot(state: &AppState) {
    let routes = state.routes.read().await.clone();
    let roas = state.roas.read().await.clone();

    let mut merged = match merge(&roas, &routes, state.policy) {
        Ok(merged) => merged,
        Err(e) => {
            error!(error = %e, "reconcile failed; keeping previous snapshot");
            return;
        }
    };
    sort_canonical(&mut merged);

    let count = merged.len();
    let encoded = match RoaExport::new(merged).to_json_pretty() {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "export encoding failed; keeping previous snapshot");
            return;
        }
    };

    let mut cell = state.snapshot.write().await;
    let generation = cell.as_ref().map(|s| s.generation).unwrap_or(0) + 1;
    info!(roas = count, generation, "published reconciled export");
    *cell = Some(Snapshot {
        encoded,
        roas: count,
        generation,
        refreshed_at: Utc::now(),
    });
}
