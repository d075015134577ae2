//! Axum router and all HTTP handlers for rmx-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers, and the scenario tests in `tests/` drive it bare. The
//! handlers themselves stay `pub(crate)`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::{
    api_types::{ErrorResponse, HealthResponse, StatusResponse},
    state::{uptime_secs, AppState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (tracing) are **not** applied here; `main.rs` attaches
/// them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/export.json", get(export))
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /export.json
// ---------------------------------------------------------------------------

/// Serve the latest published export verbatim.
///
/// Until the first reconciliation round completes there is nothing to serve;
/// respond 503 with a JSON error body rather than an empty table, so a
/// validator never mistakes "not ready yet" for "zero ROAs".
pub(crate) async fn export(State(st): State<Arc<AppState>>) -> Response {
    let snap = st.snapshot.read().await;
    match snap.as_ref() {
        Some(s) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            s.encoded.clone(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "no export published yet; first refresh round still running".to_string(),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.snapshot.read().await.clone();
    let resp = match snap {
        Some(s) => StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            published: true,
            generation: s.generation,
            roas: s.roas,
            refreshed_at: Some(s.refreshed_at),
        },
        None => StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            published: false,
            generation: 0,
            roas: 0,
            refreshed_at: None,
        },
    };
    (StatusCode::OK, Json(resp))
}
