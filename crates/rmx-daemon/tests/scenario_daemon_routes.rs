//! In-process scenario tests for rmx-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`, so no network I/O is required.  The snapshot
//! is seeded by calling `state::publish_snapshot` directly, the same function
//! the reconciler task runs.

use std::sync::Arc;

use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use rmx_daemon::{routes, state};
use rmx_engine::MergePolicy;
use rmx_model::{Roa, Route};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a fresh in-process router backed by a clean AppState.
fn make_router() -> axum::Router {
    let st = Arc::new(state::AppState::new(MergePolicy::Safe));
    routes::build_router(st)
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

/// Parse body bytes as a `serde_json::Value`.
fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

/// AppState with one authoritative ROA and one uncovered registry route,
/// ready for `publish_snapshot`.
async fn seeded_state() -> Arc<state::AppState> {
    let st = Arc::new(state::AppState::new(MergePolicy::Safe));
    {
        let mut roas = st.roas.write().await;
        roas.push(Roa::new("10.0.0.0/8", 8, "AS65000", "ARIN"));
    }
    {
        let mut routes = st.routes.write().await;
        routes.insert(
            "radb.db".to_string(),
            vec![Route::new("192.0.2.0/24".parse().unwrap(), "AS64500")],
        );
    }
    st
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (status, body) = call(make_router(), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "rmx-daemon");
}

// ---------------------------------------------------------------------------
// GET /export.json before the first publication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_returns_503_until_first_publication() {
    let (status, body) = call(make_router(), get("/export.json")).await;
    assert_eq!(
        status,
        StatusCode::SERVICE_UNAVAILABLE,
        "an unpublished daemon must refuse, not serve an empty table"
    );

    let json = parse_json(body);
    assert!(
        json["error"].as_str().unwrap_or("").contains("no export"),
        "body should explain the refusal: {json}"
    );
}

// ---------------------------------------------------------------------------
// GET /export.json after publication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_serves_published_snapshot_verbatim() {
    let st = seeded_state().await;
    state::publish_snapshot(&st).await;

    let expected = st
        .snapshot
        .read()
        .await
        .as_ref()
        .expect("publish_snapshot must install a snapshot")
        .encoded
        .clone();

    let resp = routes::build_router(Arc::clone(&st))
        .oneshot(get("/export.json"))
        .await
        .expect("oneshot failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        expected,
        "handler must serve the published document byte-for-byte"
    );

    // The table carries both the authoritative entry and the synthesized one.
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let roas = json["roas"].as_array().unwrap();
    assert_eq!(roas.len(), 2);
    assert_eq!(roas[0]["ta"], "radb.db");
    assert_eq!(roas[1]["ta"], "ARIN");
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_unpublished_state() {
    let (status, body) = call(make_router(), get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["published"], false);
    assert_eq!(json["generation"], 0);
    assert_eq!(json["roas"], 0);
    assert!(json["refreshed_at"].is_null());
}

#[tokio::test]
async fn status_tracks_generation_across_publications() {
    let st = seeded_state().await;

    state::publish_snapshot(&st).await;
    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/v1/status")).await;
    let json = parse_json(body);
    assert_eq!(json["published"], true);
    assert_eq!(json["generation"], 1);
    assert_eq!(json["roas"], 2);
    assert!(!json["refreshed_at"].is_null());

    state::publish_snapshot(&st).await;
    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/v1/status")).await;
    let json = parse_json(body);
    assert_eq!(
        json["generation"], 2,
        "each publication must bump the generation"
    );
}

// ---------------------------------------------------------------------------
// Unknown routes return 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let (status, _) = call(make_router(), get("/v1/does_not_exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
