//! Response types for all rmx-daemon HTTP endpoints.
//!
//! These types are JSON-encoded by Axum and decoded by tests.  No business
//! logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

/// Point-in-time view of the refresh pipeline, returned by GET /v1/status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    /// false until the first reconciliation round publishes a snapshot.
    pub published: bool,
    /// Publication counter; 0 while unpublished.
    pub generation: u64,
    /// ROAs in the published table; 0 while unpublished.
    pub roas: usize,
    /// Publication time of the served snapshot, if any.
    pub refreshed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Error body (export.json before first publication)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
