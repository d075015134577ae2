//! One acquisition round: every configured source fetched concurrently,
//! all-or-nothing.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use rmx_model::{Route, SourceMap};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::fetch::{FetchError, FileSource, RouteSource, UrlSource};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that fail an acquisition round. One-shot callers treat them as
/// fatal; the refresh pipeline keeps serving the previous snapshot.
#[derive(Debug)]
pub enum AcquireError {
    /// The first source that failed; its siblings were aborted.
    Source(FetchError),
    /// The round did not finish inside its time budget.
    Timeout { limit: Duration },
    /// A fetch task panicked or was cancelled from outside.
    Task(String),
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::Source(e) => write!(f, "source fetch failed: {e}"),
            AcquireError::Timeout { limit } => {
                write!(f, "acquisition round exceeded {limit:?}")
            }
            AcquireError::Task(msg) => write!(f, "source task failed: {msg}"),
        }
    }
}

impl std::error::Error for AcquireError {}

impl From<FetchError> for AcquireError {
    fn from(e: FetchError) -> Self {
        AcquireError::Source(e)
    }
}

// ---------------------------------------------------------------------------
// Source set construction
// ---------------------------------------------------------------------------

/// Build the source set from configured file paths and URLs, in that order.
/// The location strings double as SourceMap labels.
pub fn build_sources(
    files: &[String],
    urls: &[String],
    client: &reqwest::Client,
) -> Vec<Box<dyn RouteSource>> {
    let mut sources: Vec<Box<dyn RouteSource>> = Vec::with_capacity(files.len() + urls.len());
    for path in files {
        sources.push(Box::new(FileSource::new(path.clone())));
    }
    for url in urls {
        sources.push(Box::new(UrlSource::new(client.clone(), url.clone())));
    }
    sources
}

// ---------------------------------------------------------------------------
// Fan-out / fan-in
// ---------------------------------------------------------------------------

/// Fetch every source concurrently and key the results by label.
///
/// Fail-fast: the first source error aborts every in-flight sibling and
/// fails the round; a partial SourceMap is never returned. The whole round
/// is bounded by `round_timeout`; hitting it drops (and thereby aborts) all
/// remaining fetch tasks.
///
/// Two sources configured with the same location string collide on one map
/// key. The later finisher overwrites the earlier one; the collision is
/// logged up front so the shadowing is at least visible.
pub async fn acquire_sources(
    sources: Vec<Box<dyn RouteSource>>,
    round_timeout: Duration,
) -> Result<SourceMap, AcquireError> {
    let mut labels: HashSet<String> = HashSet::with_capacity(sources.len());
    for src in &sources {
        if !labels.insert(src.label().to_string()) {
            warn!(
                label = src.label(),
                "duplicate source label, one fetch will shadow the other"
            );
        }
    }

    tokio::time::timeout(round_timeout, fan_in(sources))
        .await
        .map_err(|_| AcquireError::Timeout {
            limit: round_timeout,
        })?
}

async fn fan_in(sources: Vec<Box<dyn RouteSource>>) -> Result<SourceMap, AcquireError> {
    let mut tasks: JoinSet<Result<(String, Vec<Route>), FetchError>> = JoinSet::new();
    for src in sources {
        tasks.spawn(async move {
            let routes = src.fetch_routes().await?;
            Ok((src.label().to_string(), routes))
        });
    }

    let mut map = SourceMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((label, routes))) => {
                debug!(routes = routes.len(), src = %label, "registry source parsed");
                map.insert(label, routes);
            }
            Ok(Err(e)) => {
                tasks.abort_all();
                return Err(AcquireError::Source(e));
            }
            Err(e) => {
                tasks.abort_all();
                return Err(AcquireError::Task(e.to_string()));
            }
        }
    }

    Ok(map)
}
