//! Scenario: Source Acquisition Round
//!
//! # Invariants under test
//!
//! 1. Every configured source is fetched and lands under its own location
//!    string as the SourceMap key.
//! 2. Gzipped mirrors (`.gz` locations) are decompressed transparently.
//! 3. One failing source fails the whole round; no partial SourceMap.
//! 4. A round that exceeds its time budget fails with Timeout.
//! 5. Two sources with the same location collide onto one key.
//! 6. A mirror serving garbage fails the round with a parse error that
//!    names the mirror.
//!
//! HTTP upstreams are mocked in-process; no real network involved.

use std::io::Write;
use std::time::Duration;

use httpmock::prelude::*;
use rmx_irr::{acquire_sources, build_sources, AcquireError, FetchError};

const DUMP_A: &str = "route: 192.0.2.0/24\norigin: AS64500\n";
const DUMP_B: &str = "route6: 2001:db8::/32\norigin: AS64501\n";

const ROUND: Duration = Duration::from_secs(5);

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

// ---------------------------------------------------------------------------
// 1. Mixed file + URL round, keyed by location
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mixed_sources_land_under_their_location_labels() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/radb.db");
            then.status(200).body(DUMP_B);
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("local.db");
    std::fs::write(&file_path, DUMP_A).unwrap();
    let file_loc = file_path.to_str().unwrap().to_string();
    let url_loc = server.url("/radb.db");

    let sources = build_sources(
        &[file_loc.clone()],
        &[url_loc.clone()],
        &reqwest::Client::new(),
    );
    let map = acquire_sources(sources, ROUND).await.unwrap();

    assert_eq!(map.len(), 2);
    assert_eq!(map[&file_loc].len(), 1);
    assert_eq!(map[&file_loc][0].origin, "AS64500");
    assert_eq!(map[&url_loc].len(), 1);
    assert_eq!(map[&url_loc][0].origin, "AS64501");
    mock.assert_async().await;
}

// ---------------------------------------------------------------------------
// 2. Gzipped mirror
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gzipped_mirror_is_decompressed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/radb.db.gz");
            then.status(200).body(gzip(DUMP_A.as_bytes()));
        })
        .await;

    let sources = build_sources(&[], &[server.url("/radb.db.gz")], &reqwest::Client::new());
    let map = acquire_sources(sources, ROUND).await.unwrap();

    assert_eq!(map.len(), 1);
    assert_eq!(map[&server.url("/radb.db.gz")][0].origin, "AS64500");
}

// ---------------------------------------------------------------------------
// 3. Fail-fast: one bad source fails the round
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_failing_source_fails_the_whole_round() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/good.db");
            then.status(200).body(DUMP_A);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/bad.db");
            then.status(500);
        })
        .await;

    let sources = build_sources(
        &[],
        &[server.url("/good.db"), server.url("/bad.db")],
        &reqwest::Client::new(),
    );
    let err = acquire_sources(sources, ROUND).await.unwrap_err();

    match err {
        AcquireError::Source(FetchError::Status { src, status }) => {
            assert_eq!(src, server.url("/bad.db"));
            assert_eq!(status, 500);
        }
        other => panic!("expected Source(Status), got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 4. Round timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_source_trips_the_round_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow.db");
            then.status(200).delay(Duration::from_secs(2)).body(DUMP_A);
        })
        .await;

    let sources = build_sources(&[], &[server.url("/slow.db")], &reqwest::Client::new());
    let err = acquire_sources(sources, Duration::from_millis(150))
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::Timeout { .. }));
}

// ---------------------------------------------------------------------------
// 5. Label collision
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_locations_collapse_onto_one_key() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("local.db");
    std::fs::write(&file_path, DUMP_A).unwrap();
    let loc = file_path.to_str().unwrap().to_string();

    let sources = build_sources(&[loc.clone(), loc.clone()], &[], &reqwest::Client::new());
    let map = acquire_sources(sources, ROUND).await.unwrap();

    assert_eq!(map.len(), 1, "same location twice is one key");
    assert_eq!(map[&loc].len(), 1);
}

// ---------------------------------------------------------------------------
// 6. Mirror serving garbage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn garbage_from_a_mirror_names_the_mirror() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/radb.db");
            then.status(200).body("route: no good\n");
        })
        .await;

    let sources = build_sources(&[], &[server.url("/radb.db")], &reqwest::Client::new());
    let err = acquire_sources(sources, ROUND).await.unwrap_err();

    match err {
        AcquireError::Source(FetchError::Parse { src, .. }) => {
            assert_eq!(src, server.url("/radb.db"));
        }
        other => panic!("expected Source(Parse), got {other:?}"),
    }
}
