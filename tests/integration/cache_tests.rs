//! Cache effectiveness integration tests.
//!
//! Tests verify:
//! - Repeat requests are answered from the cache without the database
//! - Stored entries use the shared key and value layout
//! - Empty results are never cached
//! - A failing or hanging cache only costs a database render
//! - Entries expire after one day

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use road_tiles::cache::{MemoryBackend, TileCache, TILE_CACHE_TTL};

use super::test_utils::{
    get, test_router, test_router_with, HangingCacheBackend, MockRoadSource, SourceMode,
    TrackingCacheBackend, ROADS_TILE,
};

// =============================================================================
// Tile Cache Effectiveness
// =============================================================================

#[tokio::test]
async fn test_repeat_requests_skip_database() {
    let source = MockRoadSource::new().with_tile(10, 500, 500, ROADS_TILE);
    let backend = Arc::new(TrackingCacheBackend::new());
    let router = test_router(source.clone(), backend.clone());

    for _ in 0..5 {
        let response = get(&router, "/api/tiles/10/500/500.mvt").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_ref(), ROADS_TILE);
    }

    assert_eq!(source.tile_requests(), 1);
    assert_eq!(backend.sets(), 1);
    assert_eq!(backend.gets(), 5);
}

#[tokio::test]
async fn test_different_tiles_cached_independently() {
    let source = MockRoadSource::new()
        .with_tile(2, 0, 0, &[0x1a, 0x01, 0x00])
        .with_tile(2, 1, 0, &[0x1a, 0x01, 0x01])
        .with_tile(2, 0, 1, &[0x1a, 0x01, 0x02]);
    let router = test_router(source.clone(), Arc::new(MemoryBackend::new()));

    for (uri, last) in [
        ("/api/tiles/2/0/0.mvt", 0x00),
        ("/api/tiles/2/1/0.mvt", 0x01),
        ("/api/tiles/2/0/1.mvt", 0x02),
    ] {
        let miss = get(&router, uri).await;
        let hit = get(&router, uri).await;
        assert_eq!(miss.body.last(), Some(&last));
        assert_eq!(hit.body.last(), Some(&last));
        assert_eq!(hit.header("x-tile-cache-hit"), Some("true"));
    }

    assert_eq!(source.tile_requests(), 3);
}

#[tokio::test]
async fn test_entry_layout() {
    let source = MockRoadSource::new().with_tile(14, 13_044, 7_188, ROADS_TILE);
    let backend = Arc::new(TrackingCacheBackend::new());
    let router = test_router(source, backend.clone());

    get(&router, "/api/tiles/14/13044/7188.mvt").await;

    let raw = backend.raw("tile:14:13044:7188").await.unwrap();
    assert_eq!(STANDARD.decode(raw).unwrap(), ROADS_TILE);
}

#[tokio::test]
async fn test_binary_payload_survives_cache() {
    let payload: Vec<u8> = (0..=255u8).collect();
    let source = MockRoadSource::new().with_tile(6, 10, 20, &payload);
    let router = test_router(source, Arc::new(MemoryBackend::new()));

    let miss = get(&router, "/api/tiles/6/10/20.mvt").await;
    let hit = get(&router, "/api/tiles/6/10/20.mvt").await;

    assert_eq!(miss.body.as_ref(), payload.as_slice());
    assert_eq!(hit.body.as_ref(), payload.as_slice());
    assert_eq!(hit.header("x-tile-cache-hit"), Some("true"));
}

#[tokio::test]
async fn test_empty_results_are_not_cached() {
    let source = MockRoadSource::new().with_null_tile(8, 1, 1);
    let backend = Arc::new(TrackingCacheBackend::new());
    let router = test_router(source.clone(), backend.clone());

    for _ in 0..3 {
        let response = get(&router, "/api/tiles/8/1/1.mvt").await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }

    assert_eq!(source.tile_requests(), 3);
    assert_eq!(backend.sets(), 0);
    assert!(backend.raw("tile:8:1:1").await.is_none());
}

#[tokio::test]
async fn test_invalid_coordinates_never_touch_cache() {
    let backend = Arc::new(TrackingCacheBackend::new());
    let router = test_router(MockRoadSource::new(), backend.clone());

    get(&router, "/api/tiles/3/8/0.mvt").await;
    get(&router, "/api/tiles/30/0/0.mvt").await;

    assert_eq!(backend.gets(), 0);
    assert_eq!(backend.sets(), 0);
}

#[tokio::test]
async fn test_corrupt_entry_is_replaced() {
    let source = MockRoadSource::new().with_tile(1, 0, 0, ROADS_TILE);
    let backend = Arc::new(TrackingCacheBackend::new());
    backend.put_raw("tile:1:0:0", "not base64 at all!").await;
    let router = test_router(source.clone(), backend.clone());

    let response = get(&router, "/api/tiles/1/0/0.mvt").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-tile-cache-hit"), Some("false"));
    assert_eq!(response.body.as_ref(), ROADS_TILE);

    let response = get(&router, "/api/tiles/1/0/0.mvt").await;
    assert_eq!(response.header("x-tile-cache-hit"), Some("true"));
    assert_eq!(source.tile_requests(), 1);
}

// =============================================================================
// Degraded Cache
// =============================================================================

#[tokio::test]
async fn test_cache_down_serves_from_database() {
    let source = MockRoadSource::new().with_tile(11, 1630, 910, ROADS_TILE);
    let backend = Arc::new(TrackingCacheBackend::new());
    backend.set_down(true);
    let router = test_router(source.clone(), backend.clone());

    for _ in 0..2 {
        let response = get(&router, "/api/tiles/11/1630/910.mvt").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("x-tile-cache-hit"), Some("false"));
        assert_eq!(response.body.as_ref(), ROADS_TILE);
    }
    assert_eq!(source.tile_requests(), 2);

    // Once the cache recovers, the next render is stored again
    backend.set_down(false);
    get(&router, "/api/tiles/11/1630/910.mvt").await;
    let response = get(&router, "/api/tiles/11/1630/910.mvt").await;
    assert_eq!(response.header("x-tile-cache-hit"), Some("true"));
    assert_eq!(source.tile_requests(), 3);
}

#[tokio::test]
async fn test_cache_and_database_down_is_500() {
    let source = MockRoadSource::new().with_tile(4, 3, 2, ROADS_TILE);
    source.set_mode(SourceMode::Down);
    let backend = Arc::new(TrackingCacheBackend::new());
    backend.set_down(true);
    let router = test_router(source, backend);

    let response = get(&router, "/api/tiles/4/3/2.mvt").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_cache_times_out() {
    let source = MockRoadSource::new().with_tile(13, 6500, 3600, ROADS_TILE);
    let cache = TileCache::with_timeout(Arc::new(HangingCacheBackend), Duration::from_millis(100));
    let router = test_router_with(source.clone(), cache, |service| service);

    let response = get(&router, "/api/tiles/13/6500/3600.mvt").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), ROADS_TILE);
    assert_eq!(source.tile_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_database_times_out() {
    let source = MockRoadSource::new().with_tile(13, 6500, 3600, ROADS_TILE);
    source.set_mode(SourceMode::Hang);
    let cache = TileCache::new(Arc::new(MemoryBackend::new()));
    let router = test_router_with(source, cache, |service| {
        service.with_source_timeout(Duration::from_secs(2))
    });

    let response = get(&router, "/api/tiles/13/6500/3600.mvt").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_entries_expire_after_one_day() {
    let source = MockRoadSource::new().with_tile(5, 25, 14, ROADS_TILE);
    let router = test_router(source.clone(), Arc::new(MemoryBackend::new()));

    get(&router, "/api/tiles/5/25/14.mvt").await;

    tokio::time::advance(TILE_CACHE_TTL - Duration::from_secs(60)).await;
    let response = get(&router, "/api/tiles/5/25/14.mvt").await;
    assert_eq!(response.header("x-tile-cache-hit"), Some("true"));
    assert_eq!(source.tile_requests(), 1);

    tokio::time::advance(Duration::from_secs(120)).await;
    let response = get(&router, "/api/tiles/5/25/14.mvt").await;
    assert_eq!(response.header("x-tile-cache-hit"), Some("false"));
    assert_eq!(source.tile_requests(), 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_requests_return_same_bytes() {
    let source = MockRoadSource::new().with_tile(15, 26_000, 14_000, ROADS_TILE);
    let router = test_router(source.clone(), Arc::new(MemoryBackend::new()));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move { get(&router, "/api/tiles/15/26000/14000.mvt").await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_ref(), ROADS_TILE);
    }

    // Cold misses may render more than once; afterwards the cache answers
    let renders = source.tile_requests();
    assert!((1..=10).contains(&renders));
    get(&router, "/api/tiles/15/26000/14000.mvt").await;
    assert_eq!(source.tile_requests(), renders);
}
