//! API integration tests for tile retrieval and the GeoJSON endpoints.
//!
//! Tests verify:
//! - Tile responses (200 / 204 / 400 / 500) and their headers
//! - GeoJSON, bounds, stats, health and index endpoints
//! - Error bodies never leak database details

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use road_tiles::cache::MemoryBackend;

use super::test_utils::{
    get, get_with_headers, sample_feature_collection, test_router, MockRoadSource, SourceMode,
    ROADS_TILE,
};

fn memory() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}

// =============================================================================
// Tiles
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let source = MockRoadSource::new().with_tile(10, 500, 500, ROADS_TILE);
    let router = test_router(source, memory());

    let response = get(&router, "/api/tiles/10/500/500.mvt").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-type"),
        Some("application/x-protobuf")
    );
    assert_eq!(
        response.header("cache-control"),
        Some("public, max-age=86400")
    );
    assert_eq!(response.body.as_ref(), ROADS_TILE);
}

#[tokio::test]
async fn test_tile_retrieval_without_mvt_extension() {
    let source = MockRoadSource::new().with_tile(3, 2, 1, ROADS_TILE);
    let router = test_router(source, memory());

    let response = get(&router, "/api/tiles/3/2/1").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), ROADS_TILE);
}

#[tokio::test]
async fn test_cache_hit_header() {
    let source = MockRoadSource::new().with_tile(12, 3263, 1823, ROADS_TILE);
    let router = test_router(source.clone(), memory());

    let first = get(&router, "/api/tiles/12/3263/1823.mvt").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header("x-tile-cache-hit"), Some("false"));

    let second = get(&router, "/api/tiles/12/3263/1823.mvt").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.header("x-tile-cache-hit"), Some("true"));
    assert_eq!(second.body, first.body);

    assert_eq!(source.tile_requests(), 1);
}

#[tokio::test]
async fn test_empty_tile_is_no_content() {
    let source = MockRoadSource::new().with_null_tile(5, 10, 10);
    let router = test_router(source.clone(), memory());

    let response = get(&router, "/api/tiles/5/10/10.mvt").await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());

    // Coordinates the database knows nothing about are empty too
    let response = get(&router, "/api/tiles/5/11/10.mvt").await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_zero_length_tile_is_no_content() {
    let source = MockRoadSource::new().with_tile(7, 100, 50, &[]);
    let router = test_router(source, memory());

    let response = get(&router, "/api/tiles/7/100/50.mvt").await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_tile_bytes_are_never_gzipped() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let source = MockRoadSource::new().with_tile(8, 200, 100, &payload);
    let router = test_router(source, memory());

    for _ in 0..2 {
        let response =
            get_with_headers(&router, "/api/tiles/8/200/100.mvt", &[("accept-encoding", "gzip")])
                .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("content-encoding"), None);
        assert_eq!(response.body.as_ref(), payload.as_slice());
    }
}

#[tokio::test]
async fn test_json_responses_are_gzipped_on_request() {
    let router = test_router(MockRoadSource::new(), memory());

    let response = get_with_headers(&router, "/api/roads", &[("accept-encoding", "gzip")]).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-encoding"), Some("gzip"));
}

// =============================================================================
// Tiles - Invalid Coordinates
// =============================================================================

#[tokio::test]
async fn test_tile_index_out_of_range() {
    let source = MockRoadSource::new();
    let router = test_router(source.clone(), memory());

    let response = get(&router, "/api/tiles/3/8/0.mvt").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert_eq!(body["error"], "invalid_coordinates");
    assert_eq!(body["status"], 400);
    assert_eq!(source.tile_requests(), 0);
}

#[tokio::test]
async fn test_zoom_out_of_range() {
    let source = MockRoadSource::new();
    let router = test_router(source.clone(), memory());

    for uri in ["/api/tiles/23/0/0.mvt", "/api/tiles/-1/0/0.mvt"] {
        let response = get(&router, uri).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert_eq!(source.tile_requests(), 0);
}

#[tokio::test]
async fn test_negative_and_non_numeric_coordinates() {
    let source = MockRoadSource::new();
    let router = test_router(source.clone(), memory());

    for uri in [
        "/api/tiles/4/-1/0.mvt",
        "/api/tiles/4/0/-1.mvt",
        "/api/tiles/abc/0/0.mvt",
        "/api/tiles/4/x/0.mvt",
        "/api/tiles/4/0/zero.mvt",
        "/api/tiles/4/0/0.png",
    ] {
        let response = get(&router, uri).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(response.json()["error"], "invalid_coordinates", "{uri}");
    }
    assert_eq!(source.tile_requests(), 0);
}

#[tokio::test]
async fn test_tile_corners_at_max_zoom() {
    let max = (1u32 << 22) - 1;
    let source = MockRoadSource::new().with_tile(22, max, max, ROADS_TILE);
    let router = test_router(source, memory());

    let response = get(&router, &format!("/api/tiles/22/{max}/{max}.mvt")).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = get(&router, &format!("/api/tiles/22/{}/0.mvt", max + 1)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Tiles - Database Failures
// =============================================================================

#[tokio::test]
async fn test_database_failure_is_generic_500() {
    let source = MockRoadSource::new().with_tile(4, 3, 2, ROADS_TILE);
    source.set_mode(SourceMode::Down);
    let router = test_router(source, memory());

    let response = get(&router, "/api/tiles/4/3/2.mvt").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json();
    assert_eq!(body["error"], "internal_error");
    let message = body["message"].as_str().unwrap();
    assert!(!message.contains("ECONNREFUSED"));
    assert!(!message.contains("5432"));
}

#[tokio::test]
async fn test_database_failure_is_not_an_empty_tile() {
    let source = MockRoadSource::new();
    source.set_mode(SourceMode::Down);
    let router = test_router(source, memory());

    let response = get(&router, "/api/tiles/0/0/0.mvt").await;
    assert_ne!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_cached_tile_served_while_database_down() {
    let source = MockRoadSource::new().with_tile(9, 400, 220, ROADS_TILE);
    let router = test_router(source.clone(), memory());

    assert_eq!(get(&router, "/api/tiles/9/400/220.mvt").await.status, StatusCode::OK);

    source.set_mode(SourceMode::Down);
    let response = get(&router, "/api/tiles/9/400/220.mvt").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-tile-cache-hit"), Some("true"));
}

// =============================================================================
// GeoJSON and Statistics
// =============================================================================

#[tokio::test]
async fn test_roads_endpoint() {
    let router = test_router(MockRoadSource::new(), memory());

    let response = get(&router, "/api/roads").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), sample_feature_collection());
}

#[tokio::test]
async fn test_roads_endpoint_database_down() {
    let source = MockRoadSource::new();
    source.set_mode(SourceMode::Down);
    let router = test_router(source, memory());

    let response = get(&router, "/api/roads").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["message"], "Failed fetching roads");
}

#[tokio::test]
async fn test_roads_by_bounds() {
    let source = MockRoadSource::new();
    let router = test_router(source.clone(), memory());

    let response = get(
        &router,
        "/api/roads/bounds?minLng=105.7&minLat=20.9&maxLng=106.0&maxLat=21.2",
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["type"], "FeatureCollection");

    let requests = source.bounds_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].min_lng, 105.7);
    assert_eq!(requests[0].max_lat, 21.2);
}

#[tokio::test]
async fn test_roads_by_bounds_missing_parameter() {
    let source = MockRoadSource::new();
    let router = test_router(source.clone(), memory());

    let response = get(&router, "/api/roads/bounds?minLng=105.7&minLat=20.9&maxLng=106.0").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json()["message"],
        "Missing required parameters: minLng, minLat, maxLng, maxLat"
    );
    assert!(source.bounds_requests().is_empty());
}

#[tokio::test]
async fn test_roads_by_bounds_invalid_number() {
    let router = test_router(MockRoadSource::new(), memory());

    let response = get(
        &router,
        "/api/roads/bounds?minLng=west&minLat=20.9&maxLng=106.0&maxLat=21.2",
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_coordinates");
}

#[tokio::test]
async fn test_stats_endpoint() {
    let router = test_router(MockRoadSource::new(), memory());

    let response = get(&router, "/api/stats").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({
            "total_roads": 1,
            "road_types": 1,
            "bounds": "BOX(105.8 21,105.9 21.1)",
            "total_length_km": 12.5
        })
    );
}

// =============================================================================
// Health and Index
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let source = MockRoadSource::new();
    source.set_mode(SourceMode::Down);
    let router = test_router(source, memory());

    let response = get(&router, "/api/health").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_index_endpoint() {
    let router = test_router(MockRoadSource::new(), memory());

    let response = get(&router, "/").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["endpoints"]["tiles"], "/api/tiles/{z}/{x}/{y}.mvt");
    assert_eq!(
        body["documentation"]["tilejson"]["tiles"][0],
        "http://tiles.test/api/tiles/{z}/{x}/{y}.mvt"
    );
}

#[tokio::test]
async fn test_unknown_route() {
    let router = test_router(MockRoadSource::new(), memory());
    let response = get(&router, "/api/layers").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
