//! HTTP surface tests
//!
//! Exercise the full router against the in-memory store and cache: lookups,
//! the read-through path, creation, and readiness.

use axum::http::StatusCode;
use orderflow_storage::OrderRepository;
use orderflow_test_utils::{order_with_items, sample_order};
use serde_json::json;

#[path = "support/harness.rs"]
mod test_harness;
#[path = "support/http.rs"]
mod test_http;

use test_harness::Harness;
use test_http::{get, json, post_json};

// ============================================================================
// GET /order/{order_uid}
// ============================================================================

#[tokio::test]
async fn test_get_returns_stored_json() {
    let h = Harness::new();
    let order = order_with_items("A1", 2);
    h.repo.seed(order.clone()).unwrap();

    let (status, body) = get(h.router(), "/order/A1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, order.to_json().unwrap());
}

#[tokio::test]
async fn test_get_twice_is_byte_stable_and_uses_cache() {
    let h = Harness::new();
    h.repo.seed(sample_order("A1")).unwrap();

    let (_, first) = get(h.router(), "/order/A1").await;
    let (status, second) = get(h.router(), "/order/A1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(h.repo.get_by_uid_calls(), 1);
    assert!(h.cache.contains("A1"));
}

#[tokio::test]
async fn test_get_unknown_order_is_404() {
    let h = Harness::new();

    let (status, body) = get(h.router(), "/order/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body), json!({ "error": "order not found" }));
}

#[tokio::test]
async fn test_get_without_uid_is_400() {
    let h = Harness::new();

    for uri in ["/order/", "/order", "/order/%20%20"] {
        let (status, body) = get(h.router(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri = {}", uri);
        assert_eq!(json(&body), json!({ "error": "order_uid is required" }));
    }
}

#[tokio::test]
async fn test_get_looks_up_uid_verbatim() {
    let h = Harness::new();
    h.repo.seed(sample_order("A1")).unwrap();

    for uri in ["/order/%20A1", "/order/A1%20"] {
        let (status, body) = get(h.router(), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri = {}", uri);
        assert_eq!(json(&body), json!({ "error": "order not found" }));
    }

    let padded = sample_order(" A1");
    h.repo.seed(padded.clone()).unwrap();
    let (status, body) = get(h.router(), "/order/%20A1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, padded.to_json().unwrap());
}

#[tokio::test]
async fn test_get_with_store_down_on_miss_is_500() {
    let h = Harness::new();
    h.repo.seed(sample_order("A1")).unwrap();
    h.repo.set_unavailable(true);

    let (status, body) = get(h.router(), "/order/A1").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body), json!({ "error": "failed to get order" }));
}

#[tokio::test]
async fn test_get_with_cache_down_reads_store() {
    let h = Harness::new();
    let order = sample_order("A1");
    h.repo.seed(order.clone()).unwrap();
    h.cache.set_unavailable(true);

    let (status, body) = get(h.router(), "/order/A1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, order.to_json().unwrap());
}

#[tokio::test]
async fn test_warm_boot_serves_without_store() {
    let h = Harness::new();
    let uids = ["W1", "W2", "W3"];
    for uid in uids {
        h.repo.seed(sample_order(uid)).unwrap();
    }

    let report = h.state.cache_warmer().execute().await.unwrap();
    assert_eq!((report.success_count, report.total_count), (3, 3));

    h.repo.set_unavailable(true);
    for uid in uids {
        let (status, _) = get(h.router(), &format!("/order/{}", uid)).await;
        assert_eq!(status, StatusCode::OK, "uid = {}", uid);
    }
    assert_eq!(h.repo.get_by_uid_calls(), 0);
}

// ============================================================================
// POST /orders
// ============================================================================

#[tokio::test]
async fn test_post_creates_order() {
    let h = Harness::new();
    let order = sample_order("P1");

    let (status, body) = post_json(h.router(), "/orders", order.to_json().unwrap()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json(&body), json!({ "order_uid": "P1", "status": "created" }));
    assert!(h.repo.get_by_uid("P1").await.unwrap().same_aggregate(&order));
    assert!(h.cache.contains("P1"));
}

#[tokio::test]
async fn test_post_then_get_round_trip() {
    let h = Harness::new();
    let order = order_with_items("P1", 3);

    let (status, _) = post_json(h.router(), "/orders", order.to_json().unwrap()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = get(h.router(), "/order/P1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, order.to_json().unwrap());
}

#[tokio::test]
async fn test_post_duplicate_is_409() {
    let h = Harness::new();
    let order = sample_order("P1");
    h.repo.seed(order.clone()).unwrap();

    let (status, body) = post_json(h.router(), "/orders", order.to_json().unwrap()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body), json!({ "error": "order already exists" }));
    assert_eq!(h.repo.len(), 1);
}

#[tokio::test]
async fn test_post_losing_unique_key_race_is_409() {
    let h = Harness::new();
    let order = sample_order("P1");
    h.repo.seed(order.clone()).unwrap();
    h.repo.set_stale_exists(true);

    let (status, body) = post_json(h.router(), "/orders", order.to_json().unwrap()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body), json!({ "error": "order already exists" }));
    assert_eq!(h.repo.save_calls(), 1);
}

#[tokio::test]
async fn test_post_invalid_order_is_400() {
    let h = Harness::new();
    let mut order = sample_order("P1");
    order.items.clear();

    let (status, body) = post_json(h.router(), "/orders", order.to_json().unwrap()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body), json!({ "error": "invalid order data" }));
    assert!(h.repo.is_empty());
}

#[tokio::test]
async fn test_post_malformed_body_is_400() {
    let h = Harness::new();

    let (status, body) = post_json(h.router(), "/orders", r#"{"order_uid": "#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body), json!({ "error": "invalid request body" }));
}

#[tokio::test]
async fn test_post_with_store_down_is_500() {
    let h = Harness::new();
    h.repo.set_unavailable(true);

    let (status, body) =
        post_json(h.router(), "/orders", sample_order("P1").to_json().unwrap()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body), json!({ "error": "internal server error" }));
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn test_ready_when_everything_is_up() {
    let h = Harness::new();

    let (status, body) = get(h.router(), "/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["details"]["store"]["status"], "healthy");
    assert_eq!(body["details"]["cache"]["status"], "healthy");
}

#[tokio::test]
async fn test_ready_degraded_without_cache() {
    let h = Harness::new();
    h.cache.set_unavailable(true);

    let (status, body) = get(h.router(), "/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["details"]["cache"]["status"], "degraded");
}

#[tokio::test]
async fn test_not_ready_without_store() {
    let h = Harness::new();
    h.repo.set_unavailable(true);

    let (status, body) = get(h.router(), "/health/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(&body)["status"], "unhealthy");
}

#[tokio::test]
async fn test_ping_and_live() {
    let h = Harness::new();

    let (status, body) = get(h.router(), "/health/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pong");

    let (status, body) = get(h.router(), "/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "healthy");
}
