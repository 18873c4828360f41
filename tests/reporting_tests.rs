//! Summaries, text rendering, clear, and the dashboard routes.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use common::{enabled_config, meta, sample, tracker_with, ScriptedProbe};
use memhealth::reporting::Reporter;
use memhealth::{server, AppState, Config, TrackType};

#[tokio::test]
async fn summary_carries_stats_max_and_top() {
    let (tracker, _) = tracker_with(enabled_config());
    for (i, diff) in [4.0, 11.0, 2.5].into_iter().enumerate() {
        tracker
            .track(&sample(diff), TrackType::Web, meta(&format!("/s/{i}")))
            .await
            .unwrap();
    }
    let reporter = Reporter::new(Arc::clone(&tracker));

    let summary = reporter.summary(TrackType::Web, Some(2)).await.unwrap();
    assert!(summary.enabled);
    let stats = summary.stats.unwrap();
    assert_eq!(stats.stored_count, 3);
    assert_eq!(stats.max_stored, 20);
    assert_eq!(stats.max_memory_diff, 11.0);
    assert_eq!(summary.max_item.unwrap().subject(), Some("/s/1"));
    assert_eq!(summary.top_items.len(), 2);
}

#[tokio::test]
async fn disabled_summary_is_empty() {
    let (tracker, _) = tracker_with(Config::default());
    let summary = Reporter::new(tracker).summary(TrackType::Worker, None).await.unwrap();
    assert!(!summary.enabled);
    assert!(summary.stats.is_none());
    assert!(summary.top_items.is_empty());
}

#[tokio::test]
async fn text_lists_top_items_with_memory_range() {
    let (tracker, _) = tracker_with(enabled_config());
    tracker.track(&sample(9.5), TrackType::Web, meta("/heavy")).await.unwrap();
    let text = Reporter::new(tracker).render_text(TrackType::Web).await.unwrap();

    assert!(text.contains("Max memory difference: 9.5 MB"));
    assert!(text.contains("Stored URLs: 1/20"));
    assert!(text.contains("1. 9.5 MB (200 → 209.5 MB) - /heavy"));
}

#[tokio::test]
async fn clear_reports_previous_counts() {
    let (tracker, _) = tracker_with(enabled_config());
    tracker.track(&sample(7.0), TrackType::Web, meta("/a")).await.unwrap();
    tracker.track(&sample(3.0), TrackType::Web, meta("/b")).await.unwrap();
    let reporter = Reporter::new(Arc::clone(&tracker));

    let message = reporter.clear().await;
    assert!(message.starts_with("✅"), "{message}");
    assert!(message.contains("Cleared 2 URLs"));
    assert!(message.contains("from 7 MB"));
    assert_eq!(tracker.stats(TrackType::Web).await.unwrap().stored_count, 0);
}

#[tokio::test]
async fn clear_failure_becomes_a_message() {
    let (tracker, store) = tracker_with(enabled_config());
    store.set_offline(true);
    let message = Reporter::new(tracker).clear().await;
    assert!(message.starts_with("❌ Error clearing memory statistics"), "{message}");
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn dashboard_routes_serve_summary_and_clear() {
    let (tracker, _) = tracker_with(enabled_config());
    tracker.track(&sample(5.0), TrackType::Worker, meta("job")).await.unwrap();
    let state = Arc::new(AppState::new(tracker, ScriptedProbe::new(&[])));
    let app = server::create_router(state);

    let req = Request::builder()
        .uri("/memhealth/api/summary?view=worker")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["track_type"], "worker");
    assert_eq!(json["stats"]["stored_count"], 1);

    let req = Request::builder()
        .uri("/memhealth/api/summary?view=nope")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("POST")
        .uri("/memhealth/api/clear")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["message"].as_str().unwrap().contains("Cleared 0 URLs and 1 jobs"));
}

#[tokio::test]
async fn summary_route_accepts_an_oversized_limit() {
    let (tracker, _) = tracker_with(enabled_config());
    for (i, diff) in [3.0, 5.0, 8.0].into_iter().enumerate() {
        tracker
            .track(&sample(diff), TrackType::Web, meta(&format!("/l/{i}")))
            .await
            .unwrap();
    }
    let app = server::create_router(Arc::new(AppState::new(tracker, ScriptedProbe::new(&[]))));

    let req = Request::builder()
        .uri(format!("/memhealth/api/summary?limit={}", usize::MAX))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["top_items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn demo_routes_are_instrumented() {
    let (tracker, _) = tracker_with(enabled_config());
    let probe = ScriptedProbe::growing(1, 120.0, 3.0);
    let state = Arc::new(AppState::new(Arc::clone(&tracker), probe));
    let app = server::create_router(state);

    let req = Request::builder().uri("/api/ping").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats = tracker.stats(TrackType::Web).await.unwrap();
    assert_eq!(stats.total_count, 1);
    assert_eq!(stats.stored_count, 1);
}
