//! HTTP tests for the Rally server, against in-memory collaborators.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum_test::TestServer;
use rally_core::{AttendanceManager, Event, EventId, Identity, RepositoryError, TokenVerifier};
use rally_runtime::metrics::MetricsRecorder;
use rally_runtime::{Broadcaster, EventService, HealthCheck, RetryPolicy, Subscriptions};
use rally_server::server::ReadinessProbe;
use rally_server::{build_router, AppState};
use rally_testing::{fixtures, test_clock, InMemoryEventRepository, StaticTokenVerifier};
use rally_web::{Realtime, CORRELATION_ID_HEADER};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";
const CAROL: &str = "carol-token";
const EXPIRED: &str = "expired-token";

struct Harness {
    server: TestServer,
    repository: Arc<InMemoryEventRepository>,
    subscriptions: Subscriptions,
    alice: Identity,
    bob: Identity,
    state: AppState,
}

fn harness() -> Harness {
    harness_with_probes(Vec::new())
}

fn harness_with_probes(probes: Vec<Arc<dyn ReadinessProbe>>) -> Harness {
    let repository = Arc::new(InMemoryEventRepository::new());
    let broadcaster = Broadcaster::new(8);
    let subscriptions = broadcaster.subscriptions();

    let attendance = AttendanceManager::new(repository.clone(), Arc::new(test_clock()))
        .with_timeout(Duration::from_secs(1));
    let service = EventService::new(attendance, Arc::new(broadcaster)).with_read_retry(
        RetryPolicy::builder()
            .max_retries(1)
            .initial_delay(Duration::from_millis(1))
            .build(),
    );

    let alice = fixtures::identity();
    let bob = fixtures::identity();
    let verifier: Arc<dyn TokenVerifier> = Arc::new(
        StaticTokenVerifier::new()
            .with_token(ALICE, alice.clone())
            .with_token(BOB, bob.clone())
            .with_token(CAROL, fixtures::identity())
            .with_token(EXPIRED, fixtures::expired_identity()),
    );

    let state = AppState::new(
        service,
        verifier,
        Realtime::new(subscriptions.clone(), 4),
        MetricsRecorder::detached(),
    )
    .with_probes(probes);

    Harness {
        server: TestServer::new(build_router(state.clone())).unwrap(),
        repository,
        subscriptions,
        alice,
        bob,
        state,
    }
}

fn launch_party_body() -> Value {
    json!({
        "name": "Launch Party",
        "description": "Celebrating the release",
        "date": "2025-02-01T18:00:00Z",
        "location": "Main Hall",
        "category": "meetup"
    })
}

async fn create_launch_party(h: &Harness) -> Event {
    let response = h
        .server
        .post("/api/events")
        .authorization_bearer(ALICE)
        .json(&launch_party_body())
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Event>()
}

// ============================================================================
// Scenario
// ============================================================================

#[tokio::test]
async fn test_launch_party_scenario() {
    let h = harness();
    let event = create_launch_party(&h).await;
    assert_eq!(event.owner, h.alice.user_id);
    assert!(event.attendees.is_empty());

    // Bob joins
    let response = h
        .server
        .post(&format!("/api/events/{}/join", event.id))
        .authorization_bearer(BOB)
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "joined");
    assert_eq!(body["message"], "Joined the event successfully");
    assert_eq!(body["event"]["attendees"], json!([h.bob.user_id]));

    // Carol cannot rename someone else's event
    let response = h
        .server
        .put(&format!("/api/events/{}", event.id))
        .authorization_bearer(CAROL)
        .json(&json!({ "name": "Hijacked" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["code"], "FORBIDDEN");

    // Alice can
    let response = h
        .server
        .put(&format!("/api/events/{}", event.id))
        .authorization_bearer(ALICE)
        .json(&json!({ "name": "Launch Party v2" }))
        .await;
    response.assert_status_ok();
    let renamed = response.json::<Event>();
    assert_eq!(renamed.name, "Launch Party v2");
    assert_eq!(renamed.location, "Main Hall");
    assert!(renamed.is_attending(&h.bob.user_id));

    // Bob leaves
    let response = h
        .server
        .post(&format!("/api/events/{}/leave", event.id))
        .authorization_bearer(BOB)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "left");

    let fetched = h
        .server
        .get(&format!("/api/events/{}", event.id))
        .await
        .json::<Event>();
    assert_eq!(fetched.name, "Launch Party v2");
    assert!(fetched.attendees.is_empty());
}

// ============================================================================
// Attendance
// ============================================================================

#[tokio::test]
async fn test_join_twice_reports_already_joined() {
    let h = harness();
    let event = create_launch_party(&h).await;
    let path = format!("/api/events/{}/join", event.id);

    h.server.post(&path).authorization_bearer(BOB).await.assert_status_ok();
    let response = h.server.post(&path).authorization_bearer(BOB).await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "already_joined");
    assert_eq!(body["message"], "You are already attending this event");
    assert_eq!(body["event"]["attendees"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_leave_without_joining_reports_not_attending() {
    let h = harness();
    let event = create_launch_party(&h).await;

    let response = h
        .server
        .post(&format!("/api/events/{}/leave", event.id))
        .authorization_bearer(BOB)
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "not_attending");
}

#[tokio::test]
async fn test_join_notifies_subscribed_observers_once() {
    let h = harness();
    let event = create_launch_party(&h).await;
    let other = create_launch_party(&h).await;

    let (watcher, mut watcher_rx) = h.subscriptions.register();
    let (bystander, mut bystander_rx) = h.subscriptions.register();
    h.subscriptions.subscribe(event.id, &watcher);
    h.subscriptions.subscribe(other.id, &bystander);

    let path = format!("/api/events/{}/join", event.id);
    h.server.post(&path).authorization_bearer(BOB).await.assert_status_ok();
    h.server.post(&path).authorization_bearer(BOB).await.assert_status_ok();

    assert_eq!(watcher_rx.try_recv().unwrap().event_id, event.id);
    assert!(watcher_rx.try_recv().is_err(), "no-op join must not notify");
    assert!(bystander_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_join_unknown_event_is_not_found() {
    let h = harness();

    let response = h
        .server
        .post(&format!("/api/events/{}/join", EventId::new()))
        .authorization_bearer(BOB)
        .await;

    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
}

// ============================================================================
// Authentication and ownership
// ============================================================================

#[tokio::test]
async fn test_create_requires_bearer_token() {
    let h = harness();

    let response = h.server.post("/api/events").json(&launch_party_body()).await;
    response.assert_status_unauthorized();

    let response = h
        .server
        .post("/api/events")
        .authorization_bearer("unknown-token")
        .json(&launch_party_body())
        .await;
    response.assert_status_unauthorized();
    assert!(h.repository.is_empty());
}

#[tokio::test]
async fn test_expired_identity_is_rejected() {
    let h = harness();
    let event = create_launch_party(&h).await;

    let response = h
        .server
        .post(&format!("/api/events/{}/join", event.id))
        .authorization_bearer(EXPIRED)
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_delete_requires_ownership() {
    let h = harness();
    let event = create_launch_party(&h).await;
    let path = format!("/api/events/{}", event.id);

    h.server
        .delete(&path)
        .authorization_bearer(BOB)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    assert!(h.repository.get(event.id).is_some());

    let response = h.server.delete(&path).authorization_bearer(ALICE).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["message"], "Event deleted successfully");
    assert_eq!(body["event_id"], json!(event.id));

    h.server.get(&path).await.assert_status_not_found();
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_create_with_blank_name_is_bad_request() {
    let h = harness();
    let mut body = launch_party_body();
    body["name"] = json!("   ");

    let response = h
        .server
        .post("/api/events")
        .authorization_bearer(ALICE)
        .json(&body)
        .await;

    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_with_missing_field_is_bad_request() {
    let h = harness();

    let response = h
        .server
        .post("/api/events")
        .authorization_bearer(ALICE)
        .json(&json!({ "name": "Launch Party" }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");
    assert!(h.repository.is_empty());
}

#[tokio::test]
async fn test_create_with_malformed_json_is_bad_request() {
    let h = harness();

    let response = h
        .server
        .post("/api/events")
        .authorization_bearer(ALICE)
        .bytes(Bytes::from_static(b"{\"name\": "))
        .content_type("application/json")
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_patch_cannot_touch_owner() {
    let h = harness();
    let event = create_launch_party(&h).await;

    let response = h
        .server
        .put(&format!("/api/events/{}", event.id))
        .authorization_bearer(ALICE)
        .json(&json!({ "owner": h.bob.user_id }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(h.repository.get(event.id).unwrap().owner, h.alice.user_id);
}

#[tokio::test]
async fn test_malformed_event_id_is_bad_request() {
    let h = harness();

    h.server
        .get("/api/events/not-a-uuid")
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_filters_and_sorts() {
    let h = harness();
    let popular = create_launch_party(&h).await;
    let mut workshop = launch_party_body();
    workshop["name"] = json!("Rust Workshop");
    workshop["category"] = json!("workshop");
    h.server
        .post("/api/events")
        .authorization_bearer(ALICE)
        .json(&workshop)
        .await
        .assert_status(StatusCode::CREATED);

    h.server
        .post(&format!("/api/events/{}/join", popular.id))
        .authorization_bearer(BOB)
        .await
        .assert_status_ok();

    let all = h.server.get("/api/events").await.json::<Vec<Event>>();
    assert_eq!(all.len(), 2);

    let workshops = h
        .server
        .get("/api/events")
        .add_query_param("category", "workshop")
        .await
        .json::<Vec<Event>>();
    assert_eq!(workshops.len(), 1);
    assert_eq!(workshops[0].name, "Rust Workshop");

    let searched = h
        .server
        .get("/api/events?search=LAUNCH&when=upcoming")
        .await
        .json::<Vec<Event>>();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, popular.id);

    let by_popularity = h
        .server
        .get("/api/events?sort=popular")
        .await
        .json::<Vec<Event>>();
    assert_eq!(by_popularity[0].id, popular.id);

    let past = h
        .server
        .get("/api/events?when=past")
        .await
        .json::<Vec<Event>>();
    assert!(past.is_empty());
}

#[tokio::test]
async fn test_list_rejects_unknown_sort() {
    let h = harness();

    h.server
        .get("/api/events?sort=loudest")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_repository_outage_is_service_unavailable() {
    let h = harness();
    let event = create_launch_party(&h).await;
    h.repository
        .fail_next(RepositoryError::Unavailable("connection refused".to_string()));

    let response = h
        .server
        .post(&format!("/api/events/{}/join", event.id))
        .authorization_bearer(BOB)
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["code"], "SERVICE_UNAVAILABLE");
}

// ============================================================================
// Operational endpoints
// ============================================================================

struct StubProbe(Option<&'static str>);

impl ReadinessProbe for StubProbe {
    fn component(&self) -> &'static str {
        "stub"
    }

    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>> {
        Box::pin(async move {
            match self.0 {
                None => HealthCheck::healthy(self.component()),
                Some(reason) => HealthCheck::unhealthy(self.component(), reason),
            }
        })
    }
}

#[tokio::test]
async fn test_health_is_ok() {
    let h = harness();

    let response = h.server.get("/health").await;

    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_ready_reflects_probes() {
    let h = harness_with_probes(vec![Arc::new(StubProbe(None))]);
    h.server.get("/ready").await.assert_status_ok();

    let h = harness_with_probes(vec![
        Arc::new(StubProbe(None)),
        Arc::new(StubProbe(Some("connection refused"))),
    ]);
    let response = h.server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text() {
    let h = harness();

    h.server.get("/metrics").await.assert_status_ok();
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let h = harness();
    let app = build_router(h.state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(CORRELATION_ID_HEADER, "7f0c1c1e-6a44-4f7e-9a43-0d2a8f1e2b3c")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CORRELATION_ID_HEADER],
        "7f0c1c1e-6a44-4f7e-9a43-0d2a8f1e2b3c"
    );
}
