/// Integration tests for notification-service HTTP API
///
/// This test module covers:
/// - Notification listing and read-state endpoints
/// - Review-liked event ingress
/// - Stream endpoints (SSE handshake, status, statistics)
/// - Error handling and response formats
use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{body, http::StatusCode, test, App};
use notification_service::{AppState, Config, MemoryNotificationStore};
use serde_json::{json, Value};
use uuid::Uuid;

const USER_HEADER: &str = "x-user-id";

fn memory_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([("NOTIFICATION_STORE", "memory")]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

async fn state_with_users(names: &[&str]) -> (AppState, Vec<Uuid>) {
    let store = Arc::new(MemoryNotificationStore::new());
    let mut ids = Vec::new();
    for name in names {
        let id = Uuid::new_v4();
        store.insert_user(id, *name).await;
        ids.push(id);
    }
    (AppState::new(store, &memory_config()), ids)
}

fn like_payload(owner: Uuid, liker: Uuid, nickname: &str) -> Value {
    json!({
        "reviewId": Uuid::new_v4(),
        "reviewOwnerId": owner,
        "likedById": liker,
        "likedByNickname": nickname,
    })
}

#[actix_web::test]
async fn test_missing_identity_is_unauthorized() {
    let (state, _) = state_with_users(&[]).await;
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/api/v1/notifications").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header((USER_HEADER, "nobody"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_review_liked_then_listing() {
    let (state, ids) = state_with_users(&["alice", "bob"]).await;
    let (alice, bob) = (ids[0], ids[1]);
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/internal/v1/events/review-liked")
        .set_json(like_payload(alice, bob, "bob"))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["data"]["status"], "dispatched");
    assert_eq!(resp["data"]["delivered"], 0);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header((USER_HEADER, alice.to_string()))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    let entries = resp["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["type"], "REVIEW_LIKED");
    assert_eq!(entries[0]["read"], false);
    assert_eq!(entries[0]["senderId"], bob.to_string());
    assert_eq!(entries[0]["senderNickname"], "bob");
    assert_eq!(entries[0]["message"], "bob liked your review.");
}

#[actix_web::test]
async fn test_self_like_is_skipped() {
    let (state, ids) = state_with_users(&["alice"]).await;
    let alice = ids[0];
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/internal/v1/events/review-liked")
        .set_json(like_payload(alice, alice, "alice"))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["status"], "self_notification");

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications/unread")
        .insert_header((USER_HEADER, alice.to_string()))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["count"], 0);
}

#[actix_web::test]
async fn test_mark_read_ownership_and_idempotence() {
    let (state, ids) = state_with_users(&["alice", "bob"]).await;
    let (alice, bob) = (ids[0], ids[1]);
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/internal/v1/events/review-liked")
        .set_json(like_payload(alice, bob, "bob"))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    let id = resp["data"]["notificationId"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/notifications/{}/read", id))
        .insert_header((USER_HEADER, bob.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "NOTIFICATION_ACCESS_DENIED");

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/notifications/{}/read", id))
            .insert_header((USER_HEADER, alice.to_string()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/notifications/{}/read", id + 1000))
        .insert_header((USER_HEADER, alice.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_read_all_clears_unread() {
    let (state, ids) = state_with_users(&["alice", "bob"]).await;
    let (alice, bob) = (ids[0], ids[1]);
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/internal/v1/events/review-liked")
            .set_json(like_payload(alice, bob, "bob"))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications/unread")
        .insert_header((USER_HEADER, alice.to_string()))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["count"], 3);

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications/read-all")
        .insert_header((USER_HEADER, alice.to_string()))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["updated"], 3);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications/unread")
        .insert_header((USER_HEADER, alice.to_string()))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["count"], 0);
}

#[actix_web::test]
async fn test_unknown_user_is_not_found() {
    let (state, _) = state_with_users(&[]).await;
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications/read-all")
        .insert_header((USER_HEADER, Uuid::new_v4().to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_malformed_event_is_bad_request() {
    let (state, _) = state_with_users(&[]).await;
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/internal/v1/events/review-liked")
        .set_json(json!({ "reviewId": "not-a-uuid" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_stream_handshake_and_status() {
    let (state, ids) = state_with_users(&["alice"]).await;
    let alice = ids[0];
    let hub = state.hub.clone();
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications/stream")
        .insert_header((USER_HEADER, alice.to_string()))
        .to_request();
    let stream = test::call_service(&app, req).await;
    assert_eq!(stream.status(), StatusCode::OK);
    assert_eq!(
        stream.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications/stream/status")
        .insert_header((USER_HEADER, alice.to_string()))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["connected"], true);
    assert_eq!(resp["data"]["connections"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/streams/metrics")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["totalConnections"], 1);
    assert_eq!(resp["data"]["connectedUsers"], 1);

    // the body ends once the connection is closed
    assert_eq!(hub.shutdown().await, 1);
    let bytes = body::to_bytes(stream.into_body()).await.unwrap();
    assert_eq!(&bytes[..], b"event: INIT\ndata: connected\n\n");
}

#[actix_web::test]
async fn test_health_and_unknown_route() {
    let (state, _) = state_with_users(&[]).await;
    let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/v2/nothing").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
