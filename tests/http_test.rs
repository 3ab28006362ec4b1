//! HTTP query routes

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{new_message, test_pool, FixedDirectory};
use roomrelay::{router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> (tempfile::TempDir, AppState, Router) {
    let (dir, db_pool) = test_pool().await;
    let directory = FixedDirectory::with(&[("alice", "Quick Fox")]);
    let state = AppState::new(db_pool, Arc::new(directory));
    let app = router().with_state(state.clone());
    (dir, state, app)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn status_route_answers() {
    let (_dir, _state, app) = app().await;

    let (status, body) = call(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "success", "message": "Api working" }));
}

#[tokio::test]
async fn all_rooms_without_rooms_says_so() {
    let (_dir, _state, app) = app().await;

    let (status, body) = call(&app, get("/api/chat/all-rooms/dave")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "No rooms found" }));
}

#[tokio::test]
async fn all_rooms_lists_latest_message_and_sender() {
    let (_dir, state, app) = app().await;
    state.store.append(new_message("r-alice-bob", "bob", "hi")).await.unwrap();
    state.store.append(new_message("r-alice-bob", "alice", "hello")).await.unwrap();

    let (status, body) = call(&app, get("/api/chat/all-rooms/bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["roomId"], "r-alice-bob");
    assert_eq!(body[0]["latestMessage"]["message"], "hello");
    assert_eq!(body[0]["senderDetails"]["alias"], "Quick Fox");
}

#[tokio::test]
async fn history_is_newest_first() {
    let (_dir, state, app) = app().await;
    state.store.append(new_message("r-alice-bob", "alice", "hi")).await.unwrap();
    state.store.append(new_message("r-alice-bob", "bob", "hello")).await.unwrap();

    let (status, body) = call(&app, get("/api/chat/r-alice-bob")).await;
    assert_eq!(status, StatusCode::OK);
    let bodies: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|message| message["message"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, ["hello", "hi"]);
}

#[tokio::test]
async fn mark_as_read_acknowledges_and_clears_unread() {
    let (_dir, state, app) = app().await;
    state.store.append(new_message("r-alice-bob", "alice", "hi")).await.unwrap();

    let (status, body) = call(&app, get("/api/chat/unread/bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "r-alice-bob": 1 }));

    let (status, body) = call(
        &app,
        post_json("/api/chat/markAsRead", json!({ "roomId": "r-alice-bob", "userId": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Messages marked as read" }));

    let (_, body) = call(&app, get("/api/chat/unread/bob")).await;
    assert_eq!(body, json!({ "r-alice-bob": 0 }));
}

#[tokio::test]
async fn mark_as_read_with_missing_field_is_a_bad_request() {
    let (_dir, _state, app) = app().await;

    for payload in [json!({ "roomId": "r1" }), json!({ "roomId": "r1", "userId": "" })] {
        let (status, body) = call(&app, post_json("/api/chat/markAsRead", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Bad Request");
        assert!(body["error"].as_str().unwrap().contains("userId"));
    }
}

#[tokio::test]
async fn mark_as_read_with_malformed_json_is_a_bad_request() {
    let (_dir, _state, app) = app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/chat/markAsRead")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Bad Request");
}

#[tokio::test]
async fn storage_failure_is_a_server_error() {
    let (_dir, state, app) = app().await;
    state.store.pool().close().await;

    for uri in ["/api/chat/r1", "/api/chat/unread/bob"] {
        let (status, body) = call(&app, get(uri)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server Error");
    }
}
