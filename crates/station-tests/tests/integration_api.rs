// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # API Integration Tests
//!
//! The HTTP surface driven through the router, over a station wired to the
//! mock controller.
//!
//! ## Test Categories
//!
//! - `test_health_*`: liveness and readiness
//! - `test_write_*`: `POST /api/write` and its status mapping
//! - `test_connection_*`: connection test, connect, disconnect
//! - `test_tags_*` / `test_status_*`: read-only views
//! - `test_stream_*`: the event stream

use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode as HttpStatus, header},
    response::Response,
};
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use station_tests::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

async fn get(router: &Router, uri: &str) -> Response {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post(router: &Router, uri: &str, body: Value) -> Response {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn expect_error(response: Response, status: HttpStatus, code: &str) {
    assert_eq!(response.status(), status);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!(code));
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_always_ok() {
    let station = TestStation::new();

    let response = get(&station.router(), "/health").await;

    assert_eq!(response.status(), HttpStatus::OK);
    assert_eq!(json_body(response).await["status"], json!("healthy"));
}

#[tokio::test]
async fn test_health_ready_follows_session() {
    let station = TestStation::new();
    let router = station.router();

    let response = get(&router, "/ready").await;
    assert_eq!(response.status(), HttpStatus::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["ready"], json!(false));

    station.connect().await;
    let response = get(&router, "/ready").await;
    assert_eq!(response.status(), HttpStatus::OK);
}

// =============================================================================
// Write
// =============================================================================

#[tokio::test]
async fn test_write_success() {
    init_test_logging();
    let station = TestStation::new();
    station.connect_and_sync().await;

    let response = post(
        &station.router(),
        "/api/write",
        json!({"tag": "ARU", "value": true}),
    )
    .await;

    assert_eq!(response.status(), HttpStatus::OK);
    assert_eq!(
        json_body(response).await,
        json!({"success": true, "tag": "ARU", "value": true})
    );
    assert_stored(&station.store, "ARU", Some(TagValue::Boolean(true)));
}

#[tokio::test]
async fn test_write_with_endpoint_connects_first() {
    let station = TestStation::new();

    let response = post(
        &station.router(),
        "/api/write",
        json!({"tag": "consigne", "value": "4", "endpoint": ENDPOINT}),
    )
    .await;

    assert_eq!(response.status(), HttpStatus::OK);
    assert_eq!(json_body(response).await["value"], json!(4.0));
    assert_eq!(station.session.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_write_status_mapping() {
    let station = TestStation::new();
    let router = station.router();

    expect_error(
        post(&router, "/api/write", json!({"tag": "ARU", "value": true})).await,
        HttpStatus::SERVICE_UNAVAILABLE,
        "NOT_CONNECTED",
    )
    .await;

    station.connect_and_sync().await;

    expect_error(
        post(&router, "/api/write", json!({"tag": "niveau", "value": 10})).await,
        HttpStatus::FORBIDDEN,
        "UNWRITABLE",
    )
    .await;
    expect_error(
        post(&router, "/api/write", json!({"tag": "pompe", "value": 1})).await,
        HttpStatus::NOT_FOUND,
        "UNKNOWN_TAG",
    )
    .await;
    expect_error(
        post(&router, "/api/write", json!({"tag": "ARU", "value": [1]})).await,
        HttpStatus::UNPROCESSABLE_ENTITY,
        "INVALID_VALUE",
    )
    .await;

    station
        .controller
        .set_write_status(ARU_ADDRESS, StatusCode::BAD_NOT_WRITABLE);
    expect_error(
        post(&router, "/api/write", json!({"tag": "ARU", "value": true})).await,
        HttpStatus::BAD_GATEWAY,
        "WRITE_REJECTED",
    )
    .await;

    // Rejected writes leave the last known-good value.
    assert_stored(&station.store, "ARU", Some(TagValue::Boolean(false)));
}

#[tokio::test(start_paused = true)]
async fn test_write_timeout_is_gateway_timeout() {
    let station = TestStation::new();
    station.connect_and_sync().await;
    station
        .controller
        .set_write_delay(Duration::from_secs(20));

    let response = post(
        &station.router(),
        "/api/write",
        json!({"tag": "ARU", "value": true}),
    )
    .await;

    expect_error(response, HttpStatus::GATEWAY_TIMEOUT, "WRITE_TIMEOUT").await;
}

#[tokio::test]
async fn test_write_malformed_body_rejected() {
    let station = TestStation::new();

    let response = post(&station.router(), "/api/write", json!({"value": true})).await;

    assert!(response.status().is_client_error());
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_connection_test_leaves_session_untouched() {
    let station = TestStation::new();
    let router = station.router();

    let response = post(&router, "/api/connection/test", json!({"endpoint": ENDPOINT})).await;
    assert_eq!(response.status(), HttpStatus::OK);
    assert_eq!(json_body(response).await, json!({"success": true}));
    assert_eq!(station.session.state(), SessionState::Disconnected);
    assert_eq!(station.controller.live_subscriptions(), 0);

    station.controller.refuse_connect(true);
    let response = post(&router, "/api/connection/test", json!({"endpoint": ENDPOINT})).await;
    assert_eq!(response.status(), HttpStatus::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("refused"));
}

#[tokio::test]
async fn test_connection_connect_and_disconnect() {
    let station = TestStation::new();
    let router = station.router();

    let response = post(&router, "/api/connection/connect", json!({"endpoint": ENDPOINT})).await;
    assert_eq!(response.status(), HttpStatus::OK);
    assert_eq!(
        json_body(response).await,
        json!({"success": true, "state": "connected", "endpoint": ENDPOINT})
    );

    let response = post(&router, "/api/connection/disconnect", json!({})).await;
    assert_eq!(response.status(), HttpStatus::OK);
    assert_eq!(json_body(response).await["state"], json!("disconnected"));
    assert_reset(&station.store);
}

#[tokio::test]
async fn test_connection_errors_mapped() {
    let station = TestStation::new();
    let router = station.router();

    expect_error(
        post(&router, "/api/connection/connect", json!({"endpoint": "modbus://plc"})).await,
        HttpStatus::BAD_REQUEST,
        "CONFIGURATION_ERROR",
    )
    .await;

    station.controller.refuse_connect(true);
    expect_error(
        post(&router, "/api/connection/connect", json!({"endpoint": ENDPOINT})).await,
        HttpStatus::BAD_GATEWAY,
        "CONNECTION_REFUSED",
    )
    .await;
}

// =============================================================================
// Tags and status
// =============================================================================

#[tokio::test]
async fn test_tags_list_with_values() {
    let station = TestStation::new();
    station.connect_and_sync().await;

    let response = get(&station.router(), "/api/tags").await;

    assert_eq!(response.status(), HttpStatus::OK);
    let body = json_body(response).await;
    assert_eq!(body["connected"], json!(true));
    let tags = body["tags"].as_array().unwrap();
    assert_eq!(tags.len(), 4);
    assert_eq!(tags[0]["name"], json!("ARU"));
    assert_eq!(tags[0]["value"], json!(false));
}

#[tokio::test]
async fn test_tags_single_tag() {
    let station = TestStation::new();
    let router = station.router();

    let response = get(&router, "/api/tags/niveau").await;
    assert_eq!(response.status(), HttpStatus::OK);
    let body = json_body(response).await;
    assert_eq!(body["type"], json!("int16"));
    assert_eq!(body["access"], json!(["read"]));
    assert_eq!(body["range"], json!({"min": 0.0, "max": 100.0}));
    assert_eq!(body["value"], Value::Null);

    expect_error(
        get(&router, "/api/tags/pompe").await,
        HttpStatus::NOT_FOUND,
        "UNKNOWN_TAG",
    )
    .await;
}

#[tokio::test]
async fn test_status_reports_session() {
    let station = TestStation::new();
    station.connect_and_sync().await;

    let response = get(&station.router(), "/api/status").await;

    assert_eq!(response.status(), HttpStatus::OK);
    let body = json_body(response).await;
    assert_eq!(body["station_id"], json!("station-test"));
    assert_eq!(body["state"], json!("connected"));
    assert_eq!(body["endpoint"], json!(ENDPOINT));
    assert_eq!(body["tag_count"], json!(4));
    assert_eq!(body["monitored_tags"].as_array().unwrap().len(), 3);
    assert_eq!(body["session"]["connects"], json!(1));
}

// =============================================================================
// Event stream
// =============================================================================

#[tokio::test]
async fn test_stream_starts_with_initial_snapshot() {
    let station = TestStation::new();
    station.connect_and_sync().await;

    let response = get(&station.router(), "/api/stream").await;
    assert_eq!(response.status(), HttpStatus::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    assert_eq!(station.channel.listener_count(), 1);

    let mut frames = response.into_body().into_data_stream();
    let first = frames.next().await.unwrap().unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    let data = first.strip_prefix("data: ").unwrap().trim_end();
    let event: Value = serde_json::from_str(data).unwrap();
    assert_eq!(event["initial"]["niveau"], json!(42));

    station
        .controller
        .set_value(NIVEAU_ADDRESS, OpcUaValue::Int16(43));
    let next = frames.next().await.unwrap().unwrap();
    let next = String::from_utf8(next.to_vec()).unwrap();
    assert_eq!(next.trim_end(), r#"data: {"tag":"niveau","value":43}"#);

    // Dropping the body detaches the listener.
    drop(frames);
    assert_eq!(station.channel.listener_count(), 0);
}

#[tokio::test]
async fn test_stream_with_endpoint_connects() {
    let station = TestStation::new();

    let response = get(
        &station.router(),
        "/api/stream?endpoint=opc.tcp://192.168.1.10:4840",
    )
    .await;

    assert_eq!(response.status(), HttpStatus::OK);
    assert_eq!(station.session.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_stream_connect_failure_is_an_error() {
    let station = TestStation::new();
    station.controller.refuse_connect(true);

    let response = get(
        &station.router(),
        "/api/stream?endpoint=opc.tcp://192.168.1.10:4840",
    )
    .await;

    expect_error(response, HttpStatus::BAD_GATEWAY, "CONNECTION_REFUSED").await;
    assert_eq!(station.channel.listener_count(), 0);
}
