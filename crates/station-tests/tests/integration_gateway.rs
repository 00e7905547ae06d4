// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Write Gateway Integration Tests
//!
//! Control writes from the gateway down to the mock controller.

use std::time::Duration;

use serde_json::json;
use station_opcua::TransportError;
use station_tests::prelude::*;

async fn connected() -> TestStation {
    let station = TestStation::new();
    station.connect_and_sync().await;
    station
}

// =============================================================================
// Access rules
// =============================================================================

#[tokio::test]
async fn test_gateway_aru_niveau_scenario() {
    init_test_logging();
    let station = TestStation::builder()
        .registry(TagFixtures::aru_niveau_registry())
        .build();
    station.connect_and_sync().await;

    station
        .gateway
        .write("niveau", &json!(10))
        .await
        .assert_unwritable();
    assert_stored(&station.store, "niveau", Some(TagValue::Int16(42)));

    let written = station.gateway.write("ARU", &json!(true)).await.unwrap();
    assert_eq!(written, TagValue::Boolean(true));
    assert_stored(&station.store, "ARU", Some(TagValue::Boolean(true)));

    assert_eq!(
        station.controller.writes(),
        vec![(ARU_ADDRESS.to_string(), OpcUaValue::Boolean(true))]
    );
}

#[tokio::test]
async fn test_gateway_unknown_tag_checked_first() {
    let station = TestStation::new();

    // Lookup precedes the connection check.
    station
        .gateway
        .write("pompe", &json!(true))
        .await
        .assert_unknown_tag();

    station.connect().await;
    station
        .gateway
        .write("pompe", &json!(true))
        .await
        .assert_unknown_tag();
}

#[tokio::test]
async fn test_gateway_not_connected() {
    let station = TestStation::new();

    station
        .gateway
        .write("ARU", &json!(true))
        .await
        .assert_not_connected();
    assert!(station.controller.writes().is_empty());
}

#[tokio::test]
async fn test_gateway_degraded_counts_as_not_connected() {
    let station = TestStation::builder()
        .session(SessionFixtures::simulate_on_failure())
        .build();
    station.controller.refuse_connect(true);
    assert_eq!(station.connect().await, SessionState::Degraded);

    station
        .gateway
        .write("ARU", &json!(true))
        .await
        .assert_not_connected();
}

#[tokio::test]
async fn test_gateway_write_only_tag_accepted() {
    let station = connected().await;

    let written = station.gateway.write("reset", &json!(1)).await.unwrap();

    assert_eq!(written, TagValue::Boolean(true));
    // Never readable, so the store keeps null.
    assert_stored(&station.store, "reset", None);
    assert_eq!(station.controller.writes().len(), 1);
}

// =============================================================================
// Typing
// =============================================================================

#[tokio::test]
async fn test_gateway_coerces_to_declared_type() {
    let station = connected().await;

    let written = station.gateway.write("consigne", &json!("3.5")).await.unwrap();
    assert_eq!(written, TagValue::Float(3.5));
    assert_eq!(
        station.controller.value(CONSIGNE_ADDRESS),
        Some(OpcUaValue::Float(3.5))
    );

    let written = station.gateway.write("ARU", &json!(1)).await.unwrap();
    assert_eq!(written, TagValue::Boolean(true));
    assert_eq!(
        station.controller.value(ARU_ADDRESS),
        Some(OpcUaValue::Boolean(true))
    );
}

#[tokio::test]
async fn test_gateway_invalid_value_never_forwarded() {
    let station = connected().await;

    let result = station.gateway.write("ARU", &json!("maybe")).await;

    assert!(matches!(result, Err(StationError::InvalidValue { .. })));
    assert!(station.controller.writes().is_empty());
    assert_stored(&station.store, "ARU", Some(TagValue::Boolean(false)));
}

#[tokio::test]
async fn test_gateway_write_typed_mismatch() {
    let station = connected().await;

    let result = station
        .gateway
        .write_typed("ARU", TagValue::Int16(1))
        .await;

    assert!(matches!(result, Err(StationError::InvalidValue { .. })));
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_gateway_bad_status_leaves_store() {
    let station = connected().await;
    station
        .controller
        .set_write_status(ARU_ADDRESS, StatusCode::BAD_NOT_WRITABLE);

    let result = station.gateway.write("ARU", &json!(true)).await;

    assert_eq!(
        result.assert_rejected(),
        &WriteFailure::BadStatus(StatusCode::BAD_NOT_WRITABLE.0)
    );
    assert_stored(&station.store, "ARU", Some(TagValue::Boolean(false)));
    assert_eq!(station.session.stats().write_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_write_bounded_by_request_timeout() {
    let station = connected().await;
    station
        .controller
        .set_write_delay(Duration::from_secs(30));

    let result = station.gateway.write("ARU", &json!(true)).await;

    assert_eq!(result.assert_rejected(), &WriteFailure::Timeout);
    assert_stored(&station.store, "ARU", Some(TagValue::Boolean(false)));
    assert_eq!(station.session.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_gateway_connection_lost_during_write() {
    let station = connected().await;
    station
        .controller
        .fail_writes(Some(TransportError::closed("connection reset")));

    let result = station.gateway.write("ARU", &json!(true)).await;

    assert!(matches!(
        result.assert_rejected(),
        WriteFailure::Transport(_)
    ));
    assert_eq!(station.session.state(), SessionState::Disconnected);
    assert_reset(&station.store);
    assert_eq!(station.session.stats().connection_losses, 1);
}

// =============================================================================
// Distribution
// =============================================================================

#[tokio::test]
async fn test_gateway_write_echo_reaches_listeners() {
    let station = connected().await;
    let (_guard, mut listener) = station.attach(16);
    next_event(&mut listener).await.assert_initial();

    station.gateway.write("ARU", &json!(true)).await.unwrap();

    assert_eq!(
        next_change_of(&mut listener, "ARU").await,
        TagValue::Boolean(true)
    );
}

#[tokio::test]
async fn test_gateway_stats() {
    let station = TestStation::new();
    let _ = station.gateway.write("ARU", &json!(true)).await;
    station.connect_and_sync().await;
    station.gateway.write("ARU", &json!(true)).await.unwrap();
    station
        .controller
        .set_write_status(CONSIGNE_ADDRESS, StatusCode::BAD_TYPE_MISMATCH);
    let _ = station.gateway.write("consigne", &json!(1.0)).await;
    let _ = station.gateway.write("niveau", &json!(1)).await;

    let stats = station.gateway.stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.refused, 2);
    assert_eq!(stats.rejected, 1);
}
