// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Reconnect Integration Tests
//!
//! The SSE client of `station watch` under the reconnection controller,
//! against a station served on a local port.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use station_api::ApiServer;
use station_bin::commands::SseConnector;
use station_tests::prelude::*;

const POLICY: ReconnectPolicy = ReconnectPolicy {
    delay: Duration::from_millis(20),
    max_attempts: 5,
};

async fn serve(station: &TestStation) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = ApiServer::new(station.state.clone());
    let handle = tokio::spawn(async move {
        let _ = server.serve(listener, std::future::pending()).await;
    });
    (url, handle)
}

async fn recv(events: &mut mpsc::UnboundedReceiver<TagEvent>) -> TagEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("no event in time")
        .expect("controller stopped")
}

fn follow(
    connector: SseConnector,
) -> (
    mpsc::UnboundedReceiver<TagEvent>,
    tokio::sync::watch::Receiver<ReconnectState>,
    JoinHandle<(ReconnectState, u32)>,
) {
    let controller = ReconnectController::new(connector, POLICY);
    let states = controller.subscribe_state();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let state = controller
            .run(move |event| {
                let _ = tx.send(event);
            })
            .await;
        (state, controller.open_count())
    });
    (rx, states, handle)
}

#[tokio::test]
async fn test_reconnect_follows_served_station() {
    init_test_logging();
    let station = TestStation::new();
    station.connect_and_sync().await;
    let (url, server) = serve(&station).await;

    let (mut events, mut states, controller) = follow(SseConnector::new(&url, None));

    let initial = recv(&mut events).await;
    assert_eq!(
        initial.assert_initial()["niveau"],
        Some(TagValue::Int16(42))
    );
    states
        .wait_for(|s| *s == ReconnectState::Connected)
        .await
        .unwrap();

    station
        .controller
        .set_value(NIVEAU_ADDRESS, OpcUaValue::Int16(64));
    recv(&mut events)
        .await
        .assert_change("niveau", &TagValue::Int16(64));

    controller.abort();
    server.abort();
}

#[tokio::test]
async fn test_reconnect_stream_connects_requested_endpoint() {
    let station = TestStation::new();
    let (url, server) = serve(&station).await;

    let (mut events, _states, controller) =
        follow(SseConnector::new(&url, Some(ENDPOINT.to_string())));

    assert!(recv(&mut events).await.is_initial());
    assert_eq!(station.session.state(), SessionState::Connected);

    controller.abort();
    server.abort();
}

#[tokio::test]
async fn test_reconnect_gives_up_on_closed_port() {
    let url = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let (_events, states, controller) = follow(SseConnector::new(&url, None));
    let (state, opens) = tokio::time::timeout(Duration::from_secs(5), controller)
        .await
        .expect("controller gave up in time")
        .unwrap();

    assert_eq!(state, ReconnectState::GaveUp);
    // One initial open plus five retries; no sixth retry.
    assert_eq!(opens, 6);
    assert_eq!(*states.borrow(), ReconnectState::GaveUp);
}

#[tokio::test]
async fn test_reconnect_gives_up_when_station_cannot_connect() {
    let station = TestStation::new();
    station.controller.refuse_connect(true);
    let (url, server) = serve(&station).await;

    let (_events, _states, controller) =
        follow(SseConnector::new(&url, Some(ENDPOINT.to_string())));
    let (state, opens) = tokio::time::timeout(Duration::from_secs(5), controller)
        .await
        .expect("controller gave up in time")
        .unwrap();

    assert_eq!(state, ReconnectState::GaveUp);
    assert_eq!(opens, 6);
    assert_eq!(station.controller.connect_count(), 6);
    assert_eq!(station.channel.listener_count(), 0);

    server.abort();
}

#[tokio::test]
async fn test_reconnect_recovers_after_failed_opens() {
    let station = TestStation::new();
    station.controller.refuse_connect(true);
    let (url, server) = serve(&station).await;

    let (mut events, mut states, controller) =
        follow(SseConnector::new(&url, Some(ENDPOINT.to_string())));

    // Let two opens fail, then let the controller in.
    states
        .wait_for(|s| matches!(s, ReconnectState::Retrying { attempt, .. } if *attempt >= 2))
        .await
        .unwrap();
    station.controller.refuse_connect(false);

    assert!(recv(&mut events).await.is_initial());
    assert_eq!(*states.borrow(), ReconnectState::Connected);

    controller.abort();
    server.abort();
}
