// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Distribution Channel Integration Tests
//!
//! Fan-out from controller notifications to attached listeners.

use std::time::Duration;

use station_tests::prelude::*;

#[tokio::test]
async fn test_channel_initial_snapshot_first() {
    init_test_logging();
    let station = TestStation::new();
    station.connect_and_sync().await;

    let (_guard, mut listener) = station.attach(16);
    station
        .controller
        .set_value(NIVEAU_ADDRESS, OpcUaValue::Int16(50));

    let first = next_event(&mut listener).await;
    let snapshot = first.assert_initial();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot["ARU"], Some(TagValue::Boolean(false)));
    assert_eq!(snapshot["reset"], None);

    next_event(&mut listener)
        .await
        .assert_change("niveau", &TagValue::Int16(50));
}

#[tokio::test]
async fn test_channel_initial_snapshot_while_disconnected() {
    let station = TestStation::new();

    let (_guard, mut listener) = station.attach(4);

    let event = next_event(&mut listener).await;
    assert!(event.assert_initial().values().all(Option::is_none));
    assert!(is_quiet(&mut listener, Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_channel_every_listener_starts_with_one_initial() {
    let station = TestStation::new();
    station.connect_and_sync().await;

    let mut listeners = Vec::new();
    for _ in 0..5 {
        listeners.push(station.attach(16));
        station
            .controller
            .set_value(CONSIGNE_ADDRESS, OpcUaValue::Float(listeners.len() as f32));
    }
    station
        .wait_for_value("consigne", TagValue::Float(5.0))
        .await;

    for (_, receiver) in &mut listeners {
        let mut initials = 0;
        let mut first_is_initial = None;
        while let Ok(event) = receiver.try_recv() {
            first_is_initial.get_or_insert(event.is_initial());
            if event.is_initial() {
                initials += 1;
            }
        }
        assert_eq!(first_is_initial, Some(true));
        assert_eq!(initials, 1);
    }
}

#[tokio::test]
async fn test_channel_per_tag_order_preserved() {
    let station = TestStation::new();
    station.connect_and_sync().await;
    let (_guard, mut listener) = station.attach(64);
    next_event(&mut listener).await.assert_initial();

    for level in 1..=20 {
        station
            .controller
            .set_value(NIVEAU_ADDRESS, OpcUaValue::Int16(level));
    }

    for level in 1..=20 {
        assert_eq!(
            next_change_of(&mut listener, "niveau").await,
            TagValue::Int16(level)
        );
    }
}

#[tokio::test]
async fn test_channel_closed_listener_does_not_affect_others() {
    let station = TestStation::new();
    station.connect_and_sync().await;

    let (_gone_guard, gone) = station.attach(16);
    let (_guard, mut kept) = station.attach(16);
    next_event(&mut kept).await.assert_initial();
    drop(gone);

    station
        .controller
        .set_value(ARU_ADDRESS, OpcUaValue::Boolean(true));

    assert_eq!(
        next_change_of(&mut kept, "ARU").await,
        TagValue::Boolean(true)
    );
    assert_eq!(station.channel.listener_count(), 1);
    assert_eq!(station.channel.stats().listeners_closed, 1);
}

#[tokio::test]
async fn test_channel_guard_detaches_on_drop() {
    let station = TestStation::new();

    let (guard, _receiver) = station.attach(4);
    let (_other, _other_receiver) = station.attach(4);
    assert_eq!(station.channel.listener_count(), 2);

    let id = guard.id();
    drop(guard);

    assert_eq!(station.channel.listener_count(), 1);
    // Detach is idempotent.
    assert!(!station.channel.detach(id));
}

#[tokio::test]
async fn test_channel_lagging_listener_drops_events() {
    let station = TestStation::new();
    station.connect_and_sync().await;

    // Room for the snapshot and one change.
    let (_slow_guard, mut slow) = station.attach(2);
    let (_fast_guard, mut fast) = station.attach(64);

    for level in 1..=5 {
        station
            .controller
            .set_value(NIVEAU_ADDRESS, OpcUaValue::Int16(level));
    }
    station.wait_for_value("niveau", TagValue::Int16(5)).await;

    next_event(&mut fast).await.assert_initial();
    for level in 1..=5 {
        assert_eq!(
            next_change_of(&mut fast, "niveau").await,
            TagValue::Int16(level)
        );
    }

    next_event(&mut slow).await.assert_initial();
    next_event(&mut slow)
        .await
        .assert_change("niveau", &TagValue::Int16(1));
    assert!(is_quiet(&mut slow, Duration::from_millis(50)).await);

    assert_eq!(station.channel.stats().dropped_lagged, 4);
    // Lagging listeners stay attached.
    assert_eq!(station.channel.listener_count(), 2);
}
