// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Wires a complete station around a [`MockController`].
//!
//! ```text
//!  MockController ◀── SessionManager ──▶ TagValueStore ◀── WriteGateway
//!                          │                  │
//!                          ▼                  ▼
//!                  SubscriptionEngine ──▶ DistributionChannel ──▶ listeners
//!                                                    │
//!                                               AppState ──▶ Router
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::mpsc;

use station_api::{ApiConfig, ApiServer, AppState};
use station_core::channel::{DistributionChannel, ListenerGuard, TagEvent};
use station_core::registry::TagRegistry;
use station_core::store::TagValueStore;
use station_core::types::TagValue;
use station_opcua::{
    SessionConfig, SessionManager, SessionState, SimulatorSettings, WriteGateway,
};

use super::fixtures::{ControllerFixtures, ENDPOINT, SessionFixtures, TagFixtures};
use super::mocks::MockController;

/// How long helpers wait for an event before failing the test.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// TestStation
// =============================================================================

/// A fully wired station over a mock controller.
pub struct TestStation {
    /// The simulated controller.
    pub controller: Arc<MockController>,
    /// Tag catalogue.
    pub registry: Arc<TagRegistry>,
    /// Tag value snapshot.
    pub store: Arc<TagValueStore>,
    /// Fan-out of changes.
    pub channel: Arc<DistributionChannel>,
    /// Upstream session.
    pub session: Arc<SessionManager>,
    /// Control writes.
    pub gateway: Arc<WriteGateway>,
    /// HTTP state.
    pub state: AppState,
}

impl TestStation {
    /// Reference station, not connected.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder.
    pub fn builder() -> TestStationBuilder {
        TestStationBuilder::default()
    }

    /// Connects to [`ENDPOINT`], panicking on failure.
    pub async fn connect(&self) -> SessionState {
        self.session
            .connect(ENDPOINT)
            .await
            .expect("connect to mock controller")
    }

    /// Connects and waits until the initial reads reached the store.
    pub async fn connect_and_sync(&self) {
        let state = self.connect().await;
        assert_eq!(state, SessionState::Connected);
        self.wait_for_store(|store| {
            store
                .registry()
                .readable()
                .all(|tag| matches!(store.get(&tag.name), Ok(Some(_))))
        })
        .await;
    }

    /// Attaches a bounded listener.
    pub fn attach(&self, capacity: usize) -> (ListenerGuard, mpsc::Receiver<TagEvent>) {
        self.channel.attach_channel(capacity)
    }

    /// Builds the HTTP router.
    pub fn router(&self) -> Router {
        ApiServer::new(self.state.clone()).router()
    }

    /// Polls the store until `condition` holds.
    pub async fn wait_for_store<F>(&self, condition: F)
    where
        F: Fn(&TagValueStore) -> bool,
    {
        let store = self.store.clone();
        tokio::time::timeout(EVENT_TIMEOUT, async move {
            while !condition(&store) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("store condition not reached in time");
    }

    /// Waits until `tag` holds `value`.
    pub async fn wait_for_value(&self, tag: &str, value: TagValue) {
        let expected = Some(value);
        self.wait_for_store(|store| store.get(tag).ok().flatten() == expected)
            .await;
    }

    /// Waits until the session reaches `state`.
    pub async fn wait_for_state(&self, state: SessionState) {
        let mut receiver = self.session.subscribe_state();
        tokio::time::timeout(EVENT_TIMEOUT, receiver.wait_for(|s| *s == state))
            .await
            .expect("session state not reached in time")
            .expect("session dropped");
    }
}

impl Default for TestStation {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TestStationBuilder
// =============================================================================

/// Builder for [`TestStation`].
#[derive(Default)]
pub struct TestStationBuilder {
    controller: Option<Arc<MockController>>,
    registry: Option<Arc<TagRegistry>>,
    session: Option<SessionConfig>,
    simulator: Option<SimulatorSettings>,
    api: Option<ApiConfig>,
}

impl TestStationBuilder {
    /// Uses a specific controller. Defaults to [`ControllerFixtures::plant`].
    pub fn controller(mut self, controller: Arc<MockController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Uses a specific registry. Defaults to [`TagFixtures::registry`].
    pub fn registry(mut self, registry: Arc<TagRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Uses specific session settings. Defaults to [`SessionFixtures::surface`].
    pub fn session(mut self, config: SessionConfig) -> Self {
        self.session = Some(config);
        self
    }

    /// Uses specific simulator settings.
    pub fn simulator(mut self, settings: SimulatorSettings) -> Self {
        self.simulator = Some(settings);
        self
    }

    /// Uses a specific API configuration.
    pub fn api(mut self, config: ApiConfig) -> Self {
        self.api = Some(config);
        self
    }

    /// Wires the station.
    pub fn build(self) -> TestStation {
        let controller = self.controller.unwrap_or_else(ControllerFixtures::plant);
        let registry = self.registry.unwrap_or_else(TagFixtures::registry);
        let store = Arc::new(TagValueStore::new(registry.clone()));
        let channel = Arc::new(DistributionChannel::new(store.clone()));

        let session = SessionManager::builder(store.clone(), channel.clone())
            .config(self.session.unwrap_or_else(SessionFixtures::surface))
            .simulator(self.simulator.unwrap_or_else(SessionFixtures::simulator))
            .factory(controller.factory())
            .build();
        let gateway = Arc::new(WriteGateway::new(session.clone(), store.clone()));

        let state = AppState::builder()
            .config(self.api.unwrap_or_default())
            .session(session.clone())
            .gateway(gateway.clone())
            .channel(channel.clone())
            .station("station-test", "Test Station")
            .build()
            .expect("app state");

        TestStation {
            controller,
            registry,
            store,
            channel,
            session,
            gateway,
            state,
        }
    }
}

// =============================================================================
// Listener helpers
// =============================================================================

/// Receives the next event, failing the test after [`EVENT_TIMEOUT`].
pub async fn next_event(receiver: &mut mpsc::Receiver<TagEvent>) -> TagEvent {
    tokio::time::timeout(EVENT_TIMEOUT, receiver.recv())
        .await
        .expect("no event in time")
        .expect("listener closed")
}

/// Skips events until a change of `tag` arrives and returns its value.
pub async fn next_change_of(receiver: &mut mpsc::Receiver<TagEvent>, tag: &str) -> TagValue {
    loop {
        if let TagEvent::Change { tag: changed, value } = next_event(receiver).await {
            if changed == tag {
                return value;
            }
        }
    }
}

/// Returns `true` if nothing arrives within `window`.
pub async fn is_quiet(receiver: &mut mpsc::Receiver<TagEvent>, window: Duration) -> bool {
    tokio::time::timeout(window, receiver.recv()).await.is_err()
}
