// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Controller
//!
//! An in-memory stand-in for the OPC UA controller of a station.
//!
//! ```text
//!   SessionManager ──▶ MockTransportFactory ──▶ MockTransport (per session)
//!                                                     │
//!                                                     ▼
//!                                          MockController (shared)
//!                                   values, sinks, monitored items,
//!                                   failure injection, counters
//! ```
//!
//! Every transport handed out by the factory talks to the same
//! [`MockController`], so a test can change a node value or drop the
//! connection and observe the station react.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use station_opcua::client::{
    MonitoredItemHandle, NotificationSink, SubscriptionHandle, SubscriptionParams, TransportEvent,
};
use station_opcua::{
    MonitorParams, OpcUaTransport, OpcUaValue, SessionConfig, StatusCode, TransportError,
    TransportFactory, TransportResult,
};

// =============================================================================
// MockController
// =============================================================================

#[derive(Debug)]
struct MonitoredItem {
    subscription: u32,
    address: String,
}

#[derive(Debug, Default)]
struct ControllerState {
    values: HashMap<String, OpcUaValue>,
    write_status: HashMap<String, StatusCode>,
    unmonitorable: HashSet<String>,
    sinks: HashMap<u32, NotificationSink>,
    items: HashMap<u32, MonitoredItem>,
    writes: Vec<(String, OpcUaValue)>,
    write_failure: Option<TransportError>,
    connect_delay: Duration,
    write_delay: Duration,
}

/// Shared state of the simulated controller.
#[derive(Debug, Default)]
pub struct MockController {
    state: Mutex<ControllerState>,
    next_handle: AtomicU32,
    refuse_connect: AtomicBool,
    refuse_session: AtomicBool,
    connects: AtomicU64,
    disconnects: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    subscriptions_created: AtomicU64,
}

impl MockController {
    /// Creates a controller with no nodes.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a controller with initial node values.
    pub fn with_values<I, A>(values: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (A, OpcUaValue)>,
        A: Into<String>,
    {
        let controller = Self::default();
        controller
            .state
            .lock()
            .values
            .extend(values.into_iter().map(|(a, v)| (a.into(), v)));
        Arc::new(controller)
    }

    /// Returns a factory handing out transports bound to this controller.
    pub fn factory(self: &Arc<Self>) -> Arc<dyn TransportFactory> {
        Arc::new(MockTransportFactory {
            controller: self.clone(),
        })
    }

    // =========================================================================
    // Node values
    // =========================================================================

    /// Sets a node value and notifies every item monitoring it.
    pub fn set_value(&self, address: &str, value: OpcUaValue) -> usize {
        let mut state = self.state.lock();
        state.values.insert(address.to_string(), value.clone());
        notify(&state, address, value)
    }

    /// Sends a notification without changing the stored value.
    pub fn push_change(&self, address: &str, value: OpcUaValue) -> usize {
        let state = self.state.lock();
        notify(&state, address, value)
    }

    /// Returns the current node value.
    pub fn value(&self, address: &str) -> Option<OpcUaValue> {
        self.state.lock().values.get(address).cloned()
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Refuses every connect while `true`.
    pub fn refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Rejects session activation while `true`.
    pub fn refuse_session(&self, refuse: bool) {
        self.refuse_session.store(refuse, Ordering::SeqCst);
    }

    /// Rejects monitoring of an address.
    pub fn refuse_monitor(&self, address: &str) {
        self.state.lock().unmonitorable.insert(address.to_string());
    }

    /// Answers writes to an address with `status`.
    pub fn set_write_status(&self, address: &str, status: StatusCode) {
        self.state
            .lock()
            .write_status
            .insert(address.to_string(), status);
    }

    /// Fails every write with `error` until cleared with `None`.
    pub fn fail_writes(&self, error: Option<TransportError>) {
        self.state.lock().write_failure = error;
    }

    /// Delays every connect.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.state.lock().connect_delay = delay;
    }

    /// Delays every write.
    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().write_delay = delay;
    }

    /// Reports a lost connection on every live subscription.
    pub fn lose_connection(&self, reason: &str) -> usize {
        let state = self.state.lock();
        state
            .sinks
            .values()
            .filter(|sink| {
                sink.send(TransportEvent::ConnectionLost {
                    reason: reason.to_string(),
                })
                .is_ok()
            })
            .count()
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Number of connect calls.
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls.
    pub fn disconnect_count(&self) -> u64 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Number of sessions activated.
    pub fn session_count(&self) -> u64 {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of sessions closed.
    pub fn closed_session_count(&self) -> u64 {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    /// Number of subscriptions ever created.
    pub fn subscription_count(&self) -> u64 {
        self.subscriptions_created.load(Ordering::SeqCst)
    }

    /// Number of subscriptions not yet deleted.
    pub fn live_subscriptions(&self) -> usize {
        self.state.lock().sinks.len()
    }

    /// Addresses of monitored items not yet deleted, sorted.
    pub fn monitored_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .state
            .lock()
            .items
            .values()
            .map(|item| item.address.clone())
            .collect();
        addresses.sort();
        addresses
    }

    /// Every write received, in order.
    pub fn writes(&self) -> Vec<(String, OpcUaValue)> {
        self.state.lock().writes.clone()
    }

    fn next_handle(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn notify(state: &ControllerState, address: &str, value: OpcUaValue) -> usize {
    let mut sent = 0;
    for (handle, item) in state.items.iter().filter(|(_, i)| i.address == address) {
        if let Some(sink) = state.sinks.get(&item.subscription) {
            let event = TransportEvent::DataChange {
                item: MonitoredItemHandle(*handle),
                value: value.clone(),
            };
            if sink.send(event).is_ok() {
                sent += 1;
            }
        }
    }
    sent
}

// =============================================================================
// MockTransport
// =============================================================================

/// One session's view of the [`MockController`].
#[derive(Debug)]
pub struct MockTransport {
    controller: Arc<MockController>,
    endpoint: Option<String>,
    session: bool,
}

impl MockTransport {
    /// Creates an unconnected transport.
    pub fn new(controller: Arc<MockController>) -> Self {
        Self {
            controller,
            endpoint: None,
            session: false,
        }
    }

    fn require_session(&self) -> TransportResult<()> {
        if self.session {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn connect(&mut self, endpoint: &str) -> TransportResult<()> {
        self.controller.connects.fetch_add(1, Ordering::SeqCst);
        let delay = self.controller.state.lock().connect_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.controller.refuse_connect.load(Ordering::SeqCst) {
            return Err(TransportError::connect(endpoint, "connection refused"));
        }
        self.endpoint = Some(endpoint.to_string());
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.controller.disconnects.fetch_add(1, Ordering::SeqCst);
        self.endpoint = None;
        self.session = false;
        Ok(())
    }

    async fn create_session(&mut self) -> TransportResult<()> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConnected);
        }
        if self.controller.refuse_session.load(Ordering::SeqCst) {
            return Err(TransportError::session("BadIdentityTokenRejected"));
        }
        self.controller.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.session = true;
        Ok(())
    }

    async fn close_session(&mut self) -> TransportResult<()> {
        if self.session {
            self.controller.sessions_closed.fetch_add(1, Ordering::SeqCst);
            self.session = false;
        }
        Ok(())
    }

    async fn create_subscription(
        &mut self,
        _params: &SubscriptionParams,
        sink: NotificationSink,
    ) -> TransportResult<SubscriptionHandle> {
        self.require_session()?;
        let handle = self.controller.next_handle();
        self.controller.state.lock().sinks.insert(handle, sink);
        self.controller
            .subscriptions_created
            .fetch_add(1, Ordering::SeqCst);
        Ok(SubscriptionHandle(handle))
    }

    async fn delete_subscription(&mut self, subscription: SubscriptionHandle) -> TransportResult<()> {
        let mut state = self.controller.state.lock();
        state.sinks.remove(&subscription.0);
        state.items.retain(|_, item| item.subscription != subscription.0);
        Ok(())
    }

    async fn monitor_item(
        &mut self,
        subscription: SubscriptionHandle,
        address: &str,
        _params: &MonitorParams,
    ) -> TransportResult<MonitoredItemHandle> {
        self.require_session()?;
        if self.controller.state.lock().unmonitorable.contains(address) {
            return Err(TransportError::operation(address, "BadNodeIdUnknown"));
        }

        let handle = self.controller.next_handle();
        self.controller.state.lock().items.insert(
            handle,
            MonitoredItem {
                subscription: subscription.0,
                address: address.to_string(),
            },
        );
        Ok(MonitoredItemHandle(handle))
    }

    async fn delete_monitored_items(
        &mut self,
        _subscription: SubscriptionHandle,
        items: &[MonitoredItemHandle],
    ) -> TransportResult<()> {
        let mut state = self.controller.state.lock();
        for item in items {
            state.items.remove(&item.0);
        }
        Ok(())
    }

    async fn read(&self, address: &str) -> TransportResult<OpcUaValue> {
        self.require_session()?;
        self.controller
            .value(address)
            .ok_or_else(|| TransportError::operation(address, "BadNodeIdUnknown"))
    }

    async fn write(&self, address: &str, value: OpcUaValue) -> TransportResult<StatusCode> {
        self.require_session()?;
        let delay = self.controller.state.lock().write_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.controller.state.lock();
        state.writes.push((address.to_string(), value.clone()));
        if let Some(error) = state.write_failure.clone() {
            return Err(error);
        }

        let status = state
            .write_status
            .get(address)
            .copied()
            .unwrap_or(StatusCode::GOOD);
        if status.is_good() {
            state.values.insert(address.to_string(), value.clone());
            notify(&state, address, value);
        }
        Ok(status)
    }

    fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }

    fn display_name(&self) -> String {
        format!(
            "mock({})",
            self.endpoint.as_deref().unwrap_or("unconnected")
        )
    }
}

// =============================================================================
// MockTransportFactory
// =============================================================================

/// Hands out [`MockTransport`]s bound to one controller.
#[derive(Debug)]
pub struct MockTransportFactory {
    controller: Arc<MockController>,
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, _config: &SessionConfig) -> Box<dyn OpcUaTransport> {
        Box::new(MockTransport::new(self.controller.clone()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
