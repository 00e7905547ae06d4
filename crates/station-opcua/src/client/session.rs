// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol session manager.
//!
//! Owns the one upstream session of the station and everything hanging off
//! it: the transport, the subscription engine and, in degraded mode, the
//! simulator.
//!
//! ```text
//!                 connect(e)
//!  Disconnected ─────────────▶ Connecting ──ok──────────────▶ Connected
//!       ▲                          │                            │
//!       │                          ├─fail, fallback=surface─────┤
//!       │                          │                            │ disconnect /
//!       │                          └─fail, fallback=simulate──┐ │ connection lost
//!       │                                                     ▼ │
//!       └────────────── disconnect ─────────────────────── Degraded
//! ```
//!
//! All mutation happens under one async lock, so connect, disconnect, read
//! and write are serialized. A connect to another endpoint while one is in
//! flight is refused instead of queued.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use station_core::channel::DistributionChannel;
use station_core::error::{ConnectionError, StationError, StationResult};
use station_core::registry::TagRegistry;
use station_core::store::TagValueStore;

use crate::client::subscription::{ConnectionLostHook, SubscriptionEngine, SubscriptionStats};
use crate::client::transport::{
    OpcUaTransport, OpcUaValue, StatusCode, TransportFactory, default_factory,
};
use crate::error::{TransportError, TransportResult};
use crate::simulator::{Simulator, SimulatorHandle};
use crate::types::{
    FallbackPolicy, SessionConfig, SessionStrategy, SimulatorSettings, validate_endpoint,
};

/// Endpoint recorded for a simulated session started without one.
pub const SIMULATED_ENDPOINT: &str = "opc.tcp://simulated";

// =============================================================================
// SessionState
// =============================================================================

/// State of the upstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session.
    #[default]
    Disconnected,
    /// A connect is in progress.
    Connecting,
    /// A real session is live.
    Connected,
    /// The simulator stands in for the controller.
    Degraded,
}

impl SessionState {
    /// Returns `true` for `Connected`.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` when values are flowing, real or simulated.
    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connected | Self::Degraded)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Degraded => write!(f, "Degraded"),
        }
    }
}

// =============================================================================
// SessionStats
// =============================================================================

/// Counters of session activity.
#[derive(Debug, Default)]
pub struct SessionStats {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    disconnects: AtomicU64,
    connection_losses: AtomicU64,
    degraded_entries: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

/// Serializable copy of [`SessionStats`].
#[derive(Debug, Default, Clone, Serialize)]
pub struct SessionStatsSnapshot {
    /// Connect attempts.
    pub connects: u64,
    /// Failed connect attempts.
    pub connect_failures: u64,
    /// Explicit disconnects of an active session.
    pub disconnects: u64,
    /// Connections lost underneath the session.
    pub connection_losses: u64,
    /// Times degraded mode was entered.
    pub degraded_entries: u64,
    /// Writes forwarded to the transport.
    pub writes: u64,
    /// Writes that did not return Good.
    pub write_failures: u64,
}

impl SessionStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the counters.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
            degraded_entries: self.degraded_entries.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// SessionManager
// =============================================================================

#[derive(Default)]
struct Inner {
    transport: Option<Box<dyn OpcUaTransport>>,
    engine: Option<SubscriptionEngine>,
    simulator: Option<SimulatorHandle>,
    /// Bumped on every connect and teardown; stale loss reports are ignored.
    generation: u64,
    attempts: u64,
    last_failure: Option<(u64, ConnectionError)>,
}

struct InFlight {
    endpoint: String,
    attempt: u64,
}

/// Clears the in-flight marker even if the connect future is dropped.
struct InFlightGuard<'a>(&'a parking_lot::Mutex<Option<InFlight>>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

/// Manages the single upstream session.
pub struct SessionManager {
    config: SessionConfig,
    simulator: SimulatorSettings,
    registry: Arc<TagRegistry>,
    store: Arc<TagValueStore>,
    channel: Arc<DistributionChannel>,
    factory: Arc<dyn TransportFactory>,
    inner: Mutex<Inner>,
    in_flight: parking_lot::Mutex<Option<InFlight>>,
    state: watch::Sender<SessionState>,
    endpoint: RwLock<Option<String>>,
    stats: SessionStats,
    shut_down: AtomicBool,
    this: Weak<SessionManager>,
}

impl SessionManager {
    /// Creates a builder over the given store and channel.
    pub fn builder(
        store: Arc<TagValueStore>,
        channel: Arc<DistributionChannel>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            store,
            channel,
            config: SessionConfig::default(),
            simulator: SimulatorSettings::default(),
            factory: None,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the manager, optionally connecting to the configured endpoint.
    ///
    /// With the simulated strategy and no endpoint, the simulator starts on
    /// [`SIMULATED_ENDPOINT`].
    pub async fn init(&self, connect: bool) -> StationResult<SessionState> {
        tracing::info!(
            strategy = %self.config.strategy,
            transport = self.factory.name(),
            tags = self.registry.len(),
            "Session manager initialized"
        );

        if !connect {
            return Ok(self.state());
        }

        match (&self.config.endpoint, self.config.strategy) {
            (Some(endpoint), _) => self.connect(endpoint).await,
            (None, SessionStrategy::Simulated) => self.connect(SIMULATED_ENDPOINT).await,
            (None, SessionStrategy::Real) => {
                tracing::info!("No endpoint configured, waiting for a client to connect");
                Ok(self.state())
            }
        }
    }

    /// Disconnects and refuses further connects.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.disconnect().await;
        tracing::info!("Session manager shut down");
    }

    // =========================================================================
    // Connect / disconnect
    // =========================================================================

    /// Ensures a session to `endpoint` and returns the resulting state.
    ///
    /// Already live on the same endpoint is a no-op. A different endpoint
    /// tears the current session down first.
    pub async fn connect(&self, endpoint: &str) -> StationResult<SessionState> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(StationError::transport_closed("session manager is shut down"));
        }
        validate_endpoint(endpoint).map_err(|e| StationError::configuration(e.to_string()))?;

        let joined = {
            let in_flight = self.in_flight.lock();
            match in_flight.as_ref() {
                Some(f) if f.endpoint != endpoint => {
                    return Err(ConnectionError::already_connecting(&f.endpoint, endpoint).into());
                }
                Some(f) => Some(f.attempt),
                None => None,
            }
        };

        let mut inner = self.inner.lock().await;

        // A concurrent connect to the same endpoint shares the outcome of the
        // attempt it waited for.
        if let (Some(attempt), Some((failed, error))) = (joined, &inner.last_failure) {
            if *failed == attempt {
                return Err(error.clone().into());
            }
        }

        let state = self.state();
        if state.is_live() && self.endpoint().as_deref() == Some(endpoint) {
            tracing::debug!(%endpoint, %state, "Already connected");
            return Ok(state);
        }

        inner.attempts += 1;
        let attempt = inner.attempts;
        *self.in_flight.lock() = Some(InFlight {
            endpoint: endpoint.to_string(),
            attempt,
        });
        let _guard = InFlightGuard(&self.in_flight);

        if state != SessionState::Disconnected || inner.transport.is_some() {
            tracing::info!(from = ?self.endpoint(), to = %endpoint, "Switching endpoint");
            self.teardown(&mut inner).await;
        }

        match self.establish(&mut inner, endpoint).await {
            Ok(state) => {
                inner.last_failure = None;
                Ok(state)
            }
            Err(error) => {
                inner.last_failure = Some((attempt, error.clone()));
                Err(error.into())
            }
        }
    }

    /// Tears everything down. Always succeeds and is idempotent.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if self.state() != SessionState::Disconnected || inner.transport.is_some() {
            SessionStats::bump(&self.stats.disconnects);
            tracing::info!(endpoint = ?self.endpoint(), "Disconnecting");
        }
        self.teardown(&mut inner).await;
    }

    /// Runs a connect/session/close/disconnect round-trip on a fresh
    /// transport without touching the shared session.
    pub async fn probe(&self, endpoint: &str) -> StationResult<()> {
        validate_endpoint(endpoint).map_err(|e| StationError::configuration(e.to_string()))?;

        let mut transport = self.factory.create(&self.config);
        let opened = tokio::time::timeout(self.config.connect_timeout, async {
            transport.connect(endpoint).await?;
            transport.create_session().await
        })
        .await;

        let result = match opened {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into_connection_error(endpoint)),
            Err(_) => Err(ConnectionError::timeout_at(endpoint, self.config.connect_timeout)),
        };

        if result.is_ok() {
            self.best_effort("close_session", transport.close_session()).await;
        }
        self.best_effort("disconnect", transport.disconnect()).await;

        match &result {
            Ok(()) => tracing::info!(%endpoint, "Probe succeeded"),
            Err(e) => tracing::info!(%endpoint, error = %e, "Probe failed"),
        }
        result.map_err(Into::into)
    }

    async fn establish(
        &self,
        inner: &mut Inner,
        endpoint: &str,
    ) -> Result<SessionState, ConnectionError> {
        SessionStats::bump(&self.stats.connects);
        self.set_state(SessionState::Connecting);

        if self.config.strategy == SessionStrategy::Simulated {
            self.enter_degraded(inner, endpoint);
            return Ok(SessionState::Degraded);
        }

        tracing::info!(%endpoint, timeout = ?self.config.connect_timeout, "Connecting");
        let mut transport = self.factory.create(&self.config);
        let opened = tokio::time::timeout(self.config.connect_timeout, async {
            transport.connect(endpoint).await?;
            transport.create_session().await
        })
        .await;

        let failure = match opened {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.into_connection_error(endpoint)),
            Err(_) => Some(ConnectionError::timeout_at(endpoint, self.config.connect_timeout)),
        };

        if let Some(error) = failure {
            SessionStats::bump(&self.stats.connect_failures);
            self.best_effort("disconnect", transport.disconnect()).await;

            if self.config.fallback == FallbackPolicy::Simulate {
                tracing::warn!(%endpoint, %error, "Connection failed, entering degraded mode");
                self.enter_degraded(inner, endpoint);
                return Ok(SessionState::Degraded);
            }

            tracing::warn!(%endpoint, %error, "Connection failed");
            self.set_state(SessionState::Disconnected);
            return Err(error);
        }

        inner.generation += 1;
        let hook = self.connection_lost_hook(inner.generation);

        self.store.set_connected(true);
        *self.endpoint.write() = Some(endpoint.to_string());
        self.set_state(SessionState::Connected);
        tracing::info!(%endpoint, "Connected");

        match SubscriptionEngine::start(
            transport.as_mut(),
            &self.registry,
            self.store.clone(),
            self.channel.clone(),
            &self.config.subscription,
            hook,
        )
        .await
        {
            Ok(engine) => inner.engine = Some(engine),
            Err(e) => tracing::error!(error = %e, "Failed to create subscription"),
        }
        inner.transport = Some(transport);

        Ok(SessionState::Connected)
    }

    fn enter_degraded(&self, inner: &mut Inner, endpoint: &str) {
        SessionStats::bump(&self.stats.degraded_entries);
        let simulator = Simulator::new(
            self.simulator.clone(),
            &self.registry,
            self.store.clone(),
            self.channel.clone(),
        );
        inner.simulator = Some(simulator.spawn());
        self.store.set_connected(false);
        *self.endpoint.write() = Some(endpoint.to_string());
        self.set_state(SessionState::Degraded);
    }

    /// Subscription, then session, then transport; each step best-effort.
    async fn teardown(&self, inner: &mut Inner) {
        if let Some(simulator) = inner.simulator.take() {
            simulator.stop().await;
        }

        if let Some(mut transport) = inner.transport.take() {
            if let Some(engine) = inner.engine.take() {
                engine.stop(transport.as_mut()).await;
            }
            self.best_effort("close_session", transport.close_session()).await;
            self.best_effort("disconnect", transport.disconnect()).await;
        }

        inner.generation += 1;
        self.store.reset_to_initial();
        *self.endpoint.write() = None;
        self.set_state(SessionState::Disconnected);
    }

    async fn best_effort<F>(&self, step: &'static str, operation: F)
    where
        F: Future<Output = TransportResult<()>>,
    {
        match tokio::time::timeout(self.config.request_timeout, operation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(step, error = %e, "Teardown step failed"),
            Err(_) => tracing::warn!(step, "Teardown step timed out"),
        }
    }

    fn connection_lost_hook(&self, generation: u64) -> ConnectionLostHook {
        let this = self.this.clone();
        Arc::new(move |reason: String| {
            let this = this.clone();
            tokio::spawn(async move {
                if let Some(manager) = this.upgrade() {
                    manager.handle_connection_lost(generation, &reason).await;
                }
            });
        })
    }

    async fn handle_connection_lost(&self, generation: u64, reason: &str) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation || self.state() != SessionState::Connected {
            return;
        }
        SessionStats::bump(&self.stats.connection_losses);
        tracing::warn!(endpoint = ?self.endpoint(), %reason, "Connection lost");
        self.teardown(&mut inner).await;
    }

    // =========================================================================
    // Read / write
    // =========================================================================

    /// Writes a value on the live session.
    ///
    /// Serialized with connect and disconnect. Bounded by the request
    /// timeout. A transport-reported loss tears the session down.
    pub async fn write(&self, address: &str, value: OpcUaValue) -> TransportResult<StatusCode> {
        let mut inner = self.inner.lock().await;
        if self.state() != SessionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let Some(transport) = inner.transport.as_ref() else {
            return Err(TransportError::NotConnected);
        };

        SessionStats::bump(&self.stats.writes);
        let result = match tokio::time::timeout(
            self.config.request_timeout,
            transport.write(address, value),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout("write", self.config.request_timeout)),
        };

        match &result {
            Ok(status) if status.is_good() => {}
            Ok(_) => SessionStats::bump(&self.stats.write_failures),
            Err(e) => {
                SessionStats::bump(&self.stats.write_failures);
                if e.is_connection_lost() {
                    SessionStats::bump(&self.stats.connection_losses);
                    tracing::warn!(error = %e, "Connection lost during write");
                    self.teardown(&mut inner).await;
                }
            }
        }
        result
    }

    /// Reads a value on the live session.
    pub async fn read(&self, address: &str) -> TransportResult<OpcUaValue> {
        let inner = self.inner.lock().await;
        if self.state() != SessionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let Some(transport) = inner.transport.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        match tokio::time::timeout(self.config.request_timeout, transport.read(address)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout("read", self.config.request_timeout)),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Returns the endpoint of the live session.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    /// Returns session counters.
    pub fn stats(&self) -> SessionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the names of currently monitored tags.
    pub async fn monitored_tags(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .engine
            .as_ref()
            .map(|e| e.monitored_tags().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Returns subscription statistics, if subscribed.
    pub async fn subscription_stats(&self) -> Option<SubscriptionStats> {
        self.inner.lock().await.engine.as_ref().map(|e| e.stats())
    }

    fn set_state(&self, new_state: SessionState) {
        let old_state = self.state.send_replace(new_state);
        if old_state != new_state {
            tracing::debug!(%old_state, %new_state, "Session state changed");
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("endpoint", &self.endpoint())
            .field("strategy", &self.config.strategy)
            .finish()
    }
}

// =============================================================================
// SessionManagerBuilder
// =============================================================================

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    store: Arc<TagValueStore>,
    channel: Arc<DistributionChannel>,
    config: SessionConfig,
    simulator: SimulatorSettings,
    factory: Option<Arc<dyn TransportFactory>>,
}

impl SessionManagerBuilder {
    /// Sets the session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the simulator settings.
    pub fn simulator(mut self, settings: SimulatorSettings) -> Self {
        self.simulator = settings;
        self
    }

    /// Sets the transport factory. Defaults to [`default_factory`].
    pub fn factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Builds the manager.
    pub fn build(self) -> Arc<SessionManager> {
        let registry = self.store.registry().clone();
        let factory = self.factory.unwrap_or_else(default_factory);
        let (state, _) = watch::channel(SessionState::Disconnected);

        Arc::new_cyclic(|this| SessionManager {
            config: self.config,
            simulator: self.simulator,
            registry,
            store: self.store,
            channel: self.channel,
            factory,
            inner: Mutex::new(Inner::default()),
            in_flight: parking_lot::Mutex::new(None),
            state,
            endpoint: RwLock::new(None),
            stats: SessionStats::default(),
            shut_down: AtomicBool::new(false),
            this: this.clone(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::UnavailableTransportFactory;
    use station_core::registry::TagDefinition;
    use station_core::types::{AccessRights, TagValue, ValueType};

    fn manager(config: SessionConfig) -> Arc<SessionManager> {
        let registry = Arc::new(
            TagRegistry::new([
                TagDefinition::new("ARU", "ns=1;s=ARU", ValueType::Boolean, AccessRights::READ_WRITE),
                TagDefinition::new("niveau", "ns=1;s=niveau", ValueType::Int16, AccessRights::READ),
            ])
            .unwrap(),
        );
        let store = Arc::new(TagValueStore::new(registry));
        let channel = Arc::new(DistributionChannel::new(store.clone()));
        SessionManager::builder(store, channel)
            .config(config)
            .factory(Arc::new(UnavailableTransportFactory))
            .build()
    }

    #[test]
    fn test_session_state() {
        assert!(SessionState::Connected.is_connected());
        assert!(SessionState::Degraded.is_live());
        assert!(!SessionState::Degraded.is_connected());
        assert_eq!(
            serde_json::to_value(SessionState::Degraded).unwrap(),
            serde_json::json!("degraded")
        );
    }

    #[tokio::test]
    async fn test_refused_connect_surfaces_error() {
        let manager = manager(SessionConfig::default());
        let err = manager.connect("opc.tcp://plc:4840").await.unwrap_err();
        assert!(matches!(
            err,
            StationError::Connection(ConnectionError::Refused { .. })
        ));
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(manager.stats().connect_failures, 1);
    }

    #[tokio::test]
    async fn test_invalid_endpoint() {
        let manager = manager(SessionConfig::default());
        let err = manager.connect("http://plc").await.unwrap_err();
        assert!(matches!(err, StationError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_fallback_enters_degraded() {
        let config = SessionConfig {
            fallback: FallbackPolicy::Simulate,
            ..Default::default()
        };
        let manager = manager(config);

        let state = manager.connect("opc.tcp://plc:4840").await.unwrap();
        assert_eq!(state, SessionState::Degraded);
        assert!(!manager.store.is_connected());
        assert!(manager.store.get("niveau").unwrap().is_some());

        // same endpoint is a no-op
        assert_eq!(
            manager.connect("opc.tcp://plc:4840").await.unwrap(),
            SessionState::Degraded
        );

        manager.disconnect().await;
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(manager.store.get("niveau").unwrap(), None);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let manager = manager(SessionConfig::default());
        manager.disconnect().await;
        manager.disconnect().await;
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(manager.stats().disconnects, 0);
    }

    #[tokio::test]
    async fn test_write_requires_connection() {
        let manager = manager(SessionConfig::default());
        let err = manager
            .write("ns=1;s=ARU", OpcUaValue::from(&TagValue::Boolean(true)))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotConnected);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_connect() {
        let config = SessionConfig {
            strategy: SessionStrategy::Simulated,
            ..Default::default()
        };
        let manager = manager(config);
        assert_eq!(manager.init(true).await.unwrap(), SessionState::Degraded);
        assert_eq!(manager.endpoint().as_deref(), Some(SIMULATED_ENDPOINT));

        manager.shutdown().await;
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert!(manager.connect("opc.tcp://plc:4840").await.is_err());
    }
}
