// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Station runtime orchestration.
//!
//! Wires the components explicitly, in dependency order:
//!
//! ```text
//!  StationConfig ─▶ TagRegistry ─▶ TagValueStore ─▶ DistributionChannel
//!                                        │                  │
//!                                        ▼                  ▼
//!                                  SessionManager ◀─────────┘
//!                                        │
//!                                  WriteGateway ─▶ ApiServer
//! ```
//!
//! Nothing is global: two runtimes in one process do not share state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use station_api::{ApiConfig, ApiServer, AppState};
use station_config::{StationConfig, load_config};
use station_core::channel::DistributionChannel;
use station_core::error::StationError;
use station_core::registry::TagRegistry;
use station_core::store::TagValueStore;
use station_opcua::{SessionManager, SessionState, TransportFactory, WriteGateway, default_factory};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// StationComponents
// =============================================================================

/// Handles to every long-lived component.
#[derive(Clone)]
pub struct StationComponents {
    /// Tag catalogue.
    pub registry: Arc<TagRegistry>,
    /// Current values.
    pub store: Arc<TagValueStore>,
    /// Fan-out to listeners.
    pub channel: Arc<DistributionChannel>,
    /// Upstream session.
    pub session: Arc<SessionManager>,
    /// Control write path.
    pub gateway: Arc<WriteGateway>,
}

impl StationComponents {
    fn build(config: &StationConfig, factory: Arc<dyn TransportFactory>) -> BinResult<Self> {
        let registry = Arc::new(config.registry()?);
        let store = Arc::new(TagValueStore::new(registry.clone()));
        let channel = Arc::new(DistributionChannel::new(store.clone()));
        let session = SessionManager::builder(store.clone(), channel.clone())
            .config(config.session.clone())
            .simulator(config.simulator.clone())
            .factory(factory)
            .build();
        let gateway = Arc::new(WriteGateway::new(session.clone(), store.clone()));

        Ok(Self {
            registry,
            store,
            channel,
            session,
            gateway,
        })
    }
}

// =============================================================================
// StationRuntime
// =============================================================================

/// The station service: components, API server and shutdown handling.
pub struct StationRuntime {
    config: Arc<StationConfig>,
    components: StationComponents,
    shutdown: ShutdownCoordinator,
    connect_on_start: bool,
}

impl StationRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Returns the component handles.
    pub fn components(&self) -> &StationComponents {
        &self.components
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown_coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Builds the API server over this runtime's components.
    pub fn api_server(&self) -> BinResult<ApiServer> {
        let state = AppState::builder()
            .config(ApiConfig::from(&self.config.api))
            .session(self.components.session.clone())
            .gateway(self.components.gateway.clone())
            .channel(self.components.channel.clone())
            .station(&self.config.station.id, &self.config.station.name)
            .build()?;
        Ok(ApiServer::new(state))
    }

    /// Starts the session manager.
    ///
    /// A controller that cannot be reached is not fatal: the service comes up
    /// Disconnected and clients may connect later. Configuration errors are.
    pub async fn init(&self) -> BinResult<SessionState> {
        match self.components.session.init(self.connect_on_start).await {
            Ok(state) => Ok(state),
            Err(e @ StationError::Configuration { .. }) => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Initial connect failed, continuing disconnected");
                Ok(self.components.session.state())
            }
        }
    }

    /// Runs until SIGINT/SIGTERM on the configured address.
    pub async fn run(self) -> BinResult<()> {
        let addr = self.config.api.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BinError::init(format!("Failed to bind {addr}: {e}")))?;
        self.run_on(listener).await
    }

    /// Runs on an already bound listener until shutdown.
    pub async fn run_on(self, listener: TcpListener) -> BinResult<()> {
        info!(
            station = %self.config.station.id,
            environment = %self.config.station.environment,
            tags = self.components.registry.len(),
            version = crate::VERSION,
            "Starting station"
        );

        let state = self.init().await?;
        info!(%state, endpoint = ?self.components.session.endpoint(), "Session ready");

        let server = self.api_server()?;
        let signals = {
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { shutdown.listen_for_signals().await })
        };

        let served = server
            .serve(listener, self.shutdown.shutdown_signal().wait())
            .await;

        // The server may also stop on its own error.
        self.shutdown.initiate_shutdown();
        signals.abort();
        self.components.session.shutdown().await;
        info!("Station shutdown complete");

        served.map_err(BinError::from)
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`StationRuntime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<StationConfig>,
    simulate: bool,
    connect_on_start: Option<bool>,
    port: Option<u16>,
    factory: Option<Arc<dyn TransportFactory>>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: StationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Forces the simulated strategy.
    pub fn simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Whether to connect to the configured endpoint on start. Default `true`.
    pub fn connect_on_start(mut self, connect: bool) -> Self {
        self.connect_on_start = Some(connect);
        self
    }

    /// Overrides the API port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the transport factory.
    pub fn factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<StationRuntime> {
        let mut config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => load_config(&path)?,
            (None, None) => return Err(BinError::config("No configuration provided")),
        };

        if self.simulate {
            config.enable_simulation()?;
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        config.validate()?;

        let factory = self.factory.unwrap_or_else(default_factory);
        let components = StationComponents::build(&config, factory)?;

        Ok(StationRuntime {
            config: Arc::new(config),
            components,
            shutdown: ShutdownCoordinator::new(),
            connect_on_start: self.connect_on_start.unwrap_or(true),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use station_config::{ConfigFormat, ConfigLoader, Environment};

    const CONFIG: &str = r#"
station:
  id: station-test
  environment: development
tags:
  - name: ARU
    address: "ns=1;s=ARU"
    type: boolean
    access: [read, write]
  - name: niveau
    address: "ns=1;s=niveau"
    type: int16
    access: [read]
    range: { min: 0, max: 100 }
"#;

    fn config() -> StationConfig {
        ConfigLoader::builder()
            .env_vars(std::iter::empty::<(String, String)>())
            .build()
            .load_from_str(CONFIG, ConfigFormat::Yaml)
            .unwrap()
    }

    #[test]
    fn test_build_requires_config() {
        assert!(matches!(
            RuntimeBuilder::new().build(),
            Err(BinError::Configuration(_))
        ));
    }

    #[test]
    fn test_simulation_refused_in_production() {
        let mut config = config();
        config.station.environment = Environment::Production;
        let result = RuntimeBuilder::new().config(config).simulate(true).build();
        assert!(matches!(result, Err(BinError::Config(_))));
    }

    #[tokio::test]
    async fn test_simulated_runtime_is_degraded() {
        let runtime = RuntimeBuilder::new()
            .config(config())
            .simulate(true)
            .port(0)
            .build()
            .unwrap();

        assert_eq!(runtime.init().await.unwrap(), SessionState::Degraded);
        assert!(!runtime.components().store.is_connected());
        runtime.components().session.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_controller_is_not_fatal() {
        let mut config = config();
        config.session.endpoint = Some("opc.tcp://127.0.0.1:4840".to_string());
        let runtime = RuntimeBuilder::new().config(config).build().unwrap();

        assert_eq!(runtime.init().await.unwrap(), SessionState::Disconnected);
    }
}
