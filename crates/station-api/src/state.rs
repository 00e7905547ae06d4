// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use station_core::channel::DistributionChannel;
use station_core::error::StationResult;
use station_core::store::TagValueStore;
use station_opcua::{SessionManager, SessionState, WriteGateway};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

// =============================================================================
// AppState
// =============================================================================

/// Application state shared across all handlers.
///
/// Every field is a cheap handle; cloning the state clones the handles.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// The upstream session.
    pub session: Arc<SessionManager>,
    /// Control write path.
    pub gateway: Arc<WriteGateway>,
    /// Fan-out of tag changes.
    pub channel: Arc<DistributionChannel>,
    /// Station identifier.
    pub station_id: Arc<str>,
    /// Station display name.
    pub station_name: Arc<str>,
    started_at: Instant,
}

impl AppState {
    /// Creates a new app state builder.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Returns the tag value store.
    pub fn store(&self) -> &Arc<TagValueStore> {
        self.channel.store()
    }

    /// Returns seconds since the state was built.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Connects to `endpoint` when one is given.
    ///
    /// A no-op when the session is already live on that endpoint.
    pub async fn ensure_connected(&self, endpoint: Option<&str>) -> StationResult<()> {
        let Some(endpoint) = endpoint.map(str::trim).filter(|e| !e.is_empty()) else {
            return Ok(());
        };
        let state = self.session.connect(endpoint).await?;
        if state == SessionState::Degraded {
            tracing::debug!(endpoint, "Serving simulated values");
        }
        Ok(())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("station_id", &self.station_id)
            .field("session", &self.session)
            .field("listeners", &self.channel.listener_count())
            .finish()
    }
}

// =============================================================================
// AppStateBuilder
// =============================================================================

/// Builder for constructing [`AppState`].
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<ApiConfig>,
    session: Option<Arc<SessionManager>>,
    gateway: Option<Arc<WriteGateway>>,
    channel: Option<Arc<DistributionChannel>>,
    station_id: Option<String>,
    station_name: Option<String>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the session manager.
    pub fn session(mut self, session: Arc<SessionManager>) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the write gateway. Defaults to one over the session.
    pub fn gateway(mut self, gateway: Arc<WriteGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Sets the distribution channel.
    pub fn channel(mut self, channel: Arc<DistributionChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the station identity.
    pub fn station(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.station_id = Some(id.into());
        self.station_name = Some(name.into());
        self
    }

    /// Builds the state.
    pub fn build(self) -> ApiResult<AppState> {
        let session = self
            .session
            .ok_or_else(|| ApiError::internal("session manager is required"))?;
        let channel = self
            .channel
            .ok_or_else(|| ApiError::internal("distribution channel is required"))?;
        let gateway = self.gateway.unwrap_or_else(|| {
            Arc::new(WriteGateway::new(session.clone(), channel.store().clone()))
        });

        Ok(AppState {
            config: Arc::new(self.config.unwrap_or_default()),
            session,
            gateway,
            channel,
            station_id: self.station_id.unwrap_or_else(|| "station".to_string()).into(),
            station_name: self.station_name.unwrap_or_default().into(),
            started_at: Instant::now(),
        })
    }
}
