// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API request and response types.

use serde::{Deserialize, Serialize};

use station_core::channel::ChannelStats;
use station_core::registry::TagDefinition;
use station_core::types::{AccessRights, TagValue, ValueRange, ValueType};
use station_opcua::client::{SessionState, SessionStatsSnapshot, SubscriptionStats};
use station_opcua::GatewayStats;

// =============================================================================
// Requests
// =============================================================================

/// Query of `GET /api/stream`.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Endpoint to connect to before streaming.
    pub endpoint: Option<String>,
}

/// Body of `POST /api/write`.
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    /// Tag name.
    pub tag: String,
    /// Value, coerced to the tag's declared type.
    pub value: serde_json::Value,
    /// Endpoint to connect to before writing.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Body of the connection endpoints.
#[derive(Debug, Deserialize)]
pub struct EndpointRequest {
    /// Controller endpoint, `opc.tcp://host:port`.
    pub endpoint: String,
}

// =============================================================================
// Write / Connection
// =============================================================================

/// Response of an accepted write.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    /// Always `true`.
    pub success: bool,
    /// Tag name.
    pub tag: String,
    /// The typed value written.
    pub value: TagValue,
}

/// Response of `POST /api/connection/test`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionTestResponse {
    /// Whether the probe succeeded.
    pub success: bool,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionTestResponse {
    /// A successful probe.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed probe.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Response of the connect and disconnect endpoints.
#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    /// Always `true`.
    pub success: bool,
    /// Session state after the call.
    pub state: SessionState,
    /// Current endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

// =============================================================================
// Tags
// =============================================================================

/// A registered tag and its current value.
#[derive(Debug, Serialize)]
pub struct TagResponse {
    /// Tag name.
    pub name: String,
    /// Node address on the controller.
    pub address: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Access modes.
    pub access: AccessRights,
    /// Numeric range, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<ValueRange>,
    /// Current value, `null` until first observed.
    pub value: Option<TagValue>,
}

impl TagResponse {
    /// Builds a response from a definition and its current value.
    pub fn new(definition: &TagDefinition, value: Option<TagValue>) -> Self {
        Self {
            name: definition.name.clone(),
            address: definition.remote_address.clone(),
            value_type: definition.value_type,
            access: definition.access,
            range: definition.range,
            value,
        }
    }
}

/// Response of `GET /api/tags`.
#[derive(Debug, Serialize)]
pub struct TagsResponse {
    /// Whether values reflect a live controller.
    pub connected: bool,
    /// Tags ordered by registration.
    pub tags: Vec<TagResponse>,
}

// =============================================================================
// Status
// =============================================================================

/// Response of `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Station identifier.
    pub station_id: String,
    /// Station display name.
    pub station_name: String,
    /// Service version.
    pub version: String,
    /// Session state.
    pub state: SessionState,
    /// Current endpoint.
    pub endpoint: Option<String>,
    /// Whether the store is marked connected.
    pub connected: bool,
    /// Attached stream listeners.
    pub listeners: usize,
    /// Registered tags.
    pub tag_count: usize,
    /// Tags with a live monitored item.
    pub monitored_tags: Vec<String>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Session counters.
    pub session: SessionStatsSnapshot,
    /// Subscription counters, while subscribed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionStats>,
    /// Distribution counters.
    pub channel: ChannelStats,
    /// Write counters.
    pub writes: GatewayStats,
}

/// One event of `GET /api/status/stream`.
#[derive(Debug, Serialize)]
pub struct StateEvent {
    /// Session state.
    pub state: SessionState,
    /// Current endpoint.
    pub endpoint: Option<String>,
}

// =============================================================================
// Health
// =============================================================================

/// Liveness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status string.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Response time, RFC 3339.
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a healthy response.
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Readiness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether every component is ready.
    pub ready: bool,
    /// Per-component status.
    pub components: Vec<ComponentStatus>,
}

/// Status of a single component.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Component name.
    pub name: String,
    /// Whether it is healthy.
    pub healthy: bool,
    /// Additional detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
