// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```yaml
//! station:   { id, name, environment }
//! session:   { endpoint, connect_timeout, ..., strategy, fallback, subscription }
//! tags:      [ { name, address, type, access, range } ]
//! simulator: { level_tag, level_interval, toggle_tags, toggle_interval }
//! api:       { bind_address, port, request_timeout, keep_alive, listener_buffer, cors }
//! logging:   { level, format }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use station_core::registry::{TagDefinition, TagRegistry};
use station_core::types::{AccessRights, ValueRange, ValueType};
use station_opcua::types::{SessionConfig, SessionStrategy, SimulatorSettings};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default API port.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default SSE keep-alive period.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Default per-listener event buffer.
pub const DEFAULT_LISTENER_BUFFER: usize = 256;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// Root configuration of a station.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationConfig {
    /// Station identification.
    #[serde(default)]
    pub station: StationSection,

    /// Upstream session.
    #[serde(default)]
    pub session: SessionConfig,

    /// Tag catalogue.
    #[serde(default)]
    pub tags: Vec<TagConfig>,

    /// Degraded-mode simulator.
    #[serde(default)]
    pub simulator: SimulatorSettings,

    /// HTTP server.
    #[serde(default)]
    pub api: ApiSettings,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl StationConfig {
    /// Validates the whole configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.station.validate()?;

        if self.tags.is_empty() {
            return Err(ConfigError::validation("tags", "at least one tag is required"));
        }
        let mut names = HashSet::new();
        for (i, tag) in self.tags.iter().enumerate() {
            if !names.insert(tag.name.as_str()) {
                return Err(ConfigError::duplicate_tag(&tag.name));
            }
            tag.validate(i)?;
        }

        self.session
            .validate()
            .map_err(|e| ConfigError::validation("session", e.to_string()))?;

        if self.session.allows_simulation() {
            if self.station.environment.is_production() {
                return Err(ConfigError::validation(
                    "session",
                    "simulation (strategy: simulated or fallback: simulate) is not allowed in production",
                ));
            }
            self.validate_simulator()?;
        }

        self.api.validate()?;
        Ok(())
    }

    fn validate_simulator(&self) -> ConfigResult<()> {
        let level = self
            .tag(&self.simulator.level_tag)
            .ok_or_else(|| ConfigError::validation("simulator.level_tag", "unknown tag"))?;
        if !level.access.can_read() || !level.value_type.is_numeric() {
            return Err(ConfigError::validation(
                "simulator.level_tag",
                "must be a readable int16 or float tag",
            ));
        }

        for name in &self.simulator.toggle_tags {
            let valid = self
                .tag(name)
                .is_some_and(|t| t.access.can_read() && t.value_type == ValueType::Boolean);
            if !valid {
                return Err(ConfigError::validation(
                    "simulator.toggle_tags",
                    format!("'{name}' must be a readable boolean tag"),
                ));
            }
        }
        Ok(())
    }

    /// Returns a tag by name.
    pub fn tag(&self, name: &str) -> Option<&TagConfig> {
        self.tags.iter().find(|t| t.name == name)
    }

    /// Builds the tag registry.
    pub fn registry(&self) -> ConfigResult<TagRegistry> {
        TagRegistry::new(self.tags.iter().map(TagConfig::to_definition))
            .map_err(|e| ConfigError::validation("tags", e.to_string()))
    }

    /// Switches the session to the simulated strategy.
    ///
    /// Refused in production.
    pub fn enable_simulation(&mut self) -> ConfigResult<()> {
        if self.station.environment.is_production() {
            return Err(ConfigError::validation(
                "session.strategy",
                "simulation is not allowed in production",
            ));
        }
        self.session.strategy = SessionStrategy::Simulated;
        self.validate_simulator()
    }

    /// Returns `true` when the configuration may ever simulate values.
    pub fn simulation_enabled(&self) -> bool {
        self.session.allows_simulation()
    }
}

// =============================================================================
// Station Section
// =============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Plant deployment. Simulation is forbidden.
    #[default]
    Production,
    /// Pre-production.
    Staging,
    /// Developer machine.
    Development,
}

impl Environment {
    /// Returns `true` for production.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Station identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationSection {
    /// Station identifier.
    #[serde(default = "default_station_id")]
    pub id: String,

    /// Display name.
    #[serde(default = "default_station_name")]
    pub name: String,

    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,
}

fn default_station_id() -> String {
    "station-01".to_string()
}

fn default_station_name() -> String {
    "Water Treatment Station".to_string()
}

impl StationSection {
    fn validate(&self) -> ConfigResult<()> {
        if self.id.is_empty() {
            return Err(ConfigError::validation("station.id", "cannot be empty"));
        }
        if self.id.len() > 64 {
            return Err(ConfigError::validation("station.id", "cannot exceed 64 characters"));
        }
        Ok(())
    }
}

impl Default for StationSection {
    fn default() -> Self {
        Self {
            id: default_station_id(),
            name: default_station_name(),
            environment: Environment::default(),
        }
    }
}

// =============================================================================
// Tags
// =============================================================================

/// One tag entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagConfig {
    /// Tag name.
    pub name: String,

    /// Node address on the controller.
    pub address: String,

    /// Declared value type.
    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Access modes, e.g. `[read, write]`.
    pub access: AccessRights,

    /// Numeric range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ValueRange>,
}

impl TagConfig {
    fn validate(&self, index: usize) -> ConfigResult<()> {
        let field = |name: &str| format!("tags[{index}].{name}");

        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(field("name"), "cannot be empty"));
        }
        if self.address.trim().is_empty() {
            return Err(ConfigError::validation(field("address"), "cannot be empty"));
        }
        if self.access.is_empty() {
            return Err(ConfigError::validation(field("access"), "needs read or write"));
        }
        if let Some(range) = &self.range {
            if !self.value_type.is_numeric() {
                return Err(ConfigError::validation(
                    field("range"),
                    format!("not allowed on a {} tag", self.value_type),
                ));
            }
            if !range.is_valid() {
                return Err(ConfigError::validation(field("range"), "min must be below max"));
            }
        }
        Ok(())
    }

    /// Converts into a registry definition.
    pub fn to_definition(&self) -> TagDefinition {
        let definition =
            TagDefinition::new(&self.name, &self.address, self.value_type, self.access);
        match self.range {
            Some(range) => definition.with_range(range.min, range.max),
            None => definition,
        }
    }
}

// =============================================================================
// API
// =============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSettings {
    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listen port.
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Per-request timeout. Does not apply to the event stream.
    #[serde(default = "default_api_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Keep-alive period of the event stream.
    #[serde(default = "default_keep_alive", with = "humantime_serde")]
    pub keep_alive: Duration,

    /// Events buffered per listener before it counts as lagging.
    #[serde(default = "default_listener_buffer")]
    pub listener_buffer: usize,

    /// CORS settings.
    #[serde(default)]
    pub cors: CorsSettings,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_api_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_keep_alive() -> Duration {
    DEFAULT_KEEP_ALIVE
}

fn default_listener_buffer() -> usize {
    DEFAULT_LISTENER_BUFFER
}

impl ApiSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::validation("api.request_timeout", "cannot be zero"));
        }
        if self.keep_alive.is_zero() {
            return Err(ConfigError::validation("api.keep_alive", "cannot be zero"));
        }
        if self.listener_buffer == 0 {
            return Err(ConfigError::validation("api.listener_buffer", "cannot be zero"));
        }
        Ok(())
    }

    /// Returns the socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: DEFAULT_API_PORT,
            request_timeout: default_api_request_timeout(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            listener_buffer: DEFAULT_LISTENER_BUFFER,
            cors: CorsSettings::default(),
        }
    }
}

/// CORS settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsSettings {
    /// Allowed origins. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

// =============================================================================
// Logging
// =============================================================================

/// Logging settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level, accepting `warning`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Text,
    /// Newline-delimited JSON.
    Json,
    /// Single-line compact.
    Compact,
}

// =============================================================================
// Tests
// =============================================================================
