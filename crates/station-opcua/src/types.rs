// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session, subscription and simulator settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

// =============================================================================
// Strategy
// =============================================================================

/// How the session manager talks to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStrategy {
    /// Open a real session through the transport.
    #[default]
    Real,
    /// Never touch the network; run the simulator in `Degraded` state.
    Simulated,
}

impl fmt::Display for SessionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStrategy::Real => f.write_str("real"),
            SessionStrategy::Simulated => f.write_str("simulated"),
        }
    }
}

/// What a failed real connect does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Return the connection error to the caller.
    #[default]
    Surface,
    /// Enter `Degraded` and start the simulator. Development only.
    Simulate,
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Subscription and monitored item parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionSettings {
    /// Publishing interval.
    #[serde(default = "default_publishing_interval", with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Sampling interval of each monitored item.
    #[serde(default = "default_sampling_interval", with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Server-side queue size per monitored item.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Drop the oldest queued value when the queue is full.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,

    /// Lifetime count.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Keep-alive count.
    #[serde(default = "default_keepalive_count")]
    pub keepalive_count: u32,
}

fn default_publishing_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_sampling_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_queue_size() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_lifetime_count() -> u32 {
    60
}

fn default_keepalive_count() -> u32 {
    10
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval: default_publishing_interval(),
            sampling_interval: default_sampling_interval(),
            queue_size: default_queue_size(),
            discard_oldest: true,
            lifetime_count: default_lifetime_count(),
            keepalive_count: default_keepalive_count(),
        }
    }
}

/// Parameters passed to the transport for one monitored item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorParams {
    /// Sampling interval.
    pub sampling_interval: Duration,
    /// Queue size.
    pub queue_size: u32,
    /// Discard oldest on overflow.
    pub discard_oldest: bool,
}

impl From<&SubscriptionSettings> for MonitorParams {
    fn from(settings: &SubscriptionSettings) -> Self {
        Self {
            sampling_interval: settings.sampling_interval,
            queue_size: settings.queue_size,
            discard_oldest: settings.discard_oldest,
        }
    }
}

// =============================================================================
// SessionConfig
// =============================================================================

/// Settings of the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Default endpoint, e.g. `opc.tcp://192.168.1.10:4840`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Bound on transport connect plus session creation.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Bound on a single read or write request.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Session timeout requested from the server.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Initial delay of the session primitive's own retries.
    #[serde(default = "default_retry_initial_delay", with = "humantime_serde")]
    pub retry_initial_delay: Duration,

    /// Retry limit of the session primitive.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Real or simulated session.
    #[serde(default)]
    pub strategy: SessionStrategy,

    /// Behaviour when a real connect fails.
    #[serde(default)]
    pub fallback: FallbackPolicy,

    /// Client application name announced to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Subscription parameters.
    #[serde(default)]
    pub subscription: SubscriptionSettings,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_retry_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_retries() -> u32 {
    10
}

fn default_application_name() -> String {
    "Station OPC UA Client".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            session_timeout: default_session_timeout(),
            retry_initial_delay: default_retry_initial_delay(),
            max_retries: default_max_retries(),
            strategy: SessionStrategy::default(),
            fallback: FallbackPolicy::default(),
            application_name: default_application_name(),
            subscription: SubscriptionSettings::default(),
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), TransportError> {
        if let Some(endpoint) = &self.endpoint {
            validate_endpoint(endpoint)?;
        }
        if self.connect_timeout.is_zero() {
            return Err(TransportError::configuration("connect_timeout must be greater than 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(TransportError::configuration("request_timeout must be greater than 0"));
        }
        if self.session_timeout.is_zero() {
            return Err(TransportError::configuration("session_timeout must be greater than 0"));
        }
        if self.subscription.sampling_interval.is_zero() {
            return Err(TransportError::configuration(
                "subscription.sampling_interval must be greater than 0",
            ));
        }
        if self.subscription.queue_size == 0 {
            return Err(TransportError::configuration(
                "subscription.queue_size must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Returns `true` if a failure may end in the simulator.
    pub fn allows_simulation(&self) -> bool {
        self.strategy == SessionStrategy::Simulated || self.fallback == FallbackPolicy::Simulate
    }

    /// Returns the application URI derived from the name.
    pub fn application_uri(&self) -> String {
        format!("urn:station:opcua:{}", self.application_name.replace(' ', ""))
    }
}

/// Checks that an endpoint URL uses the `opc.tcp` scheme.
pub fn validate_endpoint(endpoint: &str) -> Result<(), TransportError> {
    let Some(rest) = endpoint.strip_prefix("opc.tcp://") else {
        return Err(TransportError::configuration(format!(
            "endpoint '{}' must start with opc.tcp://",
            endpoint
        )));
    };
    if rest.is_empty() || rest.starts_with('/') {
        return Err(TransportError::configuration(format!(
            "endpoint '{}' has no host",
            endpoint
        )));
    }
    Ok(())
}

// =============================================================================
// SessionConfigBuilder
// =============================================================================

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    endpoint: Option<String>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    session_timeout: Option<Duration>,
    retry_initial_delay: Option<Duration>,
    max_retries: Option<u32>,
    strategy: Option<SessionStrategy>,
    fallback: Option<FallbackPolicy>,
    application_name: Option<String>,
    subscription: Option<SubscriptionSettings>,
}

impl SessionConfigBuilder {
    /// Sets the default endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the primitive's retry delay and limit.
    pub fn retries(mut self, initial_delay: Duration, max_retries: u32) -> Self {
        self.retry_initial_delay = Some(initial_delay);
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the strategy.
    pub fn strategy(mut self, strategy: SessionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets the fallback policy.
    pub fn fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the subscription settings.
    pub fn subscription(mut self, settings: SubscriptionSettings) -> Self {
        self.subscription = Some(settings);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<SessionConfig, TransportError> {
        let config = SessionConfig {
            endpoint: self.endpoint,
            connect_timeout: self.connect_timeout.unwrap_or_else(default_connect_timeout),
            request_timeout: self.request_timeout.unwrap_or_else(default_request_timeout),
            session_timeout: self.session_timeout.unwrap_or_else(default_session_timeout),
            retry_initial_delay: self
                .retry_initial_delay
                .unwrap_or_else(default_retry_initial_delay),
            max_retries: self.max_retries.unwrap_or_else(default_max_retries),
            strategy: self.strategy.unwrap_or_default(),
            fallback: self.fallback.unwrap_or_default(),
            application_name: self.application_name.unwrap_or_else(default_application_name),
            subscription: self.subscription.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// SimulatorSettings
// =============================================================================

/// Settings of the degraded-mode simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorSettings {
    /// Numeric tag that receives a new value every `level_interval`.
    #[serde(default = "default_level_tag")]
    pub level_tag: String,

    /// Period of level updates.
    #[serde(default = "default_level_interval", with = "humantime_serde")]
    pub level_interval: Duration,

    /// Boolean tags, one of which is flipped every `toggle_interval`.
    #[serde(default)]
    pub toggle_tags: Vec<String>,

    /// Period of boolean toggles.
    #[serde(default = "default_toggle_interval", with = "humantime_serde")]
    pub toggle_interval: Duration,
}

fn default_level_tag() -> String {
    "niveau".to_string()
}

fn default_level_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_toggle_interval() -> Duration {
    Duration::from_secs(15)
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            level_tag: default_level_tag(),
            level_interval: default_level_interval(),
            toggle_tags: Vec::new(),
            toggle_interval: default_toggle_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.subscription.sampling_interval, Duration::from_secs(1));
        assert_eq!(config.subscription.queue_size, 10);
        assert!(config.subscription.discard_oldest);
        assert!(!config.allows_simulation());
    }

    #[test]
    fn test_builder_validates_endpoint() {
        let result = SessionConfig::builder().endpoint("http://plc:4840").build();
        assert!(result.is_err());

        let config = SessionConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .fallback(FallbackPolicy::Simulate)
            .build()
            .unwrap();
        assert!(config.allows_simulation());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("opc.tcp://10.0.0.5:4840").is_ok());
        assert!(validate_endpoint("opc.tcp://").is_err());
        assert!(validate_endpoint("tcp://x").is_err());
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"connect_timeout": "3s", "strategy": "simulated", "subscription": {"queue_size": 4}}"#,
        )
        .unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.strategy, SessionStrategy::Simulated);
        assert_eq!(config.subscription.queue_size, 4);
        assert_eq!(config.subscription.publishing_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_simulator_defaults() {
        let settings = SimulatorSettings::default();
        assert_eq!(settings.level_tag, "niveau");
        assert_eq!(settings.level_interval, Duration::from_secs(5));
        assert_eq!(settings.toggle_interval, Duration::from_secs(15));
    }
}
