// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use station_config::ApiSettings;

/// Runtime configuration of the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host address.
    pub host: IpAddr,
    /// Server port.
    pub port: u16,
    /// Request timeout, applied until the response head is produced.
    pub request_timeout: Duration,
    /// Keep-alive period of event streams.
    pub keep_alive: Duration,
    /// Events buffered per stream listener.
    pub listener_buffer: usize,
    /// Allowed CORS origins. Empty allows any.
    pub allowed_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(15),
            listener_buffer: 256,
            allowed_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the keep-alive period.
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the per-listener buffer.
    pub fn with_listener_buffer(mut self, buffer: usize) -> Self {
        self.listener_buffer = buffer.max(1);
        self
    }
}

impl From<&ApiSettings> for ApiConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            host: settings.bind_address,
            port: settings.port,
            request_timeout: settings.request_timeout,
            keep_alive: settings.keep_alive,
            listener_buffer: settings.listener_buffer.max(1),
            allowed_origins: settings.cors.allowed_origins.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = ApiSettings {
            port: 9000,
            listener_buffer: 0,
            ..Default::default()
        };
        let config = ApiConfig::from(&settings);
        assert_eq!(config.socket_addr().port(), 9000);
        assert_eq!(config.listener_buffer, 1);
        assert_eq!(config.keep_alive, Duration::from_secs(15));
    }
}
