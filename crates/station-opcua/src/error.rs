// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport-level error types.
//!
//! ```text
//! TransportError
//! ├── Connect        - endpoint unreachable or refused
//! ├── Session        - session could not be created or closed
//! ├── NotConnected   - operation without a live session
//! ├── Subscription   - subscription / monitored item failures
//! ├── Operation      - read or write failed on the wire
//! ├── Timeout        - request exceeded its bound
//! ├── Closed         - connection lost
//! └── Configuration  - invalid session settings
//! ```
//!
//! These are what an [`OpcUaTransport`](crate::client::OpcUaTransport)
//! returns. The session manager and gateway translate them into the
//! station-level [`StationError`].

use std::time::Duration;
use thiserror::Error;

use station_core::error::{ConnectionError, StationError, WriteFailure};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors returned by an OPC UA transport.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// The endpoint could not be reached or refused the connection.
    #[error("Cannot connect to {endpoint}: {message}")]
    Connect {
        /// Endpoint URL.
        endpoint: String,
        /// Details.
        message: String,
    },

    /// Session lifecycle failure.
    #[error("Session error: {0}")]
    Session(String),

    /// No live connection.
    #[error("Transport is not connected")]
    NotConnected,

    /// Subscription or monitored item failure.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Read or write failure.
    #[error("Operation on '{address}' failed: {message}")]
    Operation {
        /// Node address.
        address: String,
        /// Details.
        message: String,
    },

    /// A request exceeded its bound.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Bound that was exceeded.
        duration: Duration,
    },

    /// The connection was lost.
    #[error("Connection closed: {0}")]
    Closed(String),

    /// Invalid settings.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl TransportError {
    /// Creates a connect error.
    pub fn connect(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Creates a subscription error.
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription(message.into())
    }

    /// Creates an operation error.
    pub fn operation(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: &'static str, duration: Duration) -> Self {
        Self::Timeout {
            operation,
            duration,
        }
    }

    /// Creates a closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed(reason.into())
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` if the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connect { .. }
                | TransportError::NotConnected
                | TransportError::Timeout { .. }
                | TransportError::Closed(_)
        )
    }

    /// Returns `true` if this error means the connection is gone.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, TransportError::NotConnected | TransportError::Closed(_))
    }

    /// Returns a stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::Connect { .. } => "TRANSPORT_CONNECT",
            TransportError::Session(_) => "TRANSPORT_SESSION",
            TransportError::NotConnected => "TRANSPORT_NOT_CONNECTED",
            TransportError::Subscription(_) => "TRANSPORT_SUBSCRIPTION",
            TransportError::Operation { .. } => "TRANSPORT_OPERATION",
            TransportError::Timeout { .. } => "TRANSPORT_TIMEOUT",
            TransportError::Closed(_) => "TRANSPORT_CLOSED",
            TransportError::Configuration(_) => "TRANSPORT_CONFIGURATION",
        }
    }

    /// Maps a failure while opening a session on `endpoint`.
    pub fn into_connection_error(self, endpoint: &str) -> ConnectionError {
        match self {
            TransportError::Timeout { duration, .. } => {
                ConnectionError::timeout_at(endpoint, duration)
            }
            TransportError::Session(message) => ConnectionError::session_failed(endpoint, message),
            other => ConnectionError::refused(endpoint, other.to_string()),
        }
    }

    /// Maps a failure while writing.
    pub fn into_write_failure(self) -> WriteFailure {
        match self {
            TransportError::Timeout { .. } => WriteFailure::Timeout,
            other => WriteFailure::Transport(other.to_string()),
        }
    }
}

impl From<TransportError> for StationError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::NotConnected => StationError::NotConnected,
            TransportError::Closed(reason) => StationError::transport_closed(reason),
            TransportError::Configuration(message) => StationError::configuration(message),
            TransportError::Connect { endpoint, message } => {
                StationError::Connection(ConnectionError::refused(endpoint, message))
            }
            TransportError::Timeout { duration, .. } => {
                StationError::Connection(ConnectionError::timeout(duration))
            }
            other => StationError::transport_closed(other.to_string()),
        }
    }
}
