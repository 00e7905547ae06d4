// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error taxonomy for the station.
//!
//! ```text
//! StationError (root)
//! ├── Connection(ConnectionError)   - establishing the upstream session
//! ├── UnknownTag                    - name not in the registry
//! ├── Unwritable                    - tag lacks write access
//! ├── NotConnected                  - no live session
//! ├── WriteRejected(WriteFailure)   - controller refused or did not answer
//! ├── TransportClosed               - push/session transport went away
//! ├── InvalidValue                  - value cannot take the declared type
//! └── Configuration                 - invalid registry or settings
//! ```
//!
//! # Examples
//!
//! ```
//! use station_core::error::{ConnectionError, StationError};
//! use std::time::Duration;
//!
//! let error: StationError = ConnectionError::timeout(Duration::from_secs(10)).into();
//! assert!(error.is_retryable());
//! assert_eq!(error.error_code(), "CONNECTION_TIMEOUT");
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::ValueType;

/// Convenience alias used across the station crates.
pub type StationResult<T> = Result<T, StationError>;

// =============================================================================
// StationError
// =============================================================================

/// The root error type of the station.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StationError {
    /// The upstream session could not be established.
    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// The tag name is not registered.
    #[error("Unknown tag: {name}")]
    UnknownTag {
        /// Requested tag name.
        name: String,
    },

    /// The tag does not allow writes.
    #[error("Tag '{name}' is not writable")]
    Unwritable {
        /// Tag name.
        name: String,
    },

    /// There is no live upstream session.
    #[error("Not connected to the controller")]
    NotConnected,

    /// The controller rejected the write, or never acknowledged it.
    #[error("Write to '{tag}' rejected: {reason}")]
    WriteRejected {
        /// Tag name.
        tag: String,
        /// Why the write failed.
        reason: WriteFailure,
    },

    /// The transport was closed underneath an operation.
    #[error("Transport closed: {message}")]
    TransportClosed {
        /// Details.
        message: String,
    },

    /// The value cannot be converted to the tag's declared type.
    #[error("Invalid value for '{tag}' (expected {expected}): {reason}")]
    InvalidValue {
        /// Tag name.
        tag: String,
        /// Declared type.
        expected: ValueType,
        /// Why the value was rejected.
        reason: String,
    },

    /// Invalid registry or settings.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Details.
        message: String,
    },
}

impl StationError {
    /// Creates an unknown tag error.
    pub fn unknown_tag(name: impl Into<String>) -> Self {
        Self::UnknownTag { name: name.into() }
    }

    /// Creates an unwritable tag error.
    pub fn unwritable(name: impl Into<String>) -> Self {
        Self::Unwritable { name: name.into() }
    }

    /// Creates a write rejection.
    pub fn write_rejected(tag: impl Into<String>, reason: WriteFailure) -> Self {
        Self::WriteRejected {
            tag: tag.into(),
            reason,
        }
    }

    /// Creates a transport closed error.
    pub fn transport_closed(message: impl Into<String>) -> Self {
        Self::TransportClosed {
            message: message.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(
        tag: impl Into<String>,
        expected: ValueType,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            tag: tag.into(),
            expected,
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StationError::Connection(e) => e.is_retryable(),
            StationError::WriteRejected { reason, .. } => reason.is_retryable(),
            StationError::NotConnected | StationError::TransportClosed { .. } => true,
            _ => false,
        }
    }

    /// Returns a stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            StationError::Connection(e) => e.error_code(),
            StationError::UnknownTag { .. } => "UNKNOWN_TAG",
            StationError::Unwritable { .. } => "UNWRITABLE",
            StationError::NotConnected => "NOT_CONNECTED",
            StationError::WriteRejected { reason, .. } => match reason {
                WriteFailure::Timeout => "WRITE_TIMEOUT",
                _ => "WRITE_REJECTED",
            },
            StationError::TransportClosed { .. } => "TRANSPORT_CLOSED",
            StationError::InvalidValue { .. } => "INVALID_VALUE",
            StationError::Configuration { .. } => "CONFIGURATION_ERROR",
        }
    }

    /// Returns `true` for errors caused by the caller's request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StationError::UnknownTag { .. }
                | StationError::Unwritable { .. }
                | StationError::InvalidValue { .. }
        )
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Failures while establishing the upstream session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// Connect plus session creation exceeded the bound.
    #[error("Connection to {endpoint} timed out after {timeout:?}")]
    Timeout {
        /// Endpoint being connected.
        endpoint: String,
        /// Configured bound.
        timeout: Duration,
    },

    /// The endpoint refused the connection.
    #[error("Connection to {endpoint} refused: {message}")]
    Refused {
        /// Endpoint being connected.
        endpoint: String,
        /// Details.
        message: String,
    },

    /// Another connect to a different endpoint is in flight.
    #[error("Already connecting to {current}, cannot connect to {requested}")]
    AlreadyConnectingElsewhere {
        /// Endpoint of the in-flight connect.
        current: String,
        /// Endpoint that was requested.
        requested: String,
    },

    /// The transport connected but the session could not be created.
    #[error("Session creation on {endpoint} failed: {message}")]
    SessionFailed {
        /// Endpoint being connected.
        endpoint: String,
        /// Details.
        message: String,
    },
}

impl ConnectionError {
    /// Creates a timeout error without an endpoint.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            endpoint: String::new(),
            timeout,
        }
    }

    /// Creates a timeout error for an endpoint.
    pub fn timeout_at(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Creates a refused error.
    pub fn refused(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an "already connecting elsewhere" error.
    pub fn already_connecting(current: impl Into<String>, requested: impl Into<String>) -> Self {
        Self::AlreadyConnectingElsewhere {
            current: current.into(),
            requested: requested.into(),
        }
    }

    /// Creates a session failure.
    pub fn session_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConnectionError::AlreadyConnectingElsewhere { .. })
    }

    /// Returns a stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectionError::Timeout { .. } => "CONNECTION_TIMEOUT",
            ConnectionError::Refused { .. } => "CONNECTION_REFUSED",
            ConnectionError::AlreadyConnectingElsewhere { .. } => "ALREADY_CONNECTING",
            ConnectionError::SessionFailed { .. } => "SESSION_FAILED",
        }
    }
}

// =============================================================================
// WriteFailure
// =============================================================================

/// Why a write did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFailure {
    /// The controller answered with a non-good status code.
    BadStatus(u32),
    /// No acknowledgement within the session's request timeout.
    Timeout,
    /// The transport failed while sending.
    Transport(String),
}

impl WriteFailure {
    /// Returns `true` if retrying may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, WriteFailure::BadStatus(_))
    }
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteFailure::BadStatus(code) => write!(f, "bad status 0x{:08X}", code),
            WriteFailure::Timeout => f.write_str("timed out waiting for acknowledgement"),
            WriteFailure::Transport(message) => write!(f, "transport error: {}", message),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
