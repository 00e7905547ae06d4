// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API error types and handling.
//!
//! Every failure leaves a handler as an [`ApiError`] and is rendered as
//!
//! ```json
//! { "success": false, "error": { "code": "UNWRITABLE", "message": "..." } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use station_core::error::{ConnectionError, StationError, WriteFailure};

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// ApiError
// =============================================================================

/// API error with HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404).
    #[error("Resource not found: {resource}")]
    NotFound {
        /// The missing resource.
        resource: String,
    },

    /// Bad request (400).
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Service unavailable (503).
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Error message.
        message: String,
    },

    /// Internal server error (500).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message, logged only.
        message: String,
    },

    /// Failure reported by the station core.
    #[error(transparent)]
    Station(#[from] StationError),
}

impl ApiError {
    /// Creates a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a service unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Station(e) => station_status(e),
        }
    }

    /// Returns the error code for categorization.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
            ApiError::Station(e) => e.error_code(),
        }
    }

    /// Returns a message safe to show to clients.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Returns `true` if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

fn station_status(error: &StationError) -> StatusCode {
    match error {
        StationError::UnknownTag { .. } => StatusCode::NOT_FOUND,
        StationError::Unwritable { .. } => StatusCode::FORBIDDEN,
        StationError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        StationError::InvalidValue { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StationError::WriteRejected {
            reason: WriteFailure::Timeout,
            ..
        } => StatusCode::GATEWAY_TIMEOUT,
        StationError::WriteRejected { .. } => StatusCode::BAD_GATEWAY,
        StationError::Connection(ConnectionError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        StationError::Connection(ConnectionError::AlreadyConnectingElsewhere { .. }) => {
            StatusCode::CONFLICT
        }
        StationError::Connection(_) => StatusCode::BAD_GATEWAY,
        StationError::TransportClosed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StationError::Configuration { .. } => StatusCode::BAD_REQUEST,
    }
}

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, error_code, status = %status, "Server error occurred");
        } else {
            tracing::debug!(error = %self, error_code, status = %status, "Client error occurred");
        }

        let body = ErrorResponseBody {
            success: false,
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.user_message(),
            },
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Error Response Body
// =============================================================================

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseBody {
    /// Always `false`.
    pub success: bool,
    /// Error details.
    pub error: ErrorDetails,
}

/// Error details within the response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::bad_request(format!("Invalid JSON: {err}"))
    }
}

// =============================================================================
// Tests
// =============================================================================
