// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Health check handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::response::{ComponentStatus, HealthResponse, ReadinessResponse};
use crate::state::AppState;

/// GET /health
///
/// Liveness check. Returns 200 OK while the process serves requests.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::healthy())
}

/// GET /ready
///
/// Ready once the session is Connected or Degraded.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let session_state = state.session.state();
    let session_ready = session_state.is_live();

    let components = vec![
        ComponentStatus {
            name: "session".to_string(),
            healthy: session_ready,
            message: Some(match state.session.endpoint() {
                Some(endpoint) => format!("{session_state} ({endpoint})"),
                None => session_state.to_string(),
            }),
        },
        ComponentStatus {
            name: "channel".to_string(),
            healthy: true,
            message: Some(format!("{} listeners", state.channel.listener_count())),
        },
    ];

    let response = ReadinessResponse {
        ready: session_ready,
        components,
    };

    if session_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
