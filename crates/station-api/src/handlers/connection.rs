// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection management handlers.

use axum::{Json, extract::State};

use crate::error::ApiResult;
use crate::response::{ConnectionResponse, ConnectionTestResponse, EndpointRequest};
use crate::state::AppState;

/// POST /api/connection/test
///
/// Always 200; the outcome is in the body. The shared session is untouched.
pub async fn test_connection(
    State(state): State<AppState>,
    Json(request): Json<EndpointRequest>,
) -> Json<ConnectionTestResponse> {
    match state.session.probe(request.endpoint.trim()).await {
        Ok(()) => Json(ConnectionTestResponse::ok()),
        Err(e) => {
            tracing::debug!(endpoint = %request.endpoint, error = %e, "Connection test failed");
            Json(ConnectionTestResponse::failed(e.to_string()))
        }
    }
}

/// POST /api/connection/connect
pub async fn connect(
    State(state): State<AppState>,
    Json(request): Json<EndpointRequest>,
) -> ApiResult<Json<ConnectionResponse>> {
    let session_state = state.session.connect(request.endpoint.trim()).await?;
    Ok(Json(ConnectionResponse {
        success: true,
        state: session_state,
        endpoint: state.session.endpoint(),
    }))
}

/// POST /api/connection/disconnect
pub async fn disconnect(State(state): State<AppState>) -> Json<ConnectionResponse> {
    state.session.disconnect().await;
    Json(ConnectionResponse {
        success: true,
        state: state.session.state(),
        endpoint: None,
    })
}
