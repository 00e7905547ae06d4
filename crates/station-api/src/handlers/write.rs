// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Control write handler.

use axum::{Json, extract::State};

use crate::error::ApiResult;
use crate::response::{WriteRequest, WriteResponse};
use crate::state::AppState;

/// POST /api/write
///
/// Forwards one write to the controller. The store is only updated when the
/// controller answers Good.
pub async fn write_tag(
    State(state): State<AppState>,
    Json(request): Json<WriteRequest>,
) -> ApiResult<Json<WriteResponse>> {
    state.ensure_connected(request.endpoint.as_deref()).await?;

    let value = state.gateway.write(&request.tag, &request.value).await?;
    tracing::info!(tag = %request.tag, %value, "Tag written");

    Ok(Json(WriteResponse {
        success: true,
        tag: request.tag,
        value,
    }))
}
