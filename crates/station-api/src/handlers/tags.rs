// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tag registry handlers.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::error::ApiResult;
use crate::response::{TagResponse, TagsResponse};
use crate::state::AppState;

/// GET /api/tags
pub async fn list_tags(State(state): State<AppState>) -> Json<TagsResponse> {
    let store = state.store();
    let tags = store
        .registry()
        .iter()
        .map(|definition| {
            let value = store.get(&definition.name).ok().flatten();
            TagResponse::new(definition, value)
        })
        .collect();

    Json(TagsResponse {
        connected: store.is_connected(),
        tags,
    })
}

/// GET /api/tags/{name}
pub async fn get_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<TagResponse>> {
    let store = state.store();
    let definition = store.registry().lookup(&name)?;
    let value = store.get(&name)?;
    Ok(Json(TagResponse::new(definition, value)))
}
