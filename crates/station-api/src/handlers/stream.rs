// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Downstream push of tag changes.
//!
//! Each request attaches one listener to the distribution channel. The
//! listener guard lives inside the response stream, so the listener is
//! detached as soon as the client goes away and axum drops the body.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};

use station_core::channel::TagEvent;

use crate::error::ApiResult;
use crate::response::StreamQuery;
use crate::state::AppState;

/// GET /api/stream
///
/// Emits `{"initial": {...}}` once, then `{"tag": ..., "value": ...}` per change.
pub async fn stream_tags(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.ensure_connected(query.endpoint.as_deref()).await?;

    let (guard, receiver) = state.channel.attach_channel(state.config.listener_buffer);
    tracing::debug!(listener = %guard.id(), "Stream listener attached");

    let events = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        let event = receiver.recv().await?;
        Some((Ok(to_sse(&event)), (receiver, guard)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.keep_alive)))
}

fn to_sse(event: &TagEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".into());
    Event::default().data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_core::types::TagValue;

    #[test]
    fn test_change_event_payload() {
        let event = TagEvent::change("ARU", TagValue::Boolean(true));
        let data = serde_json::to_string(&event).unwrap();
        assert_eq!(data, r#"{"tag":"ARU","value":true}"#);
        let _ = to_sse(&event);
    }
}
