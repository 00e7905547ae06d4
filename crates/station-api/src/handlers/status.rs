// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Station status handlers.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;

use crate::response::{StateEvent, StatusResponse};
use crate::state::AppState;

// =============================================================================
// Status
// =============================================================================

/// GET /api/status
pub async fn station_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let session = &state.session;
    let store = state.store();

    Json(StatusResponse {
        station_id: state.station_id.to_string(),
        station_name: state.station_name.to_string(),
        version: crate::VERSION.to_string(),
        state: session.state(),
        endpoint: session.endpoint(),
        connected: store.is_connected(),
        listeners: state.channel.listener_count(),
        tag_count: store.registry().len(),
        monitored_tags: session.monitored_tags().await,
        uptime_seconds: state.uptime_seconds(),
        session: session.stats(),
        subscription: session.subscription_stats().await,
        channel: state.channel.stats(),
        writes: state.gateway.stats(),
    })
}

// =============================================================================
// State Stream
// =============================================================================

/// GET /api/status/stream
///
/// Emits the current session state, then one event per transition.
pub async fn stream_status(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.session.clone();
    let events = WatchStream::new(state.session.subscribe_state()).map(move |session_state| {
        let event = StateEvent {
            state: session_state,
            endpoint: session.endpoint(),
        };
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".into());
        Ok(Event::default().event("state").data(data))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.keep_alive))
}
