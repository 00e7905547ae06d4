// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `watch` command.
//!
//! Follows `GET /api/stream` of a running station and prints one JSON line
//! per event. Reconnection is left entirely to [`ReconnectController`]; the
//! event source's own retry is disabled.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource, retry::Never};
use tracing::info;

use station_core::channel::TagEvent;
use station_core::reconnect::{
    PushConnector, PushError, PushStream, ReconnectController, ReconnectPolicy, ReconnectState,
};

use crate::cli::{Cli, WatchArgs};
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// SseConnector
// =============================================================================

/// Opens the station's event stream over HTTP.
pub struct SseConnector {
    client: reqwest::Client,
    url: String,
    endpoint: Option<String>,
}

impl SseConnector {
    /// Creates a connector for the station at `base_url`.
    pub fn new(base_url: &str, endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: stream_url(base_url),
            endpoint,
        }
    }
}

fn stream_url(base_url: &str) -> String {
    format!("{}/api/stream", base_url.trim_end_matches('/'))
}

#[async_trait]
impl PushConnector for SseConnector {
    async fn open(&self) -> Result<PushStream, PushError> {
        let mut request = self.client.get(&self.url);
        if let Some(endpoint) = &self.endpoint {
            request = request.query(&[("endpoint", endpoint)]);
        }

        let mut source = EventSource::new(request).map_err(|e| PushError::Open(e.to_string()))?;
        source.set_retry_policy(Box::new(Never));

        // The request is only sent when the source is first polled.
        match source.next().await {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                source.close();
                return Err(PushError::Open(e.to_string()));
            }
            None => return Err(PushError::Open("stream closed before opening".into())),
        }

        let events = source.filter_map(|item| async move {
            match item {
                Ok(Event::Open) => None,
                Ok(Event::Message(message)) => Some(
                    serde_json::from_str::<TagEvent>(&message.data)
                        .map_err(|e| PushError::Decode(e.to_string())),
                ),
                Err(e) => Some(Err(PushError::Transport(e.to_string()))),
            }
        });
        Ok(events.boxed())
    }
}

// =============================================================================
// Command
// =============================================================================

/// Executes the `watch` command.
pub async fn watch(_cli: &Cli, args: WatchArgs) -> BinResult<()> {
    let policy = ReconnectPolicy {
        delay: args.delay,
        max_attempts: args.max_attempts,
    };
    let controller = ReconnectController::new(SseConnector::new(&args.url, args.endpoint), policy);
    info!(url = %args.url, delay = ?policy.delay, max_attempts = policy.max_attempts, "Watching station");

    let shutdown = ShutdownCoordinator::new();
    let outcome = tokio::select! {
        state = controller.run(print_event) => Some(state),
        _ = shutdown.listen_for_signals() => None,
    };

    match outcome {
        Some(ReconnectState::GaveUp) => Err(BinError::connection(format!(
            "gave up on {} after {} reconnect attempts",
            args.url, policy.max_attempts
        ))),
        _ => Ok(()),
    }
}

fn print_event(event: TagEvent) {
    match serde_json::to_string(&event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "Failed to render event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url() {
        assert_eq!(stream_url("http://localhost:8080/"), "http://localhost:8080/api/stream");
        assert_eq!(stream_url("http://plc-gw"), "http://plc-gw/api/stream");
    }

    #[tokio::test]
    async fn test_unreachable_station_fails_to_open() {
        let connector = SseConnector::new("http://127.0.0.1:1", None);
        assert!(matches!(connector.open().await, Err(PushError::Open(_))));
    }
}
