// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client-side reconnection controller.
//!
//! Follows a push stream and re-opens it after a fixed delay when it fails or
//! ends. After `max_attempts` consecutive failed retries the controller stops
//! in the terminal [`ReconnectState::GaveUp`] state. A successful open resets
//! the counter.
//!
//! ```text
//!   Connecting ──ok──▶ Connected ──error / end──┐
//!       ▲  │                                    │
//!       │  └─error──┐                           │
//!       │           ▼                           ▼
//!       └──delay── Retrying{n} ◀────────────────┘
//!                   │ n == max_attempts
//!                   ▼
//!                 GaveUp
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::channel::TagEvent;

// =============================================================================
// Connector
// =============================================================================

/// Errors raised by a push connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    /// The stream could not be opened.
    #[error("Failed to open push stream: {0}")]
    Open(String),

    /// The open stream failed.
    #[error("Push stream failed: {0}")]
    Transport(String),

    /// An event could not be decoded.
    #[error("Invalid push event: {0}")]
    Decode(String),
}

/// A stream of decoded push events.
pub type PushStream = BoxStream<'static, Result<TagEvent, PushError>>;

/// Opens push streams.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Opens a new stream.
    async fn open(&self) -> Result<PushStream, PushError>;
}

// =============================================================================
// Policy and State
// =============================================================================

/// Retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Fixed delay before each retry.
    #[serde(with = "humantime_serde", default = "default_delay")]
    pub delay: Duration,
    /// Consecutive failed retries before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: default_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReconnectState {
    /// Opening the stream.
    Connecting,
    /// Stream is open.
    Connected,
    /// Waiting before retry number `attempt`.
    Retrying {
        /// Retry number, starting at 1.
        attempt: u32,
        /// Retries allowed.
        max_attempts: u32,
        /// Delay before the retry.
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
    /// Terminal: no further retry will fire.
    GaveUp,
}

impl ReconnectState {
    /// Returns `true` for the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconnectState::GaveUp)
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Drives a [`PushConnector`] under a [`ReconnectPolicy`].
pub struct ReconnectController<C> {
    connector: C,
    policy: ReconnectPolicy,
    state: watch::Sender<ReconnectState>,
    opens: AtomicU32,
}

impl<C: PushConnector> ReconnectController<C> {
    /// Creates a controller.
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ReconnectState::Connecting);
        Self {
            connector,
            policy,
            state,
            opens: AtomicU32::new(0),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ReconnectState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ReconnectState> {
        self.state.subscribe()
    }

    /// Returns how many times `open` has been called.
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Returns the policy.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Follows the stream until the controller gives up.
    ///
    /// Every decoded event is handed to `on_event`. Dropping the returned
    /// future stops the controller.
    pub async fn run<F>(&self, mut on_event: F) -> ReconnectState
    where
        F: FnMut(TagEvent) + Send,
    {
        let mut attempts = 0u32;

        loop {
            self.state.send_replace(ReconnectState::Connecting);
            self.opens.fetch_add(1, Ordering::SeqCst);

            match self.connector.open().await {
                Ok(mut stream) => {
                    attempts = 0;
                    self.state.send_replace(ReconnectState::Connected);
                    tracing::info!("Push stream connected");

                    loop {
                        match stream.next().await {
                            Some(Ok(event)) => on_event(event),
                            Some(Err(PushError::Decode(message))) => {
                                tracing::warn!(error = %message, "Skipping undecodable event");
                            }
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "Push stream failed");
                                break;
                            }
                            None => {
                                tracing::warn!("Push stream ended");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt = attempts, "Push stream open failed");
                }
            }

            if attempts >= self.policy.max_attempts {
                tracing::error!(
                    max_attempts = self.policy.max_attempts,
                    "Giving up on push stream"
                );
                self.state.send_replace(ReconnectState::GaveUp);
                return ReconnectState::GaveUp;
            }

            attempts += 1;
            self.state.send_replace(ReconnectState::Retrying {
                attempt: attempts,
                max_attempts: self.policy.max_attempts,
                delay: self.policy.delay,
            });
            tracing::info!(
                attempt = attempts,
                max_attempts = self.policy.max_attempts,
                delay = ?self.policy.delay,
                "Reconnecting push stream"
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}

impl<C> std::fmt::Debug for ReconnectController<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectController")
            .field("policy", &self.policy)
            .field("state", &*self.state.borrow())
            .field("opens", &self.opens.load(Ordering::SeqCst))
            .finish()
    }
}
