// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription engine.
//!
//! Owns the single subscription of a connected session and one monitored
//! item per readable tag.
//!
//! ```text
//!  transport callback ──▶ NotificationSink (unbounded, ordered)
//!                                │
//!                                ▼
//!                        pump task (one per session)
//!                     decode by declared value type
//!                                │
//!                ┌───────────────┴───────────────┐
//!                ▼                               ▼
//!         TagValueStore::set          DistributionChannel::publish
//! ```
//!
//! Initial reads are pushed through the same sink, so a tag's values are
//! always applied in the order they were observed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use station_core::channel::DistributionChannel;
use station_core::registry::TagRegistry;
use station_core::store::TagValueStore;
use station_core::types::ValueType;

use crate::client::transport::{
    MonitoredItemHandle, OpcUaTransport, SubscriptionHandle, SubscriptionParams, TransportEvent,
};
use crate::error::TransportResult;
use crate::types::{MonitorParams, SubscriptionSettings};

/// Called once by the pump when the transport reports a lost connection.
pub type ConnectionLostHook = Arc<dyn Fn(String) + Send + Sync>;

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of subscription statistics.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SubscriptionStats {
    /// Notifications received.
    pub notifications: u64,
    /// Notifications applied to the store.
    pub applied: u64,
    /// Notifications that could not be decoded.
    pub decode_failures: u64,
    /// Notifications for unknown item handles.
    pub unknown_items: u64,
}

#[derive(Debug, Default)]
struct AtomicSubscriptionStats {
    notifications: AtomicU64,
    applied: AtomicU64,
    decode_failures: AtomicU64,
    unknown_items: AtomicU64,
}

impl AtomicSubscriptionStats {
    fn snapshot(&self) -> SubscriptionStats {
        SubscriptionStats {
            notifications: self.notifications.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            unknown_items: self.unknown_items.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// SubscriptionEngine
// =============================================================================

#[derive(Debug, Clone)]
struct MonitoredTag {
    name: String,
    value_type: ValueType,
}

/// Monitored items of one connected session.
pub struct SubscriptionEngine {
    subscription: SubscriptionHandle,
    items: Vec<(String, MonitoredItemHandle)>,
    pump: JoinHandle<()>,
    stats: Arc<AtomicSubscriptionStats>,
}

impl SubscriptionEngine {
    /// Creates the subscription, monitors every readable tag and starts the
    /// notification pump.
    ///
    /// Only a failure to create the subscription itself is returned. A tag
    /// that cannot be monitored or read is logged and skipped.
    pub async fn start(
        transport: &mut dyn OpcUaTransport,
        registry: &TagRegistry,
        store: Arc<TagValueStore>,
        channel: Arc<DistributionChannel>,
        settings: &SubscriptionSettings,
        on_lost: ConnectionLostHook,
    ) -> TransportResult<Self> {
        let (sink, events) = mpsc::unbounded_channel();
        let subscription = transport
            .create_subscription(&SubscriptionParams::from(settings), sink.clone())
            .await?;

        let params = MonitorParams::from(settings);
        let mut items = Vec::new();
        let mut handles = HashMap::new();

        for tag in registry.readable() {
            match transport
                .monitor_item(subscription, &tag.remote_address, &params)
                .await
            {
                Ok(handle) => {
                    tracing::debug!(tag = %tag.name, item = %handle, "Monitoring tag");
                    items.push((tag.name.clone(), handle));
                    handles.insert(
                        handle,
                        MonitoredTag {
                            name: tag.name.clone(),
                            value_type: tag.value_type,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(tag = %tag.name, address = %tag.remote_address, error = %e, "Failed to monitor tag");
                }
            }
        }

        // Prime the store; the values travel through the sink like any
        // other notification.
        for (name, handle) in &items {
            let Ok(tag) = registry.lookup(name) else {
                continue;
            };
            match transport.read(&tag.remote_address).await {
                Ok(value) => {
                    let _ = sink.send(TransportEvent::DataChange {
                        item: *handle,
                        value,
                    });
                }
                Err(e) => {
                    tracing::warn!(tag = %name, error = %e, "Initial read failed");
                }
            }
        }
        drop(sink);

        let stats = Arc::new(AtomicSubscriptionStats::default());
        let pump = tokio::spawn(pump(events, handles, store, channel, stats.clone(), on_lost));

        tracing::info!(
            subscription = subscription.0,
            monitored = items.len(),
            "Subscription started"
        );

        Ok(Self {
            subscription,
            items,
            pump,
            stats,
        })
    }

    /// Stops the pump, then deletes every monitored item and the
    /// subscription. Failures are logged.
    ///
    /// Returns once the pump has exited, so no notification reaches the
    /// store afterwards.
    pub async fn stop(self, transport: &mut dyn OpcUaTransport) {
        self.pump.abort();
        if let Err(e) = self.pump.await {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "Notification pump failed");
            }
        }

        let handles: Vec<MonitoredItemHandle> = self.items.iter().map(|(_, h)| *h).collect();

        if !handles.is_empty() {
            if let Err(e) = transport
                .delete_monitored_items(self.subscription, &handles)
                .await
            {
                tracing::warn!(error = %e, count = handles.len(), "Failed to delete monitored items");
            }
        }
        if let Err(e) = transport.delete_subscription(self.subscription).await {
            tracing::warn!(error = %e, subscription = self.subscription.0, "Failed to delete subscription");
        }

        tracing::debug!(subscription = self.subscription.0, "Subscription stopped");
    }

    /// Returns the subscription handle.
    pub fn handle(&self) -> SubscriptionHandle {
        self.subscription
    }

    /// Returns the names of monitored tags.
    pub fn monitored_tags(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the number of monitored items.
    pub fn monitored_count(&self) -> usize {
        self.items.len()
    }

    /// Returns current statistics.
    pub fn stats(&self) -> SubscriptionStats {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for SubscriptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEngine")
            .field("subscription", &self.subscription)
            .field("monitored", &self.items.len())
            .finish()
    }
}

async fn pump(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    handles: HashMap<MonitoredItemHandle, MonitoredTag>,
    store: Arc<TagValueStore>,
    channel: Arc<DistributionChannel>,
    stats: Arc<AtomicSubscriptionStats>,
    on_lost: ConnectionLostHook,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::DataChange { item, value } => {
                stats.notifications.fetch_add(1, Ordering::Relaxed);

                let Some(tag) = handles.get(&item) else {
                    stats.unknown_items.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(item = %item, "Notification for unknown item");
                    continue;
                };

                let decoded = match value.decode(tag.value_type) {
                    Ok(v) => v,
                    Err(reason) => {
                        stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(tag = %tag.name, %reason, "Dropping undecodable notification");
                        continue;
                    }
                };

                match store.set(&tag.name, decoded.clone()) {
                    Ok(true) => {
                        stats.applied.fetch_add(1, Ordering::Relaxed);
                        channel.publish(&tag.name, &decoded);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(tag = %tag.name, error = %e, "Store rejected notification");
                    }
                }
            }
            TransportEvent::ConnectionLost { reason } => {
                tracing::warn!(%reason, "Transport reported connection lost");
                on_lost(reason);
                break;
            }
        }
    }
}
