// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Distribution channel for tag changes.
//!
//! An explicit listener registry. Each listener gets exactly one `initial`
//! snapshot on attach, then every change in publish order.
//!
//! ```text
//!  Subscription engine / simulator
//!              │ publish(tag, value)
//!              ▼
//!   ┌──────────────────────────┐
//!   │   DistributionChannel    │  one lock for attach + publish
//!   └──────────────────────────┘
//!        │         │         │     deliver (non-blocking, isolated)
//!        ▼         ▼         ▼
//!    listener   listener   listener
//!    (SSE)      (SSE)      (closed → removed)
//! ```
//!
//! Delivery never blocks: a full listener queue drops the event for that
//! listener only, and a closed listener is removed from the registry.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use crate::store::{Snapshot, TagValueStore};
use crate::types::TagValue;

// =============================================================================
// Events
// =============================================================================

/// An event pushed to listeners.
///
/// Serializes to `{"initial": {...}}` or `{"tag": "...", "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagEvent {
    /// Full snapshot, sent once on attach.
    Initial {
        /// Every tag's current value.
        initial: Snapshot,
    },
    /// A single tag changed.
    Change {
        /// Tag name.
        tag: String,
        /// New value.
        value: TagValue,
    },
}

impl TagEvent {
    /// Creates a change event.
    pub fn change(tag: impl Into<String>, value: TagValue) -> Self {
        Self::Change {
            tag: tag.into(),
            value,
        }
    }

    /// Returns `true` for the initial snapshot.
    pub fn is_initial(&self) -> bool {
        matches!(self, TagEvent::Initial { .. })
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Opaque listener handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Outcome of a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event was queued.
    Delivered,
    /// The listener's queue is full; this event is lost for it.
    Lagged,
    /// The listener is gone and should be removed.
    Closed,
}

/// A sink for tag events.
///
/// `deliver` is called with the channel lock held and must not block.
pub trait TagListener: Send + Sync {
    /// Offers one event to the listener.
    fn deliver(&self, event: &TagEvent) -> Delivery;
}

/// A listener backed by a bounded tokio queue.
#[derive(Debug)]
pub struct ChannelListener {
    sender: mpsc::Sender<TagEvent>,
}

impl ChannelListener {
    /// Creates a listener and the receiving half of its queue.
    pub fn bounded(capacity: usize) -> (Arc<Self>, mpsc::Receiver<TagEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Arc::new(Self { sender }), receiver)
    }
}

impl TagListener for ChannelListener {
    fn deliver(&self, event: &TagEvent) -> Delivery {
        match self.sender.try_send(event.clone()) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Lagged,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Delivery statistics.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Change events published.
    pub events_published: u64,
    /// Successful deliveries, including initial snapshots.
    pub deliveries: u64,
    /// Deliveries dropped because a listener lagged.
    pub dropped_lagged: u64,
    /// Listeners removed because they closed.
    pub listeners_closed: u64,
    /// Current listener count.
    pub listener_count: u64,
}

#[derive(Debug, Default)]
struct AtomicChannelStats {
    events_published: AtomicU64,
    deliveries: AtomicU64,
    dropped_lagged: AtomicU64,
    listeners_closed: AtomicU64,
}

// =============================================================================
// DistributionChannel
// =============================================================================

type Registration = (ListenerId, Arc<dyn TagListener>);

/// Fan-out of tag changes to attached listeners.
pub struct DistributionChannel {
    store: Arc<TagValueStore>,
    listeners: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
    stats: AtomicChannelStats,
}

impl DistributionChannel {
    /// Creates a channel whose initial snapshots come from `store`.
    pub fn new(store: Arc<TagValueStore>) -> Self {
        Self {
            store,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            stats: AtomicChannelStats::default(),
        }
    }

    /// Attaches a listener and delivers its initial snapshot.
    ///
    /// The snapshot is taken and delivered under the same lock that
    /// `publish` holds, so no change can reach the listener before it.
    pub fn attach(&self, listener: Arc<dyn TagListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock();

        let initial = TagEvent::Initial {
            initial: self.store.get_all(),
        };
        match listener.deliver(&initial) {
            Delivery::Delivered => {
                self.stats.deliveries.fetch_add(1, Ordering::Relaxed);
                listeners.push((id, listener));
                tracing::debug!(listener = %id, count = listeners.len(), "Listener attached");
            }
            Delivery::Lagged => {
                // The snapshot must precede every change; a listener that
                // cannot take it would see changes without a baseline.
                self.stats.dropped_lagged.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(listener = %id, "Listener could not accept initial snapshot");
            }
            Delivery::Closed => {
                self.stats.listeners_closed.fetch_add(1, Ordering::Relaxed);
            }
        }

        id
    }

    /// Attaches a [`ChannelListener`] and returns a guard that detaches on drop.
    pub fn attach_channel(
        self: &Arc<Self>,
        capacity: usize,
    ) -> (ListenerGuard, mpsc::Receiver<TagEvent>) {
        let (listener, receiver) = ChannelListener::bounded(capacity);
        let id = self.attach(listener);
        let guard = ListenerGuard {
            channel: Arc::downgrade(self),
            id,
        };
        (guard, receiver)
    }

    /// Detaches a listener. Unknown ids are ignored.
    pub fn detach(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!(listener = %id, count = listeners.len(), "Listener detached");
        }
        removed
    }

    /// Publishes a change to every listener, in attach order.
    ///
    /// Returns the number of listeners that accepted the event.
    pub fn publish(&self, tag: &str, value: &TagValue) -> usize {
        let event = TagEvent::change(tag, value.clone());
        self.stats.events_published.fetch_add(1, Ordering::Relaxed);

        let mut listeners = self.listeners.lock();
        let mut delivered = 0;
        listeners.retain(|(id, listener)| match listener.deliver(&event) {
            Delivery::Delivered => {
                delivered += 1;
                true
            }
            Delivery::Lagged => {
                self.stats.dropped_lagged.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(listener = %id, tag = %tag, "Listener lagging, event dropped");
                true
            }
            Delivery::Closed => {
                self.stats.listeners_closed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(listener = %id, "Listener closed, removing");
                false
            }
        });
        self.stats
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);

        delivered
    }

    /// Returns the number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns the store backing initial snapshots.
    pub fn store(&self) -> &Arc<TagValueStore> {
        &self.store
    }

    /// Returns current statistics.
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            events_published: self.stats.events_published.load(Ordering::Relaxed),
            deliveries: self.stats.deliveries.load(Ordering::Relaxed),
            dropped_lagged: self.stats.dropped_lagged.load(Ordering::Relaxed),
            listeners_closed: self.stats.listeners_closed.load(Ordering::Relaxed),
            listener_count: self.listener_count() as u64,
        }
    }
}

impl fmt::Debug for DistributionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionChannel")
            .field("listener_count", &self.listener_count())
            .field(
                "events_published",
                &self.stats.events_published.load(Ordering::Relaxed),
            )
            .finish()
    }
}

/// Detaches its listener when dropped.
#[derive(Debug)]
pub struct ListenerGuard {
    channel: Weak<DistributionChannel>,
    id: ListenerId,
}

impl ListenerGuard {
    /// Returns the guarded listener id.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.detach(self.id);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{TagDefinition, TagRegistry};
    use crate::types::{AccessRights, ValueType};

    fn channel() -> Arc<DistributionChannel> {
        let registry = TagRegistry::new([
            TagDefinition::new("ARU", "ns=1;s=ARU", ValueType::Boolean, AccessRights::READ_WRITE),
            TagDefinition::new("niveau", "ns=1;s=niveau", ValueType::Int16, AccessRights::READ),
        ])
        .unwrap();
        let store = Arc::new(TagValueStore::new(Arc::new(registry)));
        Arc::new(DistributionChannel::new(store))
    }

    #[test]
    fn test_initial_before_changes() {
        let channel = channel();
        channel.store().set("niveau", TagValue::Int16(7)).unwrap();

        let (_guard, mut rx) = channel.attach_channel(8);
        channel.publish("niveau", &TagValue::Int16(8));

        match rx.try_recv().unwrap() {
            TagEvent::Initial { initial } => {
                assert_eq!(initial.get("niveau"), Some(&Some(TagValue::Int16(7))));
                assert_eq!(initial.get("ARU"), Some(&None));
            }
            other => panic!("expected initial, got {:?}", other),
        }
        assert_eq!(rx.try_recv().unwrap(), TagEvent::change("niveau", TagValue::Int16(8)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_detach_does_not_affect_others() {
        let channel = channel();
        let (l, _rx_l) = ChannelListener::bounded(8);
        let (m, mut rx_m) = ChannelListener::bounded(8);
        let id_l = channel.attach(l);
        channel.attach(m);

        assert!(channel.detach(id_l));
        assert!(!channel.detach(id_l));
        channel.publish("ARU", &TagValue::Boolean(true));

        assert!(rx_m.try_recv().unwrap().is_initial());
        assert_eq!(rx_m.try_recv().unwrap(), TagEvent::change("ARU", TagValue::Boolean(true)));
        assert_eq!(channel.listener_count(), 1);
    }

    #[test]
    fn test_closed_listener_removed() {
        let channel = channel();
        let (l, rx_l) = ChannelListener::bounded(8);
        let (m, mut rx_m) = ChannelListener::bounded(8);
        channel.attach(l);
        channel.attach(m);
        drop(rx_l);

        assert_eq!(channel.publish("ARU", &TagValue::Boolean(false)), 1);
        assert_eq!(channel.listener_count(), 1);
        assert_eq!(channel.stats().listeners_closed, 1);

        rx_m.try_recv().unwrap();
        assert!(!rx_m.try_recv().unwrap().is_initial());
    }

    #[test]
    fn test_lagging_listener_drops_events() {
        let channel = channel();
        let (slow, mut rx_slow) = ChannelListener::bounded(1);
        let (fast, mut rx_fast) = ChannelListener::bounded(8);
        channel.attach(slow);
        channel.attach(fast);

        channel.publish("niveau", &TagValue::Int16(1));
        channel.publish("niveau", &TagValue::Int16(2));

        assert!(rx_slow.try_recv().unwrap().is_initial());
        assert!(rx_slow.try_recv().is_err());

        rx_fast.try_recv().unwrap();
        assert_eq!(rx_fast.try_recv().unwrap(), TagEvent::change("niveau", TagValue::Int16(1)));
        assert_eq!(rx_fast.try_recv().unwrap(), TagEvent::change("niveau", TagValue::Int16(2)));
        assert_eq!(channel.listener_count(), 2);
        assert_eq!(channel.stats().dropped_lagged, 2);
    }

    #[test]
    fn test_guard_detaches_on_drop() {
        let channel = channel();
        let (guard, _rx) = channel.attach_channel(4);
        assert_eq!(channel.listener_count(), 1);
        drop(guard);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn test_event_json_shape() {
        let event = TagEvent::change("ARU", TagValue::Boolean(true));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"tag": "ARU", "value": true})
        );

        let mut initial = Snapshot::new();
        initial.insert("niveau".to_string(), None);
        let event = TagEvent::Initial { initial };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"initial": {"niveau": null}})
        );
    }
}
