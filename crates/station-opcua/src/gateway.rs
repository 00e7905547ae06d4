// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Write gateway.
//!
//! Validates a control write and forwards it to the session. Checks run in
//! this order:
//!
//! 1. the tag exists (`UnknownTag`)
//! 2. the session is `Connected` (`NotConnected`)
//! 3. the tag grants write access (`Unwritable`)
//! 4. the value coerces to the declared type (`InvalidValue`)
//!
//! On a Good status the store is updated with the written value. Listeners
//! are not notified here; the subscription reports the change.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use station_core::error::{StationError, StationResult, WriteFailure};
use station_core::registry::TagDefinition;
use station_core::store::TagValueStore;
use station_core::types::TagValue;

use crate::client::{OpcUaValue, SessionManager};
use crate::error::TransportError;

/// Snapshot of gateway counters.
#[derive(Debug, Default, Clone, Serialize)]
pub struct GatewayStats {
    /// Accepted writes.
    pub accepted: u64,
    /// Writes refused before reaching the controller.
    pub refused: u64,
    /// Writes the controller rejected or that failed in transport.
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct AtomicGatewayStats {
    accepted: AtomicU64,
    refused: AtomicU64,
    rejected: AtomicU64,
}

/// Serializes control writes onto the session.
#[derive(Debug)]
pub struct WriteGateway {
    session: Arc<SessionManager>,
    store: Arc<TagValueStore>,
    stats: AtomicGatewayStats,
}

impl WriteGateway {
    /// Creates a gateway over the session and store.
    pub fn new(session: Arc<SessionManager>, store: Arc<TagValueStore>) -> Self {
        Self {
            session,
            store,
            stats: AtomicGatewayStats::default(),
        }
    }

    /// Writes a JSON value, coercing it to the tag's declared type.
    ///
    /// Returns the typed value that was written.
    pub async fn write(&self, tag: &str, value: &serde_json::Value) -> StationResult<TagValue> {
        let definition = self.precheck(tag)?;
        let typed = TagValue::coerce(definition.value_type, value).map_err(|reason| {
            self.stats.refused.fetch_add(1, Ordering::Relaxed);
            StationError::invalid_value(tag, definition.value_type, reason)
        })?;
        self.forward(&definition, typed).await
    }

    /// Writes an already typed value.
    pub async fn write_typed(&self, tag: &str, value: TagValue) -> StationResult<TagValue> {
        let definition = self.precheck(tag)?;
        if value.value_type() != definition.value_type {
            self.stats.refused.fetch_add(1, Ordering::Relaxed);
            return Err(StationError::invalid_value(
                tag,
                definition.value_type,
                format!("got a {} value", value.value_type()),
            ));
        }
        self.forward(&definition, value).await
    }

    /// Returns gateway counters.
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            refused: self.stats.refused.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
        }
    }

    fn precheck(&self, tag: &str) -> StationResult<TagDefinition> {
        let result = self
            .store
            .registry()
            .lookup(tag)
            .cloned()
            .and_then(|definition| {
                if !self.session.state().is_connected() {
                    Err(StationError::NotConnected)
                } else if !definition.is_writable() {
                    Err(StationError::unwritable(tag))
                } else {
                    Ok(definition)
                }
            });
        if result.is_err() {
            self.stats.refused.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn forward(&self, tag: &TagDefinition, value: TagValue) -> StationResult<TagValue> {
        let result = self
            .session
            .write(&tag.remote_address, OpcUaValue::from(&value))
            .await;

        let failure = match result {
            Ok(status) if status.is_good() => {
                if let Err(e) = self.store.set(&tag.name, value.clone()) {
                    tracing::warn!(tag = %tag.name, error = %e, "Written value not stored");
                }
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                tracing::info!(tag = %tag.name, %value, "Write accepted");
                return Ok(value);
            }
            Ok(status) => WriteFailure::BadStatus(status.0),
            Err(TransportError::NotConnected) => {
                self.stats.refused.fetch_add(1, Ordering::Relaxed);
                return Err(StationError::NotConnected);
            }
            Err(e) => e.into_write_failure(),
        };

        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(tag = %tag.name, %value, reason = %failure, "Write rejected");
        Err(StationError::write_rejected(&tag.name, failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::UnavailableTransportFactory;
    use crate::types::{FallbackPolicy, SessionConfig};
    use station_core::channel::DistributionChannel;
    use station_core::registry::TagRegistry;
    use station_core::types::{AccessRights, ValueType};

    fn gateway(fallback: FallbackPolicy) -> (WriteGateway, Arc<SessionManager>) {
        let registry = Arc::new(
            TagRegistry::new([
                TagDefinition::new("ARU", "ns=1;s=ARU", ValueType::Boolean, AccessRights::READ_WRITE),
                TagDefinition::new("niveau", "ns=1;s=niveau", ValueType::Int16, AccessRights::READ),
            ])
            .unwrap(),
        );
        let store = Arc::new(TagValueStore::new(registry));
        let channel = Arc::new(DistributionChannel::new(store.clone()));
        let session = SessionManager::builder(store.clone(), channel)
            .config(SessionConfig {
                fallback,
                ..Default::default()
            })
            .factory(Arc::new(UnavailableTransportFactory))
            .build();
        (WriteGateway::new(session.clone(), store), session)
    }

    #[tokio::test]
    async fn test_unknown_tag_checked_first() {
        let (gateway, _) = gateway(FallbackPolicy::Surface);
        let err = gateway.write("pompe", &serde_json::json!(true)).await.unwrap_err();
        assert_eq!(err, StationError::unknown_tag("pompe"));
    }

    #[tokio::test]
    async fn test_not_connected_before_unwritable() {
        let (gateway, _) = gateway(FallbackPolicy::Surface);
        let err = gateway.write("niveau", &serde_json::json!(10)).await.unwrap_err();
        assert_eq!(err, StationError::NotConnected);
        assert_eq!(gateway.stats().refused, 1);
    }

    #[tokio::test]
    async fn test_degraded_refuses_writes() {
        let (gateway, session) = gateway(FallbackPolicy::Simulate);
        session.connect("opc.tcp://plc:4840").await.unwrap();

        let err = gateway.write("ARU", &serde_json::json!(true)).await.unwrap_err();
        assert_eq!(err, StationError::NotConnected);
        session.disconnect().await;
    }
}
