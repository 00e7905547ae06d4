// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tag value store.
//!
//! The authoritative in-memory snapshot of every registered tag. Every tag
//! starts at `None` (serialized as `null`) and only readable tags ever hold a
//! value. Writes replace a value as a unit under the lock so readers never see
//! a torn value.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{StationError, StationResult};
use crate::registry::TagRegistry;
use crate::types::TagValue;

/// An owned copy of every tag's value, ordered by name.
pub type Snapshot = BTreeMap<String, Option<TagValue>>;

/// Authoritative tag snapshot plus the connected flag.
#[derive(Debug)]
pub struct TagValueStore {
    registry: Arc<TagRegistry>,
    values: RwLock<HashMap<String, Option<TagValue>>>,
    connected: AtomicBool,
    updates: AtomicU64,
}

impl TagValueStore {
    /// Creates a store with every registered tag set to `None`.
    pub fn new(registry: Arc<TagRegistry>) -> Self {
        let values = registry.iter().map(|t| (t.name.clone(), None)).collect();
        Self {
            registry,
            values: RwLock::new(values),
            connected: AtomicBool::new(false),
            updates: AtomicU64::new(0),
        }
    }

    /// Returns the registry backing this store.
    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    /// Returns the current value of a tag.
    pub fn get(&self, name: &str) -> StationResult<Option<TagValue>> {
        self.values
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StationError::unknown_tag(name))
    }

    /// Returns an owned copy of every value.
    pub fn get_all(&self) -> Snapshot {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replaces a tag's value.
    ///
    /// Returns `Ok(false)` when the tag is not readable and the value was
    /// ignored.
    pub fn set(&self, name: &str, value: TagValue) -> StationResult<bool> {
        let tag = self.registry.lookup(name)?;

        if value.value_type() != tag.value_type {
            return Err(StationError::invalid_value(
                name,
                tag.value_type,
                format!("got a {} value", value.value_type()),
            ));
        }

        if !tag.is_readable() {
            tracing::debug!(tag = %name, "Ignoring value for non-readable tag");
            return Ok(false);
        }

        self.values.write().insert(name.to_string(), Some(value));
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Sets the connected flag.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns the connected flag.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Clears every value and the connected flag.
    pub fn reset_to_initial(&self) {
        {
            let mut values = self.values.write();
            for value in values.values_mut() {
                *value = None;
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Returns how many values were stored since creation.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TagDefinition;
    use crate::types::{AccessRights, ValueType};

    fn store() -> TagValueStore {
        let registry = TagRegistry::new([
            TagDefinition::new("ARU", "ns=1;s=ARU", ValueType::Boolean, AccessRights::READ_WRITE),
            TagDefinition::new("niveau", "ns=1;s=niveau", ValueType::Int16, AccessRights::READ),
            TagDefinition::new("consigne", "ns=1;s=consigne", ValueType::Float, AccessRights::WRITE),
        ])
        .unwrap();
        TagValueStore::new(Arc::new(registry))
    }

    #[test]
    fn test_initial_values_are_null() {
        let store = store();
        let snapshot = store.get_all();
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.values().all(Option::is_none));
        assert!(!store.is_connected());
    }

    #[test]
    fn test_set_and_get() {
        let store = store();
        assert!(store.set("niveau", TagValue::Int16(42)).unwrap());
        assert_eq!(store.get("niveau").unwrap(), Some(TagValue::Int16(42)));
        assert_eq!(store.update_count(), 1);
    }

    #[test]
    fn test_unknown_tag() {
        let store = store();
        assert!(matches!(store.get("nope"), Err(StationError::UnknownTag { .. })));
        assert!(matches!(
            store.set("nope", TagValue::Boolean(true)),
            Err(StationError::UnknownTag { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let store = store();
        let err = store.set("niveau", TagValue::Boolean(true)).unwrap_err();
        assert!(matches!(err, StationError::InvalidValue { .. }));
        assert_eq!(store.get("niveau").unwrap(), None);
    }

    #[test]
    fn test_write_only_tag_stays_null() {
        let store = store();
        assert!(!store.set("consigne", TagValue::Float(1.5)).unwrap());
        assert_eq!(store.get("consigne").unwrap(), None);
    }

    #[test]
    fn test_reset_to_initial() {
        let store = store();
        store.set("ARU", TagValue::Boolean(true)).unwrap();
        store.set_connected(true);

        store.reset_to_initial();

        assert_eq!(store.get("ARU").unwrap(), None);
        assert!(!store.is_connected());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = store();
        let snapshot = store.get_all();
        store.set("ARU", TagValue::Boolean(true)).unwrap();
        assert_eq!(snapshot.get("ARU"), Some(&None));
    }
}
