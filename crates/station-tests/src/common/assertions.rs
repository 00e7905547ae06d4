// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Assertion helpers with informative failure messages for events, errors
//! and the store.

use station_core::channel::TagEvent;
use station_core::error::{StationError, WriteFailure};
use station_core::store::TagValueStore;
use station_core::types::TagValue;

// =============================================================================
// Event Assertions
// =============================================================================

/// Assertion extensions for [`TagEvent`].
pub trait TagEventAssertions {
    /// Asserts an initial snapshot and returns it.
    fn assert_initial(&self) -> &station_core::store::Snapshot;

    /// Asserts a change of `tag` to `value`.
    fn assert_change(&self, tag: &str, value: &TagValue);
}

impl TagEventAssertions for TagEvent {
    fn assert_initial(&self) -> &station_core::store::Snapshot {
        match self {
            TagEvent::Initial { initial } => initial,
            other => panic!("Expected an initial snapshot, got {other:?}"),
        }
    }

    fn assert_change(&self, tag: &str, value: &TagValue) {
        match self {
            TagEvent::Change { tag: t, value: v } => {
                assert_eq!(t, tag, "Expected a change of '{tag}', got one of '{t}'");
                assert_eq!(v, value, "Unexpected value for '{tag}'");
            }
            other => panic!("Expected a change of '{tag}', got {other:?}"),
        }
    }
}

// =============================================================================
// Error Assertions
// =============================================================================

/// Assertion extensions for station results.
pub trait StationResultAssertions {
    /// Asserts `UnknownTag`.
    fn assert_unknown_tag(&self);

    /// Asserts `Unwritable`.
    fn assert_unwritable(&self);

    /// Asserts `NotConnected`.
    fn assert_not_connected(&self);

    /// Asserts `WriteRejected` and returns the failure.
    fn assert_rejected(&self) -> &WriteFailure;
}

impl<T: std::fmt::Debug> StationResultAssertions for Result<T, StationError> {
    fn assert_unknown_tag(&self) {
        assert!(
            matches!(self, Err(StationError::UnknownTag { .. })),
            "Expected UnknownTag, got {self:?}"
        );
    }

    fn assert_unwritable(&self) {
        assert!(
            matches!(self, Err(StationError::Unwritable { .. })),
            "Expected Unwritable, got {self:?}"
        );
    }

    fn assert_not_connected(&self) {
        assert!(
            matches!(self, Err(StationError::NotConnected)),
            "Expected NotConnected, got {self:?}"
        );
    }

    fn assert_rejected(&self) -> &WriteFailure {
        match self {
            Err(StationError::WriteRejected { reason, .. }) => reason,
            other => panic!("Expected WriteRejected, got {other:?}"),
        }
    }
}

// =============================================================================
// Store Assertions
// =============================================================================

/// Asserts that `tag` currently holds `expected`.
pub fn assert_stored(store: &TagValueStore, tag: &str, expected: Option<TagValue>) {
    let actual = store.get(tag).expect("registered tag");
    assert_eq!(actual, expected, "Unexpected stored value for '{tag}'");
}

/// Asserts that every tag is back to `null` and the store is disconnected.
pub fn assert_reset(store: &TagValueStore) {
    assert!(!store.is_connected(), "Store still flagged connected");
    let set: Vec<_> = store
        .get_all()
        .into_iter()
        .filter(|(_, v)| v.is_some())
        .map(|(name, _)| name)
        .collect();
    assert!(set.is_empty(), "Tags not reset: {set:?}");
}
