// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tag registry.
//!
//! The registry is the static table of tags the station knows about. It is
//! built once at startup and shared as `Arc<TagRegistry>`; nothing mutates it
//! afterwards, so readers need no lock.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{StationError, StationResult};
use crate::types::{Access, AccessRights, ValueRange, ValueType};

// =============================================================================
// TagDefinition
// =============================================================================

/// A single registered tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDefinition {
    /// Unique tag name used by consumers.
    pub name: String,
    /// Node address on the controller, e.g. `ns=1;s=ARU`.
    pub remote_address: String,
    /// Declared value type.
    pub value_type: ValueType,
    /// Allowed access modes.
    pub access: AccessRights,
    /// Numeric range, used by the simulator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ValueRange>,
}

impl TagDefinition {
    /// Creates a new tag definition without a range.
    pub fn new(
        name: impl Into<String>,
        remote_address: impl Into<String>,
        value_type: ValueType,
        access: AccessRights,
    ) -> Self {
        Self {
            name: name.into(),
            remote_address: remote_address.into(),
            value_type,
            access,
            range: None,
        }
    }

    /// Sets the numeric range.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(ValueRange::new(min, max));
        self
    }

    /// Returns `true` if the tag can be read.
    #[inline]
    pub fn is_readable(&self) -> bool {
        self.access.contains(Access::Read)
    }

    /// Returns `true` if the tag can be written.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.access.contains(Access::Write)
    }

    /// Returns the range, falling back to `0..=100`.
    pub fn effective_range(&self) -> ValueRange {
        self.range.unwrap_or_default()
    }
}

// =============================================================================
// TagRegistry
// =============================================================================

/// Immutable table of tags, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: Vec<TagDefinition>,
    index: HashMap<String, usize>,
}

impl TagRegistry {
    /// Builds a registry, rejecting duplicate names, empty addresses and
    /// ranges without `min < max`.
    pub fn new(tags: impl IntoIterator<Item = TagDefinition>) -> StationResult<Self> {
        let tags: Vec<TagDefinition> = tags.into_iter().collect();
        let mut index = HashMap::with_capacity(tags.len());

        for (position, tag) in tags.iter().enumerate() {
            if tag.name.trim().is_empty() {
                return Err(StationError::configuration("tag name must not be empty"));
            }
            if tag.remote_address.trim().is_empty() {
                return Err(StationError::configuration(format!(
                    "tag '{}' has an empty remote address",
                    tag.name
                )));
            }
            if tag.access.is_empty() {
                return Err(StationError::configuration(format!(
                    "tag '{}' grants no access",
                    tag.name
                )));
            }
            if let Some(range) = tag.range.filter(|r| !r.is_valid()) {
                return Err(StationError::configuration(format!(
                    "tag '{}' has an invalid range {}..{}",
                    tag.name, range.min, range.max
                )));
            }
            if index.insert(tag.name.clone(), position).is_some() {
                return Err(StationError::configuration(format!(
                    "duplicate tag name '{}'",
                    tag.name
                )));
            }
        }

        Ok(Self { tags, index })
    }

    /// Looks up a tag by name.
    pub fn lookup(&self, name: &str) -> StationResult<&TagDefinition> {
        self.index
            .get(name)
            .map(|&i| &self.tags[i])
            .ok_or_else(|| StationError::unknown_tag(name))
    }

    /// Returns `true` if the tag is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates over all tags in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TagDefinition> {
        self.tags.iter()
    }

    /// Iterates over readable tags.
    pub fn readable(&self) -> impl Iterator<Item = &TagDefinition> {
        self.tags.iter().filter(|t| t.is_readable())
    }

    /// Iterates over writable tags.
    pub fn writable(&self) -> impl Iterator<Item = &TagDefinition> {
        self.tags.iter().filter(|t| t.is_writable())
    }

    /// Iterates over boolean tags.
    pub fn boolean_tags(&self) -> impl Iterator<Item = &TagDefinition> {
        self.tags
            .iter()
            .filter(|t| t.value_type == ValueType::Boolean)
    }

    /// Returns the number of tags.
    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` if no tags are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
