// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for the station.
//!
//! Tag values are a tagged union keyed by the registry's declared
//! [`ValueType`]. Untyped JSON coming from the HTTP surface is converted
//! exactly once, by [`TagValue::coerce`], and never travels deeper than that.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ValueType
// =============================================================================

/// The primitive type a tag is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Boolean flag (pumps, valves, alarms).
    Boolean,
    /// Signed 16-bit integer (levels, counters).
    Int16,
    /// 32-bit floating point.
    Float,
    /// UTF-8 string.
    String,
}

impl ValueType {
    /// Returns the type name used in configuration and error messages.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Int16 => "int16",
            ValueType::Float => "float",
            ValueType::String => "string",
        }
    }

    /// Returns `true` for numeric types.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int16 | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Access
// =============================================================================

/// A single access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// The tag can be read and subscribed to.
    Read,
    /// The tag can be written.
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("write"),
        }
    }
}

/// The subset of `{Read, Write}` a tag allows.
///
/// Serialized as a list, e.g. `["read", "write"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Access>", into = "Vec<Access>")]
pub struct AccessRights {
    read: bool,
    write: bool,
}

impl AccessRights {
    /// Read-only access.
    pub const READ: Self = Self { read: true, write: false };

    /// Write-only access.
    pub const WRITE: Self = Self { read: false, write: true };

    /// Read and write access.
    pub const READ_WRITE: Self = Self { read: true, write: true };

    /// Returns `true` if the given mode is allowed.
    #[inline]
    pub fn contains(&self, access: Access) -> bool {
        match access {
            Access::Read => self.read,
            Access::Write => self.write,
        }
    }

    /// Returns `true` if the tag is readable.
    #[inline]
    pub fn can_read(&self) -> bool {
        self.read
    }

    /// Returns `true` if the tag is writable.
    #[inline]
    pub fn can_write(&self) -> bool {
        self.write
    }

    /// Returns `true` if no access is granted at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.read && !self.write
    }
}

impl FromIterator<Access> for AccessRights {
    fn from_iter<I: IntoIterator<Item = Access>>(iter: I) -> Self {
        let mut rights = AccessRights::default();
        for access in iter {
            match access {
                Access::Read => rights.read = true,
                Access::Write => rights.write = true,
            }
        }
        rights
    }
}

impl From<Vec<Access>> for AccessRights {
    fn from(modes: Vec<Access>) -> Self {
        modes.into_iter().collect()
    }
}

impl From<AccessRights> for Vec<Access> {
    fn from(rights: AccessRights) -> Self {
        let mut modes = Vec::with_capacity(2);
        if rights.read {
            modes.push(Access::Read);
        }
        if rights.write {
            modes.push(Access::Write);
        }
        modes
    }
}

impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.read, self.write) {
            (true, true) => f.write_str("read+write"),
            (true, false) => f.write_str("read"),
            (false, true) => f.write_str("write"),
            (false, false) => f.write_str("none"),
        }
    }
}

// =============================================================================
// ValueRange
// =============================================================================

/// Inclusive numeric range of a tag, used by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl ValueRange {
    /// Creates a new range.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `min < max`.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::new(0.0, 100.0)
    }
}

// =============================================================================
// TagValue
// =============================================================================

/// A typed tag value.
///
/// Serializes to a bare JSON scalar so that downstream events read
/// `{"tag": "ARU", "value": true}`.
///
/// # Examples
///
/// ```
/// use station_core::types::{TagValue, ValueType};
///
/// let value = TagValue::coerce(ValueType::Int16, &serde_json::json!("42")).unwrap();
/// assert_eq!(value, TagValue::Int16(42));
/// assert_eq!(value.value_type(), ValueType::Int16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed 16-bit integer.
    Int16(i16),
    /// 32-bit float.
    Float(f32),
    /// String value.
    String(String),
}

impl TagValue {
    /// Returns the type of this value.
    #[inline]
    pub fn value_type(&self) -> ValueType {
        match self {
            TagValue::Boolean(_) => ValueType::Boolean,
            TagValue::Int16(_) => ValueType::Int16,
            TagValue::Float(_) => ValueType::Float,
            TagValue::String(_) => ValueType::String,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as an f64, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Int16(v) => Some(f64::from(*v)),
            TagValue::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Converts this value to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TagValue::Boolean(v) => serde_json::Value::Bool(*v),
            TagValue::Int16(v) => serde_json::json!(*v),
            TagValue::Float(v) => serde_json::json!(*v),
            TagValue::String(v) => serde_json::Value::String(v.clone()),
        }
    }

    /// Coerces an untyped JSON value to the declared type.
    ///
    /// The declared type is authoritative: `"1"`, `1` and `true` all become
    /// `Boolean(true)` for a boolean tag. Values that cannot be represented
    /// (out-of-range integers, non-numeric strings, `null`, arrays, objects)
    /// are rejected with a short reason.
    pub fn coerce(value_type: ValueType, raw: &serde_json::Value) -> Result<TagValue, String> {
        use serde_json::Value as Json;

        match (value_type, raw) {
            (_, Json::Null) => Err("null is not a valid tag value".to_string()),
            (_, Json::Array(_)) | (_, Json::Object(_)) => {
                Err("expected a scalar value".to_string())
            }

            (ValueType::Boolean, Json::Bool(b)) => Ok(TagValue::Boolean(*b)),
            (ValueType::Boolean, Json::Number(n)) => match n.as_f64() {
                Some(f) => Ok(TagValue::Boolean(f != 0.0)),
                None => Err(format!("cannot interpret {} as boolean", n)),
            },
            (ValueType::Boolean, Json::String(s)) => parse_bool(s)
                .map(TagValue::Boolean)
                .ok_or_else(|| format!("cannot interpret '{}' as boolean", s)),

            (ValueType::Int16, Json::Bool(b)) => Ok(TagValue::Int16(i16::from(*b))),
            (ValueType::Int16, Json::Number(n)) => match n.as_f64() {
                Some(f) => to_int16(f).map(TagValue::Int16),
                None => Err(format!("cannot interpret {} as int16", n)),
            },
            (ValueType::Int16, Json::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("cannot interpret '{}' as int16", s))
                .and_then(to_int16)
                .map(TagValue::Int16),

            (ValueType::Float, Json::Bool(b)) => {
                Ok(TagValue::Float(if *b { 1.0 } else { 0.0 }))
            }
            (ValueType::Float, Json::Number(n)) => match n.as_f64() {
                Some(f) => to_float(f).map(TagValue::Float),
                None => Err(format!("cannot interpret {} as float", n)),
            },
            (ValueType::Float, Json::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("cannot interpret '{}' as float", s))
                .and_then(to_float)
                .map(TagValue::Float),

            (ValueType::String, Json::String(s)) => Ok(TagValue::String(s.clone())),
            (ValueType::String, other) => Ok(TagValue::String(other.to_string())),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Boolean(v) => write!(f, "{}", v),
            TagValue::Int16(v) => write!(f, "{}", v),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Boolean(v)
    }
}

impl From<i16> for TagValue {
    fn from(v: i16) -> Self {
        TagValue::Int16(v)
    }
}

impl From<f32> for TagValue {
    fn from(v: f32) -> Self {
        TagValue::Float(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::String(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::String(v)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn to_int16(f: f64) -> Result<i16, String> {
    if !f.is_finite() || f.fract() != 0.0 {
        return Err(format!("{} is not an integer", f));
    }
    if f < f64::from(i16::MIN) || f > f64::from(i16::MAX) {
        return Err(format!(
            "{} is outside the int16 range ({}..={})",
            f,
            i16::MIN,
            i16::MAX
        ));
    }
    Ok(f as i16)
}

fn to_float(f: f64) -> Result<f32, String> {
    if !f.is_finite() || f.abs() > f64::from(f32::MAX) {
        return Err(format!("{} cannot be represented as float", f));
    }
    Ok(f as f32)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_rights_from_list() {
        let rights: AccessRights = vec![Access::Read, Access::Write].into();
        assert!(rights.can_read());
        assert!(rights.can_write());
        assert_eq!(rights, AccessRights::READ_WRITE);

        let read_only: AccessRights = serde_json::from_value(json!(["read"])).unwrap();
        assert_eq!(read_only, AccessRights::READ);
        assert!(!read_only.contains(Access::Write));
    }

    #[test]
    fn test_access_rights_serialize_as_list() {
        let json = serde_json::to_value(AccessRights::READ_WRITE).unwrap();
        assert_eq!(json, json!(["read", "write"]));
        assert_eq!(AccessRights::default().to_string(), "none");
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(
            TagValue::coerce(ValueType::Boolean, &json!(true)).unwrap(),
            TagValue::Boolean(true)
        );
        assert_eq!(
            TagValue::coerce(ValueType::Boolean, &json!(0)).unwrap(),
            TagValue::Boolean(false)
        );
        assert_eq!(
            TagValue::coerce(ValueType::Boolean, &json!("ON")).unwrap(),
            TagValue::Boolean(true)
        );
        assert!(TagValue::coerce(ValueType::Boolean, &json!("maybe")).is_err());
    }

    #[test]
    fn test_coerce_int16_bounds() {
        assert_eq!(
            TagValue::coerce(ValueType::Int16, &json!(10)).unwrap(),
            TagValue::Int16(10)
        );
        assert_eq!(
            TagValue::coerce(ValueType::Int16, &json!(12.0)).unwrap(),
            TagValue::Int16(12)
        );
        assert_eq!(
            TagValue::coerce(ValueType::Int16, &json!(true)).unwrap(),
            TagValue::Int16(1)
        );
        assert!(TagValue::coerce(ValueType::Int16, &json!(40000)).is_err());
        assert!(TagValue::coerce(ValueType::Int16, &json!(1.5)).is_err());
    }

    #[test]
    fn test_coerce_float_and_string() {
        assert_eq!(
            TagValue::coerce(ValueType::Float, &json!("2.5")).unwrap(),
            TagValue::Float(2.5)
        );
        assert_eq!(
            TagValue::coerce(ValueType::String, &json!(7)).unwrap(),
            TagValue::String("7".to_string())
        );
    }

    #[test]
    fn test_coerce_rejects_null_and_composites() {
        for ty in [ValueType::Boolean, ValueType::Int16, ValueType::Float, ValueType::String] {
            assert!(TagValue::coerce(ty, &json!(null)).is_err());
            assert!(TagValue::coerce(ty, &json!([1, 2])).is_err());
        }
    }

    #[test]
    fn test_tag_value_serializes_bare() {
        assert_eq!(serde_json::to_value(TagValue::Boolean(true)).unwrap(), json!(true));
        assert_eq!(serde_json::to_value(TagValue::Int16(-3)).unwrap(), json!(-3));
        assert_eq!(serde_json::to_value(TagValue::from("ok")).unwrap(), json!("ok"));
    }

    #[test]
    fn test_value_range() {
        assert!(ValueRange::default().is_valid());
        assert!(!ValueRange::new(5.0, 5.0).is_valid());
    }
}
