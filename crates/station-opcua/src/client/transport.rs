// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The session manager only ever talks to the controller through
//! [`OpcUaTransport`]. A [`TransportFactory`] hands out fresh transports so a
//! connection probe never disturbs the shared session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use station_core::types::{TagValue, ValueType};

use crate::error::{TransportError, TransportResult};
use crate::types::{MonitorParams, SessionConfig, SubscriptionSettings};

// =============================================================================
// Handles and status codes
// =============================================================================

/// Transport-assigned subscription handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u32);

/// Transport-assigned monitored item handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitoredItemHandle(pub u32);

impl fmt::Display for MonitoredItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// `Good`.
    pub const GOOD: Self = Self(0);
    /// `BadNotWritable`.
    pub const BAD_NOT_WRITABLE: Self = Self(0x803B_0000);
    /// `BadTypeMismatch`.
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);
    /// `BadNodeIdUnknown`.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);

    /// Returns `true` when the severity bits are Good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` when the severity bits are Bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

// =============================================================================
// OpcUaValue
// =============================================================================

/// Wire-level value as reported by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum OpcUaValue {
    /// Boolean.
    Boolean(bool),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String.
    String(String),
    /// Empty variant.
    Null,
}

impl OpcUaValue {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Boolean(v) => Some(i64::from(*v)),
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Double(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Decodes this value according to a tag's declared type.
    pub fn decode(&self, value_type: ValueType) -> Result<TagValue, String> {
        if matches!(self, Self::Null) {
            return Err("empty value".to_string());
        }

        match value_type {
            ValueType::Boolean => match self {
                Self::Boolean(v) => Ok(TagValue::Boolean(*v)),
                other => other
                    .as_i64()
                    .map(|v| TagValue::Boolean(v != 0))
                    .ok_or_else(|| format!("cannot decode {:?} as boolean", other)),
            },
            ValueType::Int16 => {
                let v = self
                    .as_i64()
                    .ok_or_else(|| format!("cannot decode {:?} as int16", self))?;
                i16::try_from(v)
                    .map(TagValue::Int16)
                    .map_err(|_| format!("{} is outside the int16 range", v))
            }
            ValueType::Float => self
                .as_f64()
                .map(|v| TagValue::Float(v as f32))
                .ok_or_else(|| format!("cannot decode {:?} as float", self)),
            ValueType::String => Ok(TagValue::String(match self {
                Self::String(s) => s.clone(),
                Self::Boolean(v) => v.to_string(),
                Self::Float(v) => v.to_string(),
                Self::Double(v) => v.to_string(),
                other => other.as_i64().map(|v| v.to_string()).unwrap_or_default(),
            })),
        }
    }
}

impl From<&TagValue> for OpcUaValue {
    fn from(value: &TagValue) -> Self {
        match value {
            TagValue::Boolean(v) => OpcUaValue::Boolean(*v),
            TagValue::Int16(v) => OpcUaValue::Int16(*v),
            TagValue::Float(v) => OpcUaValue::Float(*v),
            TagValue::String(v) => OpcUaValue::String(v.clone()),
        }
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// Events a transport pushes into a subscription's sink.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A monitored item reported a new value.
    DataChange {
        /// Item that changed.
        item: MonitoredItemHandle,
        /// New value.
        value: OpcUaValue,
    },
    /// The connection underneath the subscription was lost.
    ConnectionLost {
        /// Reason reported by the transport.
        reason: String,
    },
}

/// Sink for subscription notifications.
///
/// Unbounded so transport callbacks never block; order is preserved.
pub type NotificationSink = mpsc::UnboundedSender<TransportEvent>;

/// Parameters of a subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscriptionParams {
    /// Publishing interval.
    pub publishing_interval: Duration,
    /// Lifetime count.
    pub lifetime_count: u32,
    /// Keep-alive count.
    pub keepalive_count: u32,
}

impl From<&SubscriptionSettings> for SubscriptionParams {
    fn from(settings: &SubscriptionSettings) -> Self {
        Self {
            publishing_interval: settings.publishing_interval,
            lifetime_count: settings.lifetime_count,
            keepalive_count: settings.keepalive_count,
        }
    }
}

// =============================================================================
// OpcUaTransport
// =============================================================================

/// Session primitive used by the session manager.
///
/// Implementations own their connection. Every method is async and
/// fallible; the manager is responsible for ordering and timeouts.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    /// Opens the connection to an endpoint.
    async fn connect(&mut self, endpoint: &str) -> TransportResult<()>;

    /// Closes the connection.
    async fn disconnect(&mut self) -> TransportResult<()>;

    /// Creates and activates a session on the open connection.
    async fn create_session(&mut self) -> TransportResult<()>;

    /// Closes the session.
    async fn close_session(&mut self) -> TransportResult<()>;

    /// Creates a subscription whose notifications go to `sink`.
    async fn create_subscription(
        &mut self,
        params: &SubscriptionParams,
        sink: NotificationSink,
    ) -> TransportResult<SubscriptionHandle>;

    /// Deletes a subscription.
    async fn delete_subscription(&mut self, subscription: SubscriptionHandle) -> TransportResult<()>;

    /// Adds one monitored item to a subscription.
    async fn monitor_item(
        &mut self,
        subscription: SubscriptionHandle,
        address: &str,
        params: &MonitorParams,
    ) -> TransportResult<MonitoredItemHandle>;

    /// Removes monitored items from a subscription.
    async fn delete_monitored_items(
        &mut self,
        subscription: SubscriptionHandle,
        items: &[MonitoredItemHandle],
    ) -> TransportResult<()>;

    /// Reads the current value of a node.
    async fn read(&self, address: &str) -> TransportResult<OpcUaValue>;

    /// Writes a value and returns the controller's status code.
    async fn write(&self, address: &str, value: OpcUaValue) -> TransportResult<StatusCode>;

    /// Returns `true` while the connection is open.
    fn is_connected(&self) -> bool;

    /// Returns a human readable name.
    fn display_name(&self) -> String;
}

// =============================================================================
// Factory
// =============================================================================

/// Creates fresh transports.
pub trait TransportFactory: Send + Sync {
    /// Creates a new, unconnected transport.
    fn create(&self, config: &SessionConfig) -> Box<dyn OpcUaTransport>;

    /// Returns the factory name, for logging.
    fn name(&self) -> &'static str;
}

/// Returns the factory selected at build time.
///
/// With the `real-transport` feature this is the `opcua` crate client;
/// otherwise every connect is refused.
pub fn default_factory() -> Arc<dyn TransportFactory> {
    #[cfg(feature = "real-transport")]
    {
        Arc::new(super::real_transport::RealTransportFactory)
    }
    #[cfg(not(feature = "real-transport"))]
    {
        Arc::new(UnavailableTransportFactory)
    }
}

/// Transport used when no OPC UA stack is compiled in.
#[derive(Debug, Default)]
pub struct UnavailableTransport;

#[async_trait]
impl OpcUaTransport for UnavailableTransport {
    async fn connect(&mut self, endpoint: &str) -> TransportResult<()> {
        Err(TransportError::connect(
            endpoint,
            "no OPC UA transport available (built without the real-transport feature)",
        ))
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        Ok(())
    }

    async fn create_session(&mut self) -> TransportResult<()> {
        Err(TransportError::NotConnected)
    }

    async fn close_session(&mut self) -> TransportResult<()> {
        Ok(())
    }

    async fn create_subscription(
        &mut self,
        _params: &SubscriptionParams,
        _sink: NotificationSink,
    ) -> TransportResult<SubscriptionHandle> {
        Err(TransportError::NotConnected)
    }

    async fn delete_subscription(&mut self, _subscription: SubscriptionHandle) -> TransportResult<()> {
        Err(TransportError::NotConnected)
    }

    async fn monitor_item(
        &mut self,
        _subscription: SubscriptionHandle,
        _address: &str,
        _params: &MonitorParams,
    ) -> TransportResult<MonitoredItemHandle> {
        Err(TransportError::NotConnected)
    }

    async fn delete_monitored_items(
        &mut self,
        _subscription: SubscriptionHandle,
        _items: &[MonitoredItemHandle],
    ) -> TransportResult<()> {
        Err(TransportError::NotConnected)
    }

    async fn read(&self, _address: &str) -> TransportResult<OpcUaValue> {
        Err(TransportError::NotConnected)
    }

    async fn write(&self, _address: &str, _value: OpcUaValue) -> TransportResult<StatusCode> {
        Err(TransportError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn display_name(&self) -> String {
        "UnavailableTransport".to_string()
    }
}

/// Factory of [`UnavailableTransport`].
#[derive(Debug, Default)]
pub struct UnavailableTransportFactory;

impl TransportFactory for UnavailableTransportFactory {
    fn create(&self, _config: &SessionConfig) -> Box<dyn OpcUaTransport> {
        Box::new(UnavailableTransport)
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode::BAD_NOT_WRITABLE.is_bad());
        assert!(!StatusCode(0x4000_0000).is_good());
        assert_eq!(StatusCode::BAD_TYPE_MISMATCH.to_string(), "0x80740000");
    }

    #[test]
    fn test_decode_by_declared_type() {
        assert_eq!(
            OpcUaValue::Int32(1).decode(ValueType::Boolean).unwrap(),
            TagValue::Boolean(true)
        );
        assert_eq!(
            OpcUaValue::UInt16(42).decode(ValueType::Int16).unwrap(),
            TagValue::Int16(42)
        );
        assert_eq!(
            OpcUaValue::Double(12.0).decode(ValueType::Int16).unwrap(),
            TagValue::Int16(12)
        );
        assert_eq!(
            OpcUaValue::Int16(3).decode(ValueType::Float).unwrap(),
            TagValue::Float(3.0)
        );
        assert_eq!(
            OpcUaValue::Boolean(false).decode(ValueType::String).unwrap(),
            TagValue::String("false".into())
        );
    }

    #[test]
    fn test_decode_failures() {
        assert!(OpcUaValue::Null.decode(ValueType::Boolean).is_err());
        assert!(OpcUaValue::Int32(70_000).decode(ValueType::Int16).is_err());
        assert!(OpcUaValue::Double(1.5).decode(ValueType::Int16).is_err());
        assert!(OpcUaValue::String("x".into()).decode(ValueType::Float).is_err());
    }

    #[test]
    fn test_encode_tag_value() {
        assert_eq!(OpcUaValue::from(&TagValue::Boolean(true)), OpcUaValue::Boolean(true));
        assert_eq!(OpcUaValue::from(&TagValue::Int16(-1)), OpcUaValue::Int16(-1));
    }

    #[tokio::test]
    async fn test_unavailable_transport_refuses() {
        let factory = UnavailableTransportFactory;
        let mut transport = factory.create(&SessionConfig::default());
        let err = transport.connect("opc.tcp://plc:4840").await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(!transport.is_connected());
    }
}
