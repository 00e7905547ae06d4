// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport backed by the `opcua` crate.
//!
//! The `opcua` 0.12 client API is synchronous, so every call into it runs on
//! the blocking pool. Only anonymous access over `SecurityPolicy::None` is
//! used.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::oneshot;

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use crate::client::transport::{
    MonitoredItemHandle, NotificationSink, OpcUaTransport, OpcUaValue, StatusCode,
    SubscriptionHandle, SubscriptionParams, TransportEvent, TransportFactory,
};
use crate::error::{TransportError, TransportResult};
use crate::types::{MonitorParams, SessionConfig};

type SharedSession = Arc<OpcUaRwLock<Session>>;

/// Factory for [`RealOpcUaTransport`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTransportFactory;

impl TransportFactory for RealTransportFactory {
    fn create(&self, config: &SessionConfig) -> Box<dyn OpcUaTransport> {
        Box::new(RealOpcUaTransport::new(config.clone()))
    }

    fn name(&self) -> &'static str {
        "opcua"
    }
}

/// Transport speaking OPC UA through the `opcua` crate.
pub struct RealOpcUaTransport {
    config: SessionConfig,
    url: Option<String>,
    client: Option<Client>,
    endpoint: Option<EndpointDescription>,
    session: Option<SharedSession>,
    /// Keeps the session's publish loop alive; dropping it ends the loop.
    session_loop: Option<oneshot::Sender<SessionCommand>>,
    /// Client handle to server-side monitored item id.
    items: HashMap<MonitoredItemHandle, u32>,
    next_item: AtomicU32,
}

impl RealOpcUaTransport {
    /// Creates an unconnected transport.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            url: None,
            client: None,
            endpoint: None,
            session: None,
            session_loop: None,
            items: HashMap::new(),
            next_item: AtomicU32::new(1),
        }
    }

    fn build_client(&self) -> TransportResult<Client> {
        ClientBuilder::new()
            .application_name(self.config.application_name.as_str())
            .application_uri(self.config.application_uri().as_str())
            .session_retry_limit(self.config.max_retries as i32)
            .session_retry_interval(self.config.retry_initial_delay.as_millis() as u32)
            .session_timeout(self.config.session_timeout.as_millis() as u32)
            .client()
            .ok_or_else(|| TransportError::configuration("failed to build OPC UA client"))
    }

    fn stop_session_loop(&mut self) {
        if let Some(command) = self.session_loop.take() {
            if command.send(SessionCommand::Stop).is_err() {
                tracing::debug!("Session loop already stopped");
            }
        }
    }

    fn session(&self) -> TransportResult<SharedSession> {
        self.session.clone().ok_or(TransportError::NotConnected)
    }

    fn node_id(address: &str) -> TransportResult<NodeId> {
        NodeId::from_str(address)
            .map_err(|_| TransportError::operation(address, "malformed node id"))
    }

    fn read_value_id(node_id: NodeId) -> ReadValueId {
        ReadValueId {
            node_id,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            data_encoding: QualifiedName::null(),
        }
    }
}

async fn blocking<T, F>(operation: &'static str, f: F) -> TransportResult<T>
where
    F: FnOnce() -> TransportResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransportError::closed(format!("{operation} task failed: {e}")))?
}

fn from_variant(variant: &Variant) -> OpcUaValue {
    match variant {
        Variant::Boolean(v) => OpcUaValue::Boolean(*v),
        Variant::Byte(v) => OpcUaValue::Byte(*v),
        Variant::Int16(v) => OpcUaValue::Int16(*v),
        Variant::UInt16(v) => OpcUaValue::UInt16(*v),
        Variant::Int32(v) => OpcUaValue::Int32(*v),
        Variant::UInt32(v) => OpcUaValue::UInt32(*v),
        Variant::Int64(v) => OpcUaValue::Int64(*v),
        Variant::Float(v) => OpcUaValue::Float(*v),
        Variant::Double(v) => OpcUaValue::Double(*v),
        Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
        _ => OpcUaValue::Null,
    }
}

fn to_variant(value: &OpcUaValue) -> Variant {
    match value {
        OpcUaValue::Boolean(v) => Variant::Boolean(*v),
        OpcUaValue::Byte(v) => Variant::Byte(*v),
        OpcUaValue::Int16(v) => Variant::Int16(*v),
        OpcUaValue::UInt16(v) => Variant::UInt16(*v),
        OpcUaValue::Int32(v) => Variant::Int32(*v),
        OpcUaValue::UInt32(v) => Variant::UInt32(*v),
        OpcUaValue::Int64(v) => Variant::Int64(*v),
        OpcUaValue::Float(v) => Variant::Float(*v),
        OpcUaValue::Double(v) => Variant::Double(*v),
        OpcUaValue::String(v) => Variant::String(UAString::from(v.as_str())),
        OpcUaValue::Null => Variant::Empty,
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn connect(&mut self, url: &str) -> TransportResult<()> {
        let client = self.build_client()?;
        let target = url.to_string();

        let (client, endpoint) = blocking("connect", move || {
            let endpoints = client
                .get_server_endpoints_from_url(target.as_str())
                .map_err(|status| TransportError::connect(&target, status.to_string()))?;

            let none_policy = SecurityPolicy::None.to_uri();
            let endpoint = endpoints
                .into_iter()
                .find(|e| {
                    e.security_policy_uri.as_ref() == none_policy
                        && e.security_mode == MessageSecurityMode::None
                })
                .ok_or_else(|| TransportError::connect(&target, "no unsecured endpoint offered"))?;
            Ok((client, endpoint))
        })
        .await?;

        tracing::debug!(endpoint = %url, policy = %endpoint.security_policy_uri, "Selected endpoint");
        self.url = Some(url.to_string());
        self.client = Some(client);
        self.endpoint = Some(endpoint);
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.stop_session_loop();
        if let Some(session) = self.session.take() {
            blocking("disconnect", move || {
                session.read().disconnect();
                Ok(())
            })
            .await?;
        }
        self.items.clear();
        self.client = None;
        self.endpoint = None;
        Ok(())
    }

    async fn create_session(&mut self) -> TransportResult<()> {
        let mut client = self.client.take().ok_or(TransportError::NotConnected)?;
        let endpoint = self.endpoint.clone().ok_or(TransportError::NotConnected)?;

        let (client, session) = blocking("create_session", move || {
            let session = client
                .connect_to_endpoint(endpoint, IdentityToken::Anonymous)
                .map_err(|status| TransportError::session(status.to_string()))?;
            Ok((client, session))
        })
        .await?;

        // Drives publish requests for subscriptions until told to stop.
        self.session_loop = Some(Session::run_async(session.clone()));

        self.client = Some(client);
        self.session = Some(session);
        Ok(())
    }

    async fn close_session(&mut self) -> TransportResult<()> {
        self.stop_session_loop();
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        blocking("close_session", move || {
            session.read().disconnect();
            Ok(())
        })
        .await
    }

    async fn create_subscription(
        &mut self,
        params: &SubscriptionParams,
        sink: NotificationSink,
    ) -> TransportResult<SubscriptionHandle> {
        let session = self.session()?;
        let params = *params;
        let url = self.url.clone().unwrap_or_default();

        let id = blocking("create_subscription", move || {
            let lost_sink = sink.clone();
            let mut locked = session.write();
            locked.set_connection_status_callback(ConnectionStatusCallback::new(
                move |connected| {
                    if !connected {
                        let _ = lost_sink.send(TransportEvent::ConnectionLost {
                            reason: format!("connection to {url} lost"),
                        });
                    }
                },
            ));

            locked
                .create_subscription(
                    params.publishing_interval.as_millis() as f64,
                    params.lifetime_count,
                    params.keepalive_count,
                    0,
                    0,
                    true,
                    DataChangeCallback::new(move |items| {
                        for item in items {
                            let value = item
                                .last_value()
                                .value
                                .as_ref()
                                .map(from_variant)
                                .unwrap_or(OpcUaValue::Null);
                            let _ = sink.send(TransportEvent::DataChange {
                                item: MonitoredItemHandle(item.client_handle()),
                                value,
                            });
                        }
                    }),
                )
                .map_err(|status| TransportError::subscription(status.to_string()))
        })
        .await?;

        Ok(SubscriptionHandle(id))
    }

    async fn delete_subscription(&mut self, subscription: SubscriptionHandle) -> TransportResult<()> {
        let session = self.session()?;
        blocking("delete_subscription", move || {
            session
                .read()
                .delete_subscription(subscription.0)
                .map(|_| ())
                .map_err(|status| TransportError::subscription(status.to_string()))
        })
        .await
    }

    async fn monitor_item(
        &mut self,
        subscription: SubscriptionHandle,
        address: &str,
        params: &MonitorParams,
    ) -> TransportResult<MonitoredItemHandle> {
        let session = self.session()?;
        let node_id = Self::node_id(address)?;
        let handle = MonitoredItemHandle(self.next_item.fetch_add(1, Ordering::Relaxed));
        let request = MonitoredItemCreateRequest {
            item_to_monitor: Self::read_value_id(node_id),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: handle.0,
                sampling_interval: params.sampling_interval.as_millis() as f64,
                filter: ExtensionObject::null(),
                queue_size: params.queue_size,
                discard_oldest: params.discard_oldest,
            },
        };
        let target = address.to_string();

        let server_id = blocking("monitor_item", move || {
            let results = session
                .read()
                .create_monitored_items(subscription.0, TimestampsToReturn::Both, &[request])
                .map_err(|status| TransportError::subscription(status.to_string()))?;
            match results.first() {
                Some(r) if r.status_code.is_good() => Ok(r.monitored_item_id),
                Some(r) => Err(TransportError::operation(&target, r.status_code.to_string())),
                None => Err(TransportError::operation(&target, "empty monitor response")),
            }
        })
        .await?;

        self.items.insert(handle, server_id);
        Ok(handle)
    }

    async fn delete_monitored_items(
        &mut self,
        subscription: SubscriptionHandle,
        items: &[MonitoredItemHandle],
    ) -> TransportResult<()> {
        let server_ids: Vec<u32> = items.iter().filter_map(|h| self.items.remove(h)).collect();
        if server_ids.is_empty() {
            return Ok(());
        }
        let session = self.session()?;
        blocking("delete_monitored_items", move || {
            session
                .read()
                .delete_monitored_items(subscription.0, &server_ids)
                .map(|_| ())
                .map_err(|status| TransportError::subscription(status.to_string()))
        })
        .await
    }

    async fn read(&self, address: &str) -> TransportResult<OpcUaValue> {
        let session = self.session()?;
        let request = Self::read_value_id(Self::node_id(address)?);
        let target = address.to_string();

        blocking("read", move || {
            let results = session
                .read()
                .read(&[request], TimestampsToReturn::Both, 0.0)
                .map_err(|status| TransportError::operation(&target, status.to_string()))?;
            let data = results
                .first()
                .ok_or_else(|| TransportError::operation(&target, "empty read response"))?;
            if let Some(status) = data.status.as_ref().filter(|s| !s.is_good()) {
                return Err(TransportError::operation(&target, status.to_string()));
            }
            Ok(data.value.as_ref().map(from_variant).unwrap_or(OpcUaValue::Null))
        })
        .await
    }

    async fn write(&self, address: &str, value: OpcUaValue) -> TransportResult<StatusCode> {
        let session = self.session()?;
        let request = WriteValue {
            node_id: Self::node_id(address)?,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            value: DataValue::new_now(to_variant(&value)),
        };
        let target = address.to_string();

        blocking("write", move || {
            let results = session
                .read()
                .write(&[request])
                .map_err(|status| TransportError::operation(&target, status.to_string()))?;
            results
                .first()
                .map(|status| StatusCode(status.bits()))
                .ok_or_else(|| TransportError::operation(&target, "empty write response"))
        })
        .await
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn display_name(&self) -> String {
        format!(
            "RealOpcUaTransport({})",
            self.url.as_deref().unwrap_or("unconnected")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_conversion() {
        assert_eq!(from_variant(&Variant::Boolean(true)), OpcUaValue::Boolean(true));
        assert_eq!(from_variant(&Variant::Int16(-4)), OpcUaValue::Int16(-4));
        assert_eq!(from_variant(&Variant::Empty), OpcUaValue::Null);
        assert_eq!(to_variant(&OpcUaValue::Float(1.5)), Variant::Float(1.5));
    }

    #[test]
    fn test_malformed_node_id() {
        assert!(RealOpcUaTransport::node_id("ns=1;s=ARU").is_ok());
        assert!(RealOpcUaTransport::node_id("not a node").is_err());
    }

    #[tokio::test]
    async fn test_unconnected_operations() {
        let transport = RealOpcUaTransport::new(SessionConfig::default());
        assert!(!transport.is_connected());
        assert_eq!(
            transport.read("ns=1;s=ARU").await.unwrap_err(),
            TransportError::NotConnected
        );
    }

    #[tokio::test]
    async fn test_close_session_stops_session_loop() {
        let mut transport = RealOpcUaTransport::new(SessionConfig::default());
        let (command, mut loop_commands) = oneshot::channel();
        transport.session_loop = Some(command);

        transport.close_session().await.unwrap();

        assert!(matches!(loop_commands.try_recv(), Ok(SessionCommand::Stop)));
        assert!(transport.session_loop.is_none());
        // A second close has nothing left to stop.
        transport.disconnect().await.unwrap();
    }
}
