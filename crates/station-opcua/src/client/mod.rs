// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Upstream OPC UA client.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       SessionManager                            │
//! │     (connect / disconnect / probe / read / write, fallback)     │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                                     │
//!            ▼                                     ▼
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │    SubscriptionEngine    │        │        Simulator         │
//! │ (monitored items, pump)  │        │     (degraded mode)      │
//! └──────────────────────────┘        └──────────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       OpcUaTransport                            │
//! │       (session primitive, built by a TransportFactory)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod session;
pub mod subscription;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use session::{
    SIMULATED_ENDPOINT, SessionManager, SessionManagerBuilder, SessionState, SessionStats,
    SessionStatsSnapshot,
};
pub use subscription::{ConnectionLostHook, SubscriptionEngine, SubscriptionStats};
pub use transport::{
    MonitoredItemHandle, NotificationSink, OpcUaTransport, OpcUaValue, StatusCode,
    SubscriptionHandle, SubscriptionParams, TransportEvent, TransportFactory,
    UnavailableTransport, UnavailableTransportFactory, default_factory,
};

#[cfg(feature = "real-transport")]
pub use real_transport::{RealOpcUaTransport, RealTransportFactory};
