// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Upstream side of the station: the OPC UA session to the plant controller.
//!
//! This crate keeps at most one session open, subscribes every readable tag,
//! feeds notifications into the [`station_core`] store and distribution
//! channel, and serializes control writes back to the controller.
//!
//! # Features
//!
//! - Session lifecycle with a hard connect timeout
//! - One subscription per session, one monitored item per readable tag
//! - Degraded mode driven by a simulator when explicitly allowed
//! - Write gateway enforcing the per-tag access table
//! - `real-transport`: OPC UA client from the `opcua` crate
//!
//! # Error Handling
//!
//! ```text
//! TransportError (session primitive)
//! ├── Connect / Session   → ConnectionError
//! ├── NotConnected        → StationError::NotConnected
//! ├── Timeout             → WriteFailure::Timeout
//! └── Operation / Closed  → WriteFailure::Transport
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use station_opcua::{SessionConfig, SessionManager, WriteGateway};
//!
//! let session = SessionManager::builder(store.clone(), channel.clone())
//!     .config(SessionConfig::builder().endpoint("opc.tcp://192.168.1.10:4840").build()?)
//!     .build();
//! session.init(true).await?;
//!
//! let gateway = WriteGateway::new(session.clone(), store.clone());
//! gateway.write("ARU", &serde_json::json!(true)).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod gateway;
pub mod simulator;
pub mod types;

pub use client::{
    OpcUaTransport, OpcUaValue, SIMULATED_ENDPOINT, SessionManager, SessionManagerBuilder,
    SessionState, SessionStatsSnapshot, StatusCode, TransportFactory, default_factory,
};
pub use error::{TransportError, TransportResult};
pub use gateway::{GatewayStats, WriteGateway};
pub use simulator::{Simulator, SimulatorHandle};
pub use types::{
    FallbackPolicy, MonitorParams, SessionConfig, SessionConfigBuilder, SessionStrategy,
    SimulatorSettings, SubscriptionSettings, validate_endpoint,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
