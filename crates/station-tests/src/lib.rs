// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Station Integration Tests
//!
//! Integration tests for the station service and the utilities they share.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p station-tests
//!
//! # Run one suite
//! cargo test -p station-tests --test integration_session
//! cargo test -p station-tests --test integration_gateway
//! cargo test -p station-tests --test integration_channel
//! cargo test -p station-tests --test integration_api
//! cargo test -p station-tests --test integration_config
//! cargo test -p station-tests --test integration_reconnect
//! ```
//!
//! ## Test Categories
//!
//! | Suite                   | Covers                                              |
//! |-------------------------|-----------------------------------------------------|
//! | `integration_session`   | connect, disconnect, endpoint switch, loss, degraded |
//! | `integration_gateway`   | access checks, coercion, rejections, timeouts       |
//! | `integration_channel`   | initial snapshot, ordering, detach isolation        |
//! | `integration_api`       | HTTP routes, status codes, event stream framing     |
//! | `integration_config`    | file loading, overrides, runtime wiring             |
//! | `integration_reconnect` | SSE client retries against a served station         |
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use station_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let station = TestStation::new();
//!     station.connect_and_sync().await;
//!     station.controller.set_value(NIVEAU_ADDRESS, OpcUaValue::Int16(7));
//!     station.wait_for_value("niveau", TagValue::Int16(7)).await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::init_test_logging;
    pub use crate::common::mocks::*;

    pub use station_core::prelude::*;
    pub use station_opcua::{OpcUaValue, SessionState, StatusCode};
}
