// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API handlers for all endpoints.
//!
//! - [`stream`]: the tag event stream
//! - [`write`]: control writes
//! - [`connection`]: connect, disconnect and connection test
//! - [`tags`]: registry and current values
//! - [`status`]: station status and the session state stream
//! - [`health`]: liveness and readiness

pub mod connection;
pub mod health;
pub mod status;
pub mod stream;
pub mod tags;
pub mod write;

pub use connection::{connect, disconnect, test_connection};
pub use health::{health, ready};
pub use status::{station_status, stream_status};
pub use stream::stream_tags;
pub use tags::{get_tag, list_tags};
pub use write::write_tag;
