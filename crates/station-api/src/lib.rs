// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # station-api
//!
//! HTTP surface of the station service.
//!
//! ```text
//!   browser / HMI
//!       │  GET /api/stream (text/event-stream)
//!       │  POST /api/write, /api/connection/*
//!       ▼
//!  ┌─────────────┐   attach    ┌─────────────────────┐
//!  │  ApiServer  │────────────▶│ DistributionChannel │
//!  │   (axum)    │             └─────────────────────┘
//!  │             │   write     ┌──────────────┐   ┌────────────────┐
//!  │             │────────────▶│ WriteGateway │──▶│ SessionManager │
//!  └─────────────┘             └──────────────┘   └────────────────┘
//! ```
//!
//! Failures are rendered by [`ApiError`] as
//! `{"success": false, "error": {"code", "message"}}`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod server;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorDetails, ErrorResponseBody};
pub use server::ApiServer;
pub use state::{AppState, AppStateBuilder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
