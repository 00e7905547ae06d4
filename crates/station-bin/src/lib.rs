// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # station-bin
//!
//! The `station` command-line binary.
//!
//! ```text
//!                    main.rs
//!                       │
//!                    cli.rs ── logging.rs
//!                       │
//!        ┌──────────┬───┴──────┬──────────┐
//!        ▼          ▼          ▼          ▼
//!       run      validate    probe      watch
//!        │                                │
//!   runtime.rs ── shutdown.rs     ReconnectController
//!        │                                │
//!   station-* crates              GET /api/stream
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the service (default command)
//! station -c /etc/station/station.yaml
//!
//! # Development without a controller
//! station run --simulate
//!
//! # Test an endpoint
//! station probe opc.tcp://192.168.1.10:4840
//!
//! # Follow a running station
//! station watch http://localhost:8080
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{RuntimeBuilder, StationComponents, StationRuntime};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
