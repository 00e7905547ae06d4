// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! - `fixtures`: the reference station's tags, controller and configuration
//! - `mocks`: an in-memory OPC UA controller with failure injection
//! - `harness`: a fully wired station over the mock
//! - `assertions`: event, error and store assertions

pub mod assertions;
pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use assertions::*;
pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initializes test logging once per test binary.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,station=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Creates a temporary directory for configuration files.
pub fn temp_config_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("station-test")
        .tempdir()
        .expect("Failed to create temp directory")
}
