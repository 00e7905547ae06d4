// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # station-config
//!
//! Configuration of a station service: schema, validation and loading.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML and JSON, chosen by file extension
//! - **Placeholders**: `${VAR}` and `${VAR:default}` resolved before parsing
//! - **Environment Overrides**: `STATION_ENDPOINT`, `STATION_API_PORT`, ...
//! - **Production Guard**: simulation is rejected when `environment: production`
//!
//! ## Quick Start
//!
//! ```no_run
//! use station_config::loader::load_config;
//!
//! let config = load_config("station.yaml").unwrap();
//! let registry = config.registry().unwrap();
//! println!("{} tags on {}", registry.len(), config.station.name);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader, ConfigLoaderBuilder, EnvSource, load_config};
pub use schema::{
    ApiSettings, CorsSettings, Environment, LogFormat, LogLevel, LoggingSettings, StationConfig,
    StationSection, TagConfig,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
