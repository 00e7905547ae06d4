// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `station` entry point.

use station_bin::cli::{Cli, LogFormat};
use station_bin::error::report_error;
use station_bin::{commands, init_logging};
use station_config::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let (level, format) = logging_settings(&cli);
    if let Err(e) = init_logging(&level, format) {
        eprintln!("{e}");
    }

    if let Err(e) = commands::execute(cli).await {
        tracing::error!(error = %e, "Command failed");
        report_error(&e);
        std::process::exit(e.exit_code());
    }
}

/// Flags first, then the config file's `logging` section, then defaults.
fn logging_settings(cli: &Cli) -> (String, LogFormat) {
    let configured = ConfigLoader::new()
        .load(&cli.config)
        .ok()
        .map(|config| config.logging);

    let level = cli
        .log_level_override()
        .map(str::to_string)
        .or_else(|| configured.map(|l| l.level.as_str().to_string()))
        .unwrap_or_else(|| "info".to_string());
    let format = cli
        .log_format
        .or_else(|| configured.map(|l| l.format.into()))
        .unwrap_or_default();

    (level, format)
}
