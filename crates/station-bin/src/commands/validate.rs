// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use station_config::{StationConfig, load_config};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    if !config_path.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = load_config(config_path)?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Station:     {} ({})", config.station.name, config.station.id);
            println!("  Environment: {}", config.station.environment);
            println!(
                "  Endpoint:    {}",
                config.session.endpoint.as_deref().unwrap_or("(none)")
            );
            println!("  Strategy:    {}", config.session.strategy);
            println!("  Tags:        {}", config.tags.len());
            println!("  API:         {}", config.api.socket_addr());

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {warning}");
                }
            }

            if args.show_config {
                println!();
                println!("{}", serde_json::to_string_pretty(&config).map_err(|e| BinError::runtime(e.to_string()))?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "station_id": config.station.id,
                    "station_name": config.station.name,
                    "environment": config.station.environment.as_str(),
                    "endpoint": config.session.endpoint,
                    "tag_count": config.tags.len(),
                    "api": config.api.socket_addr().to_string(),
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let rendered =
                serde_json::to_string_pretty(&output).map_err(|e| BinError::runtime(e.to_string()))?;
            println!("{rendered}");
        }
    }

    Ok(())
}

/// Non-fatal observations about a valid configuration.
fn collect_warnings(config: &StationConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.session.endpoint.is_none() {
        warnings.push("No endpoint configured; clients must connect explicitly".to_string());
    }
    if config.simulation_enabled() {
        warnings.push("Simulated values may be served".to_string());
    }
    if !config.tags.iter().any(|t| t.access.can_write()) {
        warnings.push("No writable tags".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use station_opcua::FallbackPolicy;
    use std::io::Write;

    fn cli_for(path: &std::path::Path) -> Cli {
        Cli::parse_from(["station", "-c", path.to_str().unwrap(), "validate"])
    }

    #[test]
    fn test_validate_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
station:
  id: validate-test
tags:
  - {{ name: ARU, address: "ns=1;s=ARU", type: boolean, access: [read, write] }}
"#
        )
        .unwrap();

        let args = ValidateArgs {
            show_config: false,
            format: OutputFormat::Json,
        };
        assert!(validate(&cli_for(file.path()), args).is_ok());
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate(&cli_for(&dir.path().join("absent.yaml")), ValidateArgs::default());
        assert!(matches!(result, Err(BinError::Configuration(_))));
    }

    #[test]
    fn test_warnings_for_empty_session() {
        let mut config = StationConfig::default();
        config.session.fallback = FallbackPolicy::Simulate;
        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 3);
    }
}
