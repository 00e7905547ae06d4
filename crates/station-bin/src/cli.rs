// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Start the station service (default)
//! - `validate`: Validate the configuration file
//! - `version`: Show version information
//! - `probe`: Test a controller endpoint
//! - `watch`: Follow a running station's event stream

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Station tag-sync service
///
/// Keeps one OPC UA session to the plant controller and fans tag changes out
/// to HTTP clients.
#[derive(Parser, Debug)]
#[command(
    name = "station",
    author = "Sylvex <contact@sylvex.io>",
    version = station_core::VERSION,
    about = "Water treatment station tag synchronization service",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "station.yaml",
        env = "STATION_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, env = "STATION_LOG", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact). Overrides the config file.
    #[arg(long, env = "STATION_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the station service
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration without starting anything.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,

    /// Test a controller endpoint
    ///
    /// Opens and closes a session without subscribing to anything.
    Probe(ProbeArgs),

    /// Follow a running station's event stream
    ///
    /// Reconnects after failures and gives up after the configured attempts.
    Watch(WatchArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Serve simulated values (refused in production)
    #[arg(long, env = "STATION_SIMULATE")]
    pub simulate: bool,

    /// Skip connecting to the configured endpoint on startup
    #[arg(long)]
    pub no_connect: bool,

    /// Override the API port
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Show the parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `probe` command.
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Controller endpoint, `opc.tcp://host:port`
    pub endpoint: String,

    /// Connect timeout (e.g. `10s`)
    #[arg(short, long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,
}

/// Arguments for the `watch` command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Station base URL, e.g. `http://localhost:8080`
    pub url: String,

    /// Endpoint the station should connect to before streaming
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Delay between reconnect attempts
    #[arg(short, long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub delay: Duration,

    /// Consecutive failed reconnects before giving up
    #[arg(short, long, default_value_t = 5)]
    pub max_attempts: u32,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<station_config::LogFormat> for LogFormat {
    fn from(format: station_config::LogFormat) -> Self {
        match format {
            station_config::LogFormat::Text => LogFormat::Text,
            station_config::LogFormat::Json => LogFormat::Json,
            station_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parses CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the effective command, defaulting to `Run`.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Returns the log level forced by flags, if any.
    ///
    /// `None` defers to the configuration file.
    pub fn log_level_override(&self) -> Option<&str> {
        if self.quiet {
            Some("warn")
        } else if self.verbose {
            Some("debug")
        } else {
            self.log_level.as_deref()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["station"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::parse_from(["station", "run", "--simulate", "--no-connect", "-p", "9090"]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("Expected Run command");
        };
        assert!(args.simulate);
        assert!(args.no_connect);
        assert_eq!(args.port, Some(9090));
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["station", "-c", "/etc/station/station.yaml", "validate"]);
        assert_eq!(cli.config, PathBuf::from("/etc/station/station.yaml"));
    }

    #[test]
    fn test_probe_timeout() {
        let cli = Cli::parse_from(["station", "probe", "opc.tcp://plc:4840", "--timeout", "2s"]);
        let Some(Commands::Probe(args)) = cli.command else {
            panic!("Expected Probe command");
        };
        assert_eq!(args.endpoint, "opc.tcp://plc:4840");
        assert_eq!(args.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_watch_defaults() {
        let cli = Cli::parse_from(["station", "watch", "http://localhost:8080"]);
        let Some(Commands::Watch(args)) = cli.command else {
            panic!("Expected Watch command");
        };
        assert_eq!(args.delay, Duration::from_secs(3));
        assert_eq!(args.max_attempts, 5);
    }

    #[test]
    fn test_quiet_overrides_level() {
        let cli = Cli::parse_from(["station", "-q", "-l", "trace"]);
        assert_eq!(cli.log_level_override(), Some("warn"));

        let cli = Cli::parse_from(["station"]);
        assert_eq!(cli.log_level_override(), None);
    }
}
