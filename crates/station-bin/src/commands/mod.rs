// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod probe;
mod run;
mod validate;
mod version;
mod watch;

pub use probe::probe;
pub use run::run;
pub use validate::validate;
pub use version::version;
pub use watch::{SseConnector, watch};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the command selected on the command line.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::Probe(args) => probe::probe(&cli, args).await,
        Commands::Watch(args) => watch::watch(&cli, args).await,
    }
}
