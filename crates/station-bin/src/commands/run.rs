// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command to start the station.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let mut builder = RuntimeBuilder::new()
        .config_path(&cli.config)
        .simulate(args.simulate)
        .connect_on_start(!args.no_connect);
    if let Some(port) = args.port {
        builder = builder.port(port);
    }

    builder.build()?.run().await
}
