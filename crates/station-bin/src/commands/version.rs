// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("station - water treatment station tag synchronization");
    println!();
    println!("Version Information:");
    println!("  station-bin:    {}", crate::VERSION);
    println!("  station-core:   {}", station_core::VERSION);
    println!("  station-opcua:  {}", station_opcua::VERSION);
    println!("  station-config: {}", station_config::VERSION);
    println!("  station-api:    {}", station_api::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2024");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  OPC UA transport: {}",
        if cfg!(feature = "real-transport") { "enabled" } else { "disabled" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
