// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `probe` command.

use std::sync::Arc;

use station_config::{ConfigLoader, StationConfig};
use station_core::channel::DistributionChannel;
use station_core::registry::TagRegistry;
use station_core::store::TagValueStore;
use station_opcua::SessionManager;

use crate::cli::{Cli, ProbeArgs};
use crate::error::{BinError, BinResult};

/// Executes the `probe` command.
///
/// Session settings come from the configuration file when one exists.
pub async fn probe(cli: &Cli, args: ProbeArgs) -> BinResult<()> {
    let mut config = if cli.config.exists() {
        ConfigLoader::new().load(&cli.config)?
    } else {
        StationConfig::default()
    };
    config.session.connect_timeout = args.timeout;

    let store = Arc::new(TagValueStore::new(Arc::new(TagRegistry::new([])?)));
    let channel = Arc::new(DistributionChannel::new(store.clone()));
    let session = SessionManager::builder(store, channel)
        .config(config.session)
        .build();

    match session.probe(&args.endpoint).await {
        Ok(()) => {
            println!("✓ {} is reachable", args.endpoint);
            Ok(())
        }
        Err(e) => {
            println!("✗ {}: {e}", args.endpoint);
            Err(BinError::connection(e.to_string()))
        }
    }
}
