// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # station-core
//!
//! Shared building blocks of the station tag-sync service:
//!
//! - **Types**: `TagValue`, `ValueType`, access rights
//! - **Registry**: the immutable tag table
//! - **Store**: the authoritative value snapshot
//! - **Channel**: fan-out of tag changes to listeners
//! - **Reconnect**: client-side push stream reconnection
//! - **Error**: the station error taxonomy
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use station_core::prelude::*;
//!
//! let registry = Arc::new(TagRegistry::new([
//!     TagDefinition::new("ARU", "ns=1;s=ARU", ValueType::Boolean, AccessRights::READ_WRITE),
//! ]).unwrap());
//! let store = Arc::new(TagValueStore::new(registry));
//! let channel = Arc::new(DistributionChannel::new(store.clone()));
//!
//! let (_guard, mut events) = channel.attach_channel(16);
//! store.set("ARU", TagValue::Boolean(true)).unwrap();
//! channel.publish("ARU", &TagValue::Boolean(true));
//!
//! assert!(events.try_recv().unwrap().is_initial());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod channel;
pub mod error;
pub mod reconnect;
pub mod registry;
pub mod store;
pub mod types;

pub use channel::{
    ChannelListener, ChannelStats, Delivery, DistributionChannel, ListenerGuard, ListenerId,
    TagEvent, TagListener,
};
pub use error::{ConnectionError, StationError, StationResult, WriteFailure};
pub use reconnect::{
    PushConnector, PushError, PushStream, ReconnectController, ReconnectPolicy, ReconnectState,
};
pub use registry::{TagDefinition, TagRegistry};
pub use store::{Snapshot, TagValueStore};
pub use types::{Access, AccessRights, TagValue, ValueRange, ValueType};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types.
pub mod prelude {
    pub use crate::channel::{
        ChannelListener, DistributionChannel, ListenerId, TagEvent, TagListener,
    };
    pub use crate::error::{ConnectionError, StationError, StationResult, WriteFailure};
    pub use crate::reconnect::{ReconnectController, ReconnectPolicy, ReconnectState};
    pub use crate::registry::{TagDefinition, TagRegistry};
    pub use crate::store::TagValueStore;
    pub use crate::types::{Access, AccessRights, TagValue, ValueType};
}
