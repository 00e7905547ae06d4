// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! The tag catalogue of the reference station and matching controller
//! state, so every suite starts from the same plant.
//!
//! | Tag        | Type    | Access     | Address           |
//! |------------|---------|------------|-------------------|
//! | `ARU`      | boolean | read/write | `ns=1;s=ARU`      |
//! | `niveau`   | int16   | read       | `ns=1;s=niveau`   |
//! | `consigne` | float   | read/write | `ns=1;s=consigne` |
//! | `reset`    | boolean | write      | `ns=1;s=reset`    |

use std::sync::Arc;
use std::time::Duration;

use station_config::{ConfigLoader, StationConfig};
use station_core::registry::{TagDefinition, TagRegistry};
use station_core::types::{AccessRights, ValueType};
use station_opcua::{FallbackPolicy, OpcUaValue, SessionConfig, SimulatorSettings};

use super::mocks::MockController;

/// Endpoint of the reference controller.
pub const ENDPOINT: &str = "opc.tcp://192.168.1.10:4840";

/// A second controller, for endpoint switches.
pub const OTHER_ENDPOINT: &str = "opc.tcp://192.168.1.11:4840";

/// Address of the `ARU` tag.
pub const ARU_ADDRESS: &str = "ns=1;s=ARU";

/// Address of the `niveau` tag.
pub const NIVEAU_ADDRESS: &str = "ns=1;s=niveau";

/// Address of the `consigne` tag.
pub const CONSIGNE_ADDRESS: &str = "ns=1;s=consigne";

// =============================================================================
// Tags
// =============================================================================

/// Tag definitions of the reference station.
pub struct TagFixtures;

impl TagFixtures {
    /// Emergency stop, boolean, read/write.
    pub fn aru() -> TagDefinition {
        TagDefinition::new("ARU", ARU_ADDRESS, ValueType::Boolean, AccessRights::READ_WRITE)
    }

    /// Tank level, int16 in 0..=100, read-only.
    pub fn niveau() -> TagDefinition {
        TagDefinition::new("niveau", NIVEAU_ADDRESS, ValueType::Int16, AccessRights::READ)
            .with_range(0.0, 100.0)
    }

    /// Dosing set point, float, read/write.
    pub fn consigne() -> TagDefinition {
        TagDefinition::new(
            "consigne",
            CONSIGNE_ADDRESS,
            ValueType::Float,
            AccessRights::READ_WRITE,
        )
        .with_range(0.0, 10.0)
    }

    /// Fault reset command, boolean, write-only.
    pub fn reset() -> TagDefinition {
        TagDefinition::new("reset", "ns=1;s=reset", ValueType::Boolean, AccessRights::WRITE)
    }

    /// Every tag of the station.
    pub fn station() -> Vec<TagDefinition> {
        vec![Self::aru(), Self::niveau(), Self::consigne(), Self::reset()]
    }

    /// Registry over [`TagFixtures::station`].
    pub fn registry() -> Arc<TagRegistry> {
        Arc::new(TagRegistry::new(Self::station()).expect("station registry is valid"))
    }

    /// The two-tag registry of the reference scenario.
    pub fn aru_niveau_registry() -> Arc<TagRegistry> {
        Arc::new(TagRegistry::new([Self::aru(), Self::niveau()]).expect("registry is valid"))
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Controller state matching [`TagFixtures`].
pub struct ControllerFixtures;

impl ControllerFixtures {
    /// A healthy plant: ARU off, level 42, set point 2.5.
    pub fn plant() -> Arc<MockController> {
        MockController::with_values([
            (ARU_ADDRESS, OpcUaValue::Boolean(false)),
            (NIVEAU_ADDRESS, OpcUaValue::Int16(42)),
            (CONSIGNE_ADDRESS, OpcUaValue::Float(2.5)),
        ])
    }
}

// =============================================================================
// Session
// =============================================================================

/// Session settings for tests.
pub struct SessionFixtures;

impl SessionFixtures {
    /// Real strategy, surfacing failures.
    pub fn surface() -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Real strategy, falling back to the simulator.
    pub fn simulate_on_failure() -> SessionConfig {
        SessionConfig {
            fallback: FallbackPolicy::Simulate,
            ..Self::surface()
        }
    }

    /// Simulator driving `niveau` and toggling `ARU`.
    pub fn simulator() -> SimulatorSettings {
        SimulatorSettings {
            level_tag: "niveau".to_string(),
            toggle_tags: vec!["ARU".to_string()],
            ..Default::default()
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration documents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// YAML configuration of the reference station.
    pub const STATION_YAML: &'static str = r#"
station:
  id: station-test
  name: Test Station
  environment: development

session:
  endpoint: opc.tcp://192.168.1.10:4840
  connect_timeout: 10s
  fallback: surface

tags:
  - name: ARU
    address: ns=1;s=ARU
    type: boolean
    access: [read, write]
  - name: niveau
    address: ns=1;s=niveau
    type: int16
    access: [read]
    range: { min: 0, max: 100 }
  - name: consigne
    address: ns=1;s=consigne
    type: float
    access: [read, write]

simulator:
  level_tag: niveau
  toggle_tags: [ARU]

api:
  port: 8080
  keep_alive: 15s
"#;

    /// Loader that ignores the process environment.
    pub fn loader() -> ConfigLoader {
        ConfigLoader::builder()
            .env_vars(Vec::<(String, String)>::new())
            .build()
    }

    /// Loader with a fixed environment.
    pub fn loader_with_env<const N: usize>(vars: [(&str, &str); N]) -> ConfigLoader {
        ConfigLoader::builder().env_vars(vars).build()
    }

    /// The parsed reference configuration.
    pub fn station() -> StationConfig {
        Self::loader()
            .load_from_str(Self::STATION_YAML, station_config::ConfigFormat::Yaml)
            .expect("station fixture is valid")
    }
}
