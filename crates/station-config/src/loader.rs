// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file; the extension selects YAML, TOML or JSON
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders
//! 3. Deserialize into [`StationConfig`]
//! 4. Apply `STATION_*` overrides
//! 5. Validate
//!
//! # Environment Overrides
//!
//! ```text
//! STATION_ENDPOINT=opc.tcp://192.168.1.10:4840
//! STATION_ENVIRONMENT=development
//! STATION_SIMULATE=true
//! STATION_API_PORT=9090
//! STATION_LOG_LEVEL=debug
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Environment, LogLevel, StationConfig};

/// Default prefix of override variables.
pub const DEFAULT_ENV_PREFIX: &str = "STATION";

// =============================================================================
// EnvSource
// =============================================================================

/// Where environment lookups go.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The process environment.
    #[default]
    Process,
    /// A fixed set of variables.
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    fn get(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => env::var(name).ok(),
            Self::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`StationConfig`] from files or strings.
///
/// ```no_run
/// use station_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("station.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
    env: EnvSource,
}

impl ConfigLoader {
    /// Creates a loader reading the process environment.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            env: EnvSource::Process,
        }
    }

    /// Creates a builder.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::default()
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads and validates a configuration file.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<StationConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let config = self.load_from_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        debug!(
            station = %config.station.id,
            environment = %config.station.environment,
            tags = config.tags.len(),
            strategy = %config.session.strategy,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses, overrides and validates configuration content.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<StationConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: StationConfig = parse_str(&content, format)?;
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Replaces `${VAR}` and `${VAR:default}` placeholders.
    ///
    /// An unset variable without a default is left as written.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                result.push_str(&rest[start..]);
                return result;
            };

            let body = &after[..end];
            let (name, default) = match body.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (body, None),
            };
            match (self.env.get(name), default) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!(variable = %name, "Environment variable not set");
                    result.push_str(&rest[start..start + 2 + end + 1]);
                }
            }
            rest = &after[end + 1..];
        }
        result.push_str(rest);
        result
    }

    fn var(&self, suffix: &str) -> (String, Option<String>) {
        let name = format!("{}_{}", self.env_prefix, suffix);
        let value = self.env.get(&name);
        (name, value)
    }

    fn apply_env_overrides(&self, config: &mut StationConfig) -> ConfigResult<()> {
        if let (name, Some(value)) = self.var("ENVIRONMENT") {
            config.station.environment = value
                .parse::<Environment>()
                .map_err(|message| ConfigError::invalid_env_var(name, message))?;
        }

        if let (_, Some(value)) = self.var("ENDPOINT") {
            config.session.endpoint = Some(value);
        }

        if let (name, Some(value)) = self.var("API_PORT") {
            config.api.port = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected a port number"))?;
        }

        if let (name, Some(value)) = self.var("LOG_LEVEL") {
            config.logging.level = LogLevel::parse(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(name, "expected a log level"))?;
        }

        if let (_, Some(value)) = self.var("SIMULATE") {
            if parse_bool(&value) {
                config.enable_simulation()?;
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for [`ConfigLoader`].
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    env: Option<EnvSource>,
}

impl ConfigLoaderBuilder {
    /// Sets the override prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Reads variables from a fixed map instead of the process.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(EnvSource::Fixed(
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ));
        self
    }

    /// Builds the loader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(enabled) = self.resolve_env_vars {
            loader.resolve_env_vars = enabled;
        }
        if let Some(env) = self.env {
            loader.env = env;
        }
        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML.
    Yaml,
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Yaml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::serialization(e.to_string())),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

/// Loads a configuration file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<StationConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use station_opcua::types::SessionStrategy;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
station:
  id: test-station
  environment: development

session:
  endpoint: ${PLC_ENDPOINT:opc.tcp://localhost:4840}
  connect_timeout: 10s

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
"#;

    fn isolated() -> ConfigLoader {
        ConfigLoader::builder()
            .env_vars(Vec::<(String, String)>::new())
            .build()
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = isolated().load(file.path()).unwrap();
        assert_eq!(config.station.id, "test-station");
        assert_eq!(config.session.endpoint.as_deref(), Some("opc.tcp://localhost:4840"));
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.tags[1].range.unwrap().max, 100.0);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[station]
id = "toml-station"

[[tags]]
name = "ARU"
address = "ns=1;s=ARU"
type = "boolean"
access = ["read", "write"]
"#;
        let config = isolated().load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.station.id, "toml-station");
        assert!(config.tags[0].access.can_write());
    }

    #[test]
    fn test_placeholder_uses_environment() {
        let loader = ConfigLoader::builder()
            .env_vars([("PLC_ENDPOINT", "opc.tcp://10.0.0.5:4840")])
            .build();
        let config = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.session.endpoint.as_deref(), Some("opc.tcp://10.0.0.5:4840"));
    }

    #[test]
    fn test_unresolved_placeholder_kept() {
        let loader = isolated();
        assert_eq!(loader.resolve_env_placeholders("a: ${MISSING}"), "a: ${MISSING}");
        assert_eq!(loader.resolve_env_placeholders("a: ${MISSING:x}"), "a: x");
        assert_eq!(loader.resolve_env_placeholders("a: ${open"), "a: ${open");
    }

    #[test]
    fn test_env_overrides() {
        let loader = ConfigLoader::builder()
            .env_vars([
                ("STATION_API_PORT", "9090"),
                ("STATION_LOG_LEVEL", "debug"),
                ("STATION_SIMULATE", "true"),
            ])
            .build();
        let config = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.session.strategy, SessionStrategy::Simulated);
    }

    #[test]
    fn test_simulate_override_refused_in_production() {
        let loader = ConfigLoader::builder()
            .env_vars([("STATION_ENVIRONMENT", "production"), ("STATION_SIMULATE", "1")])
            .build();
        let err = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_invalid_port_override() {
        let loader = ConfigLoader::builder()
            .env_vars([("STATION_API_PORT", "eighty")])
            .build();
        let err = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "STATION_API_PORT"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = format!("{YAML}\nextra: true\n");
        assert!(isolated().load_from_str(&yaml, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("a.txt")).is_err());
    }

    #[test]
    fn test_file_not_found() {
        let result = isolated().load("/nonexistent/station.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
