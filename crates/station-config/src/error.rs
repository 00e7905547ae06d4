// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be parsed.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A field failed validation.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// Offending field, dotted.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file does not exist.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Two tags share a name.
    #[error("Duplicate tag name: {name}")]
    DuplicateTag {
        /// The duplicated name.
        name: String,
    },

    /// An override variable holds an unusable value.
    #[error("Invalid environment variable value for '{name}': {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// The file extension is not supported.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The extension.
        format: String,
    },

    /// Content could not be deserialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Deserializer message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file-not-found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates a duplicate tag error.
    pub fn duplicate_tag(name: impl Into<String>) -> Self {
        Self::DuplicateTag { name: name.into() }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "CONFIG_PARSE",
            Self::Validation { .. } => "CONFIG_VALIDATION",
            Self::Io { .. } => "CONFIG_IO",
            Self::FileNotFound { .. } => "CONFIG_NOT_FOUND",
            Self::DuplicateTag { .. } => "CONFIG_DUPLICATE_TAG",
            Self::InvalidEnvVar { .. } => "CONFIG_ENV_VAR",
            Self::UnsupportedFormat { .. } => "CONFIG_FORMAT",
            Self::Serialization { .. } => "CONFIG_SERIALIZATION",
        }
    }

    /// Returns `true` when the error points at the file contents rather than
    /// at the environment.
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::Validation { .. }
                | Self::DuplicateTag { .. }
                | Self::Serialization { .. }
        )
    }
}
