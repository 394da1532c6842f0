//! Configuration error types.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which configuration file an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// `~/.twingraph/config.toml`
    Global,
    /// `.twingraph/config.toml` in the workspace
    Local,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {layer} config '{path}': {source}")]
    Read {
        layer: ConfigLayer,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single file is not valid TOML or does not match the settings schema
    #[error("failed to parse {layer} config '{path}': {source}")]
    Parse {
        layer: ConfigLayer,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Each file parsed on its own but the layered result does not
    #[error("merged configuration is invalid: {0}")]
    Merge(#[source] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Writing a config file or creating its directory failed
    #[error("failed to write config '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No home directory, so the global layer has nowhere to live
    #[error("could not determine home directory for the global config")]
    NoHomeDir,

    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn read(layer: ConfigLayer, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            layer,
            path: path.into(),
            source,
        }
    }

    pub fn parse(layer: ConfigLayer, path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Parse {
            layer,
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// The layer a file error belongs to, if any.
    pub fn layer(&self) -> Option<ConfigLayer> {
        match self {
            Self::Read { layer, .. } | Self::Parse { layer, .. } => Some(*layer),
            _ => None,
        }
    }
}
