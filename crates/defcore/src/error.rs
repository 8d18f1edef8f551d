use crate::Kind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoaderError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoaderError::Read {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort startup before the application becomes ready
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported location scheme '{scheme}' in '{location}'")]
    UnsupportedScheme { scheme: String, location: String },

    #[error("Definition root does not exist: {0}")]
    MissingRoot(String),

    #[error("No {filter} definitions found under {root}")]
    NoDefinitions { root: String, filter: String },

    #[error("Plugins cannot be loaded from embedded bundle root {0}")]
    EmbeddedPlugins(String),

    #[error("No embedded asset bundle is available for {0}")]
    NoBundle(String),

    #[error("Unknown run mode: {0}")]
    InvalidMode(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("Failed to parse {kind} definition {id}: {reason}")]
    Parse {
        kind: Kind,
        id: String,
        reason: String,
    },

    #[error("Invalid {kind} definition {id}: {reason}")]
    Invalid {
        kind: Kind,
        id: String,
        reason: String,
    },

    #[error("Plugin {id} could not be loaded from {path}: {reason}")]
    Plugin {
        id: String,
        path: PathBuf,
        reason: String,
    },

    #[error("{kind} registry does not load plugins")]
    Unsupported { kind: Kind },
}
