//! Error types for prmirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or committing the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error on commit.
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store file exists but does not parse.
    #[error("failed to parse record store at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The root configuration file does not exist.
    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the file it came from.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The merged settings don't fit the expected shape.
    #[error("invalid settings: {0}")]
    Invalid(#[from] serde_yaml::Error),

    /// `config-paths` held something other than strings.
    #[error("'config-paths' should only contain strings (in {path})")]
    BadIncludePath { path: PathBuf },

    /// A file reached itself through `config-paths`.
    #[error("config file {path} includes itself through 'config-paths'")]
    IncludeCycle { path: PathBuf },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
