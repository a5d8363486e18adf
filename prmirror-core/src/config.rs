//! Layered YAML configuration.
//!
//! # Lookup
//!
//! ```text
//! ~/.prmirror/
//!   config.yaml       (default location; `--config` overrides)
//! ```
//!
//! A config file may name further files under `config-paths` (a string or a
//! list). Each is resolved relative to the file that names it and merged on
//! top of what has been read so far, replacing top-level keys. A file may be
//! included more than once, but never from within its own include chain.
//!
//! Relative `data`, `website-data` and `event-log` paths resolve against the
//! directory of the root config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{config_io, ConfigError};
use crate::types::UnknownStatePolicy;

const INCLUDE_KEY: &str = "config-paths";
const MASK: &str = "********";

/// Effective settings after defaults, includes and path resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Directory holding the record store and the update lock.
    pub data: PathBuf,
    /// Organization whose repositories are mirrored.
    pub organization: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Directory receiving `pull-requests.json`; stdout when unset.
    pub website_data: Option<PathBuf>,
    /// SQLite database the webhook receiver appends events to.
    pub event_log: Option<PathBuf>,
    pub api_url: String,
    pub unknown_event_state: UnknownStatePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data: PathBuf::from("../update-data"),
            organization: "boostorg".to_string(),
            username: None,
            password: None,
            website_data: None,
            event_log: None,
            api_url: "https://api.github.com".to_string(),
            unknown_event_state: UnknownStatePolicy::Skip,
        }
    }
}

impl Settings {
    /// Copy suitable for display: a non-empty password is masked.
    pub fn safe(&self) -> Settings {
        let mut settings = self.clone();
        if settings.password.as_deref().is_some_and(|p| !p.is_empty()) {
            settings.password = Some(MASK.to_string());
        }
        settings
    }
}

// ---------------------------------------------------------------------------
// 1. Paths
// ---------------------------------------------------------------------------

/// `<home>/.prmirror/config.yaml` — pure, no I/O.
pub fn default_config_path_at(home: &Path) -> PathBuf {
    home.join(".prmirror").join("config.yaml")
}

/// `default_config_path_at` convenience wrapper.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(default_config_path_at(&home))
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load settings from `path`, following `config-paths` includes.
///
/// Returns `ConfigError::NotFound` if the root file is absent.
pub fn load_at(path: &Path) -> Result<Settings, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let defaults = match serde_yaml::to_value(Settings::default())? {
        Value::Mapping(m) => m,
        _ => Mapping::new(),
    };
    let merged = read_layer(path, defaults, &mut Vec::new())?;
    let mut settings: Settings = serde_yaml::from_value(Value::Mapping(merged))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    settings.data = resolve_path(base, &settings.data);
    settings.website_data = settings.website_data.map(|p| resolve_path(base, &p));
    settings.event_log = settings.event_log.map(|p| resolve_path(base, &p));
    Ok(settings)
}

/// Merge the file at `path` over `current`, then each of its includes in order.
///
/// `chain` holds the canonical paths of the files currently being read, so a
/// file that (indirectly) includes itself is reported instead of recursing.
fn read_layer(
    path: &Path,
    current: Mapping,
    chain: &mut Vec<PathBuf>,
) -> Result<Mapping, ConfigError> {
    let canonical = std::fs::canonicalize(path).map_err(|e| config_io(path, e))?;
    if chain.contains(&canonical) {
        return Err(ConfigError::IncludeCycle { path: canonical });
    }
    chain.push(canonical);
    let merged = merge_layer(path, current, chain)?;
    chain.pop();
    Ok(merged)
}

fn merge_layer(
    path: &Path,
    current: Mapping,
    chain: &mut Vec<PathBuf>,
) -> Result<Mapping, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| config_io(path, e))?;
    let value: Value = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut layer = match value {
        Value::Mapping(m) => m,
        // An empty file parses as null and contributes nothing.
        Value::Null => return Ok(current),
        _ => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                source: <serde_yaml::Error as serde::de::Error>::custom(
                    "top level must be a mapping",
                ),
            })
        }
    };

    let includes = layer.remove(INCLUDE_KEY);
    let mut merged = current;
    for (key, value) in layer {
        merged.insert(key, value);
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    for include in include_paths(path, includes)? {
        merged = read_layer(&resolve_path(dir, &include), merged, chain)?;
    }
    Ok(merged)
}

fn include_paths(path: &Path, includes: Option<Value>) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = match includes {
        None | Some(Value::Null) => return Ok(vec![]),
        Some(Value::String(s)) => return Ok(vec![PathBuf::from(s)]),
        Some(Value::Sequence(seq)) => seq,
        Some(_) => {
            return Err(ConfigError::BadIncludePath {
                path: path.to_path_buf(),
            })
        }
    };
    entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(s) => Ok(PathBuf::from(s)),
            _ => Err(ConfigError::BadIncludePath {
                path: path.to_path_buf(),
            }),
        })
        .collect()
}

/// Join relative paths onto `base` and drop trailing separators.
fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    // PathBuf normalizes trailing slashes away when rebuilt from components.
    joined.components().collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
