//! Host configuration loaded from the process environment.
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `KEEPSAKE_STORAGE_DIR` | `storage_dir` | `saves` |
//! | `KEEPSAKE_MAX_RECOVERIES` | `retention.max_recoveries` | `5` |
//! | `KEEPSAKE_MAX_TEMPORARY` | `retention.max_temporary` | `1` |
//! | `KEEPSAKE_FORCE_DELETE` | `force_delete` | `false` |
//! | `KEEPSAKE_ATOMIC_WRITES` | `write_mode` | `false` (direct) |

use std::path::PathBuf;
use std::str::FromStr;

use keepsake_container::container::WriteMode;
use keepsake_store::StoreConfig;

pub const STORAGE_DIR_VAR: &str = "KEEPSAKE_STORAGE_DIR";
pub const MAX_RECOVERIES_VAR: &str = "KEEPSAKE_MAX_RECOVERIES";
pub const MAX_TEMPORARY_VAR: &str = "KEEPSAKE_MAX_TEMPORARY";
pub const FORCE_DELETE_VAR: &str = "KEEPSAKE_FORCE_DELETE";
pub const ATOMIC_WRITES_VAR: &str = "KEEPSAKE_ATOMIC_WRITES";

/// A configuration variable held a value that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid value '{value}' for {var}: expected {expected}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Store settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostConfig {
    pub store: StoreConfig,
}

impl HostConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`. Unset variables keep their
    /// defaults; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut store = StoreConfig::default();

        if let Some(dir) = get(STORAGE_DIR_VAR) {
            store.storage_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get(MAX_RECOVERIES_VAR) {
            store.retention.max_recoveries = parse_count(MAX_RECOVERIES_VAR, &raw)?;
        }
        if let Some(raw) = get(MAX_TEMPORARY_VAR) {
            store.retention.max_temporary = parse_count(MAX_TEMPORARY_VAR, &raw)?;
        }
        if let Some(raw) = get(FORCE_DELETE_VAR) {
            store.force_delete = parse_flag(FORCE_DELETE_VAR, &raw)?;
        }
        if let Some(raw) = get(ATOMIC_WRITES_VAR) {
            store.write_mode = if parse_flag(ATOMIC_WRITES_VAR, &raw)? {
                WriteMode::Atomic
            } else {
                WriteMode::Direct
            };
        }

        Ok(Self { store })
    }
}

fn parse_count(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    usize::from_str(raw.trim()).map_err(|_| ConfigError {
        var,
        value: raw.to_owned(),
        expected: "a non-negative integer",
    })
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            var,
            value: raw.to_owned(),
            expected: "a boolean (true/false/1/0)",
        }),
    }
}
