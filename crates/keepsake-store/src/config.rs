//! Store configuration.

use std::path::{Path, PathBuf};

use keepsake_container::container::WriteMode;
use keepsake_container::model::SaveType;
use serde::{Deserialize, Serialize};

/// Per-type caps on how many saves are kept.
///
/// When a bounded type exceeds its cap, the saves with the oldest `updated`
/// timestamps are deleted. Manual saves are never capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Maximum number of [`SaveType::QuickSave`] saves. Default: 1.
    pub max_temporary: usize,
    /// Maximum number of [`SaveType::Recovery`] saves. Default: 5.
    pub max_recoveries: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_temporary: 1,
            max_recoveries: 5,
        }
    }
}

impl RetentionPolicy {
    /// The cap for `save_type`, or `None` if it is unbounded.
    pub fn limit_for(&self, save_type: SaveType) -> Option<usize> {
        match save_type {
            SaveType::Manual => None,
            SaveType::QuickSave => Some(self.max_temporary),
            SaveType::Recovery => Some(self.max_recoveries),
        }
    }

    /// Bounded types with their caps.
    pub fn bounded(&self) -> impl Iterator<Item = (SaveType, usize)> + '_ {
        SaveType::ALL
            .into_iter()
            .filter_map(|t| self.limit_for(t).map(|limit| (t, limit)))
    }
}

/// Configuration for a [`LocalFileStore`](crate::LocalFileStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `<id>.dat` files. Created on demand.
    pub storage_dir: PathBuf,
    /// Retention caps.
    pub retention: RetentionPolicy,
    /// Delete files with unreadable metadata during cleanup.
    pub force_delete: bool,
    /// How containers are written.
    pub write_mode: WriteMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("saves"),
            retention: RetentionPolicy::default(),
            force_delete: false,
            write_mode: WriteMode::Direct,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `storage_dir`.
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_force_delete(mut self, force_delete: bool) -> Self {
        self.force_delete = force_delete;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }
}
