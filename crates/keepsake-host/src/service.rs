//! Consumer-facing save operations.
//!
//! [`SaveService`] is what the IPC layer calls. It stamps metadata on the
//! way in, translates store results into [`GameData`] responses on the way
//! out, and reports every failure as an [`anyhow::Error`] with context so the
//! caller has a single error path to surface.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use keepsake_container::model::{SaveMetadata, SaveType};
use keepsake_container::ContainerErrorKind;
use keepsake_store::{LocalFileStore, SaveStore};
use serde::{Deserialize, Serialize};

use crate::config::HostConfig;

/// Source of `updated` timestamps, in milliseconds since the Unix epoch.
pub type Clock = fn() -> u64;

/// Wall-clock milliseconds since the Unix epoch.
pub fn system_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// GameData
// ---------------------------------------------------------------------------

/// Response to a load request.
///
/// `payload` is absent when the save's payload region is unreadable; `error`
/// then carries the reason so the UI can say why the save cannot be loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub metadata: SaveMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ContainerErrorKind>,
}

// ---------------------------------------------------------------------------
// SaveService
// ---------------------------------------------------------------------------

/// Save operations over any [`SaveStore`].
pub struct SaveService<S> {
    store: S,
    clock: Clock,
}

impl SaveService<LocalFileStore> {
    /// Open a service over a [`LocalFileStore`] built from `config`.
    pub async fn open(config: HostConfig) -> anyhow::Result<Self> {
        let dir = config.store.storage_dir.clone();
        let store = LocalFileStore::new(config.store)
            .await
            .with_context(|| format!("failed to open save directory '{}'", dir.display()))?;
        tracing::info!(dir = %dir.display(), "save service ready");
        Ok(Self::new(store))
    }
}

impl<S: SaveStore> SaveService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: system_clock_ms,
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist `payload` as save `id`, stamped with the current time.
    ///
    /// Returns the metadata that was written.
    pub async fn save_game_data(
        &self,
        payload: serde_json::Value,
        save_type: SaveType,
        id: &str,
        preview: Option<String>,
    ) -> anyhow::Result<SaveMetadata> {
        let mut metadata = SaveMetadata::new(id, save_type, (self.clock)());
        metadata.preview = preview;

        self.store
            .set(id, save_type, metadata.clone(), payload)
            .await
            .with_context(|| format!("failed to save game '{id}'"))?;
        tracing::debug!(id = %id, ?save_type, updated = metadata.updated, "game saved");
        Ok(metadata)
    }

    /// Load save `id`. `Ok(None)` if it does not exist or is unreadable.
    pub async fn read_game_data(&self, id: &str) -> anyhow::Result<Option<GameData>> {
        let record = self
            .store
            .get(id)
            .await
            .with_context(|| format!("failed to read game '{id}'"))?;
        Ok(record.map(|r| GameData {
            metadata: r.metadata,
            payload: r.payload,
            error: r.content_error,
        }))
    }

    /// Metadata of every readable save.
    pub async fn list_game_data(&self) -> anyhow::Result<Vec<SaveMetadata>> {
        self.store.list().await.context("failed to list saved games")
    }

    /// Delete save `id`.
    pub async fn delete_game_data(&self, id: &str) -> anyhow::Result<()> {
        self.store
            .delete(id)
            .await
            .with_context(|| format!("failed to delete game '{id}'"))
    }
}
