//! Keepsake Store -- save storage contract and the local file backend.
//!
//! [`SaveStore`] is the seam callers depend on. [`LocalFileStore`] is the
//! backend that keeps one container file per save in a directory, enforces
//! the per-type [`RetentionPolicy`], and tolerates corrupt files.
//!
//! # Modules
//!
//! - [`config`]: [`StoreConfig`] and [`RetentionPolicy`].
//! - [`local`]: [`LocalFileStore`], listing entries, and cleanup reports.
//!
//! # Example
//!
//! ```
//! use keepsake_store::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let dir = std::env::temp_dir().join("keepsake-store-doc");
//! let store = LocalFileStore::new(StoreConfig::new(&dir)).await.unwrap();
//!
//! let meta = SaveMetadata::new("s1", SaveType::Manual, 100);
//! store.set("s1", SaveType::Manual, meta.clone(), serde_json::json!({ "x": 1 })).await.unwrap();
//!
//! let record = store.get("s1").await.unwrap().unwrap();
//! assert_eq!(record.metadata, meta);
//!
//! store.delete("s1").await.unwrap();
//! assert!(store.get("s1").await.unwrap().is_none());
//! # });
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use keepsake_container::model::{SaveMetadata, SaveRecord, SaveType};
use keepsake_container::ContainerError;

pub use config::{RetentionPolicy, StoreConfig};
pub use local::{CleanupFailure, CleanupReport, ListEntry, LocalFileStore};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation on the store failed.
    #[error("store I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing or reading a container failed.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// The save id cannot be mapped to a file inside the storage directory.
    #[error("invalid save id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// SaveStore
// ---------------------------------------------------------------------------

/// Operations every save backend provides.
///
/// Implementations must be usable behind `dyn SaveStore`.
#[async_trait]
pub trait SaveStore: Send + Sync {
    /// Load a save. `Ok(None)` if it does not exist or its metadata is
    /// unreadable. A save whose payload is unreadable comes back with
    /// `payload: None`.
    async fn get(&self, id: &str) -> Result<Option<SaveRecord>>;

    /// Load only the metadata of a save.
    async fn metadata(&self, id: &str) -> Result<Option<SaveMetadata>>;

    /// Create or overwrite a save.
    async fn set(
        &self,
        id: &str,
        save_type: SaveType,
        metadata: SaveMetadata,
        payload: serde_json::Value,
    ) -> Result<()>;

    /// Metadata of every readable save.
    async fn list(&self) -> Result<Vec<SaveMetadata>>;

    /// Remove a save. Fails if it does not exist or cannot be removed.
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl<T: SaveStore + ?Sized> SaveStore for std::sync::Arc<T> {
    async fn get(&self, id: &str) -> Result<Option<SaveRecord>> {
        (**self).get(id).await
    }

    async fn metadata(&self, id: &str) -> Result<Option<SaveMetadata>> {
        (**self).metadata(id).await
    }

    async fn set(
        &self,
        id: &str,
        save_type: SaveType,
        metadata: SaveMetadata,
        payload: serde_json::Value,
    ) -> Result<()> {
        (**self).set(id, save_type, metadata, payload).await
    }

    async fn list(&self) -> Result<Vec<SaveMetadata>> {
        (**self).list().await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id).await
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{RetentionPolicy, StoreConfig};
    pub use crate::local::{CleanupFailure, CleanupReport, ListEntry, LocalFileStore};
    pub use crate::{SaveStore, StoreError};
    pub use keepsake_container::container::WriteMode;
    pub use keepsake_container::model::{SaveMetadata, SaveRecord, SaveType};
    pub use keepsake_container::ContainerErrorKind;
}
