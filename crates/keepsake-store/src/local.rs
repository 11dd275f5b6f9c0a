//! Directory-backed save store.
//!
//! [`LocalFileStore`] keeps each save in `<storage_dir>/<id>.dat`. Listing
//! reads every file's metadata concurrently; files whose metadata region is
//! malformed are reported as [`ListEntry::Unknown`] instead of failing the
//! listing. After a bounded save type is written, the oldest saves of that
//! type beyond its cap are deleted.
//!
//! There is no locking. A listing racing a delete may skip the deleted file
//! or observe it; a listing is a best-effort snapshot of the directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use keepsake_container::container::{write_container, ContainerReader};
use keepsake_container::model::{SaveMetadata, SaveRecord, SaveType};
use keepsake_container::ContainerError;
use tokio::task::JoinSet;

use crate::config::StoreConfig;
use crate::{Result, SaveStore, StoreError};

/// File extension of save containers.
pub const SAVE_EXTENSION: &str = "dat";

/// Upper bound on files open at once while listing.
pub const MAX_CONCURRENT_READS: usize = 32;

// ---------------------------------------------------------------------------
// Listing types
// ---------------------------------------------------------------------------

/// One `.dat` file found in the storage directory.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
    /// Metadata decoded successfully. `id` is the file stem.
    Known { id: String, metadata: SaveMetadata },
    /// The file exists but its metadata region is structurally invalid:
    /// the header is zero or points past the end of the file, or the region
    /// is not a JSON object.
    ///
    /// A file that could not be read at all, or whose metadata is a JSON
    /// object that does not match [`SaveMetadata`], is never reported as
    /// unknown, so forced cleanup never deletes it.
    Unknown { id: String },
}

impl ListEntry {
    /// The id derived from the file name.
    pub fn id(&self) -> &str {
        match self {
            ListEntry::Known { id, .. } | ListEntry::Unknown { id } => id,
        }
    }

    pub fn metadata(&self) -> Option<&SaveMetadata> {
        match self {
            ListEntry::Known { metadata, .. } => Some(metadata),
            ListEntry::Unknown { .. } => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ListEntry::Unknown { .. })
    }
}

/// A file cleanup could not delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub id: String,
    pub reason: String,
}

/// What a cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Unknown entries deleted because `force_delete` is set.
    pub purged: Vec<String>,
    /// Saves deleted for exceeding their type's retention cap.
    pub evicted: Vec<String>,
    /// Deletions that failed. The pass continues past each one.
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// Returns `true` if every attempted deletion succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn log(&self) {
        if !self.purged.is_empty() {
            tracing::info!(count = self.purged.len(), ids = ?self.purged, "purged unreadable saves");
        }
        if !self.evicted.is_empty() {
            tracing::debug!(count = self.evicted.len(), ids = ?self.evicted, "evicted saves over retention cap");
        }
        if !self.failures.is_empty() {
            tracing::warn!(
                count = self.failures.len(),
                failures = ?self.failures,
                "cleanup could not delete some saves"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// LocalFileStore
// ---------------------------------------------------------------------------

/// [`SaveStore`] over a directory of container files.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    config: StoreConfig,
}

impl LocalFileStore {
    /// Create a store, creating the storage directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn new(config: StoreConfig) -> Result<Self> {
        let store = Self { config };
        store.ensure_dir().await?;
        tracing::debug!(dir = %store.storage_dir().display(), "local save store ready");
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    /// Path of the container for `id`: `<storage_dir>/<id>.dat`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidId`] for ids that are empty, contain a
    /// path separator, or are `.` / `..`.
    pub fn resolve(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self
            .config
            .storage_dir
            .join(format!("{id}.{SAVE_EXTENSION}")))
    }

    /// Every `.dat` file in the directory, sorted by id.
    ///
    /// Metadata is read concurrently, at most [`MAX_CONCURRENT_READS`] files
    /// at a time. Files whose metadata region is structurally invalid become
    /// [`ListEntry::Unknown`]. Files that fail to read for any other reason
    /// (I/O errors, metadata that does not match the save schema, removal
    /// while the listing runs) are logged and left out, so forced cleanup
    /// never sees them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be read. A missing
    /// directory lists as empty.
    pub async fn raw_list(&self) -> Result<Vec<ListEntry>> {
        let dir = self.storage_dir();
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let mut entries = Vec::new();
        let mut reads = JoinSet::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(dir, e))?
        {
            let path = entry.path();
            let Some(id) = save_id_from_path(&path) else {
                continue;
            };
            if reads.len() >= MAX_CONCURRENT_READS {
                if let Some(joined) = reads.join_next().await {
                    collect_read(joined, &mut entries);
                }
            }
            reads.spawn(async move {
                let result = read_save_metadata(&path).await;
                (id, result)
            });
        }
        while let Some(joined) = reads.join_next().await {
            collect_read(joined, &mut entries);
        }

        entries.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(entries)
    }

    /// Run forced cleanup (when enabled) and retention for every bounded
    /// save type.
    ///
    /// Individual deletion failures are collected in the report rather than
    /// returned as errors.
    pub async fn cleanup(&self) -> Result<CleanupReport> {
        let entries = self.raw_list().await?;
        let mut report = CleanupReport::default();

        if self.config.force_delete {
            self.purge_unknown(&entries, &mut report).await;
        }
        for (save_type, limit) in self.config.retention.bounded() {
            self.evict_beyond(save_type, limit, &entries, &mut report)
                .await;
        }

        report.log();
        Ok(report)
    }

    /// Retention for a single save type.
    pub async fn cleanup_type(&self, save_type: SaveType) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        if let Some(limit) = self.config.retention.limit_for(save_type) {
            let entries = self.raw_list().await?;
            self.evict_beyond(save_type, limit, &entries, &mut report)
                .await;
        }
        report.log();
        Ok(report)
    }

    // -- internals ----------------------------------------------------------

    async fn ensure_dir(&self) -> Result<()> {
        let dir = self.storage_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::io(dir, e))
    }

    async fn purge_unknown(&self, entries: &[ListEntry], report: &mut CleanupReport) {
        for entry in entries.iter().filter(|e| e.is_unknown()) {
            match self.remove(entry.id()).await {
                Ok(()) => report.purged.push(entry.id().to_owned()),
                Err(e) => report.failures.push(CleanupFailure {
                    id: entry.id().to_owned(),
                    reason: e.to_string(),
                }),
            }
        }
    }

    /// Keep the `limit` most recently updated saves of `save_type`, delete
    /// the rest. Saves with equal `updated` keep their listing (id) order;
    /// which of them survives a cut is not part of the contract.
    async fn evict_beyond(
        &self,
        save_type: SaveType,
        limit: usize,
        entries: &[ListEntry],
        report: &mut CleanupReport,
    ) {
        let mut candidates: Vec<(&str, &SaveMetadata)> = entries
            .iter()
            .filter_map(|e| e.metadata().map(|m| (e.id(), m)))
            .filter(|(_, m)| m.save_type == save_type)
            .collect();
        if candidates.len() <= limit {
            return;
        }
        candidates.sort_by(|(_, a), (_, b)| b.updated.cmp(&a.updated));

        for (id, _) in candidates.into_iter().skip(limit) {
            match self.remove(id).await {
                Ok(()) => report.evicted.push(id.to_owned()),
                Err(e) => report.failures.push(CleanupFailure {
                    id: id.to_owned(),
                    reason: e.to_string(),
                }),
            }
        }
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let path = self.resolve(id)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    /// Open `id` for reading. `Ok(None)` if the file does not exist.
    async fn open(&self, id: &str) -> Result<Option<ContainerReader>> {
        let path = self.resolve(id)?;
        match ContainerReader::open(&path).await {
            Ok(reader) => Ok(Some(reader)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SaveStore for LocalFileStore {
    async fn get(&self, id: &str) -> Result<Option<SaveRecord>> {
        let Some(mut reader) = self.open(id).await? else {
            return Ok(None);
        };

        let metadata = match reader.read_metadata_as::<SaveMetadata>().await {
            Ok(metadata) => metadata,
            Err(e) if e.is_structural() => {
                tracing::warn!(id = %id, kind = ?e.kind(), error = %e, "save metadata unreadable");
                reader.close();
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record = match reader.read_content().await {
            Ok(payload) => SaveRecord {
                metadata,
                payload: Some(payload),
                content_error: None,
            },
            Err(e) if e.is_structural() => {
                tracing::warn!(id = %id, kind = ?e.kind(), error = %e, "save payload unreadable");
                SaveRecord {
                    metadata,
                    payload: None,
                    content_error: Some(e.kind()),
                }
            }
            Err(e) => return Err(e.into()),
        };
        reader.close();
        Ok(Some(record))
    }

    async fn metadata(&self, id: &str) -> Result<Option<SaveMetadata>> {
        let Some(mut reader) = self.open(id).await? else {
            return Ok(None);
        };
        let result = reader.read_metadata_as::<SaveMetadata>().await;
        reader.close();
        match result {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_structural() => {
                tracing::warn!(id = %id, kind = ?e.kind(), error = %e, "save metadata unreadable");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set(
        &self,
        id: &str,
        save_type: SaveType,
        mut metadata: SaveMetadata,
        payload: serde_json::Value,
    ) -> Result<()> {
        let path = self.resolve(id)?;
        if metadata.id != id || metadata.save_type != save_type {
            tracing::debug!(
                id = %id,
                metadata_id = %metadata.id,
                ?save_type,
                "metadata id/type overridden by set arguments"
            );
            metadata.id = id.to_owned();
            metadata.save_type = save_type;
        }

        self.ensure_dir().await?;
        write_container(&path, &metadata, &payload, self.config.write_mode).await?;

        if self.config.retention.limit_for(save_type).is_some() {
            self.cleanup_type(save_type).await?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SaveMetadata>> {
        self.cleanup().await?;
        Ok(self
            .raw_list()
            .await?
            .into_iter()
            .filter_map(|entry| match entry {
                ListEntry::Known { metadata, .. } => Some(metadata),
                ListEntry::Unknown { .. } => None,
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.remove(id).await?;
        tracing::debug!(id = %id, "save deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_id(id: &str) -> Result<()> {
    let reason = if id.is_empty() {
        "id is empty"
    } else if id.contains(['/', '\\']) {
        "id contains a path separator"
    } else if id == "." || id == ".." {
        "id is a relative path component"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidId {
        id: id.to_owned(),
        reason,
    })
}

/// The save id for a directory entry, if it is a `.dat` file with a usable
/// UTF-8 stem.
fn save_id_from_path(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(SAVE_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    validate_id(stem).ok()?;
    Some(stem.to_owned())
}

/// Outcome of reading one file's metadata for a listing.
#[derive(Debug)]
enum MetadataRead {
    Decoded(SaveMetadata),
    /// A JSON object that does not deserialize as [`SaveMetadata`].
    Mismatched(serde_json::Error),
}

async fn read_save_metadata(path: &Path) -> std::result::Result<MetadataRead, ContainerError> {
    let mut reader = ContainerReader::open(path).await?;
    let map = reader.read_metadata().await;
    reader.close();
    let decoded = serde_json::from_value::<SaveMetadata>(serde_json::Value::Object(map?));
    Ok(match decoded {
        Ok(metadata) => MetadataRead::Decoded(metadata),
        Err(e) => MetadataRead::Mismatched(e),
    })
}

/// Turn one finished metadata read into a listing entry, if it yields one.
fn classify(
    id: String,
    result: std::result::Result<MetadataRead, ContainerError>,
) -> Option<ListEntry> {
    match result {
        Ok(MetadataRead::Decoded(metadata)) => Some(ListEntry::Known { id, metadata }),
        Ok(MetadataRead::Mismatched(e)) => {
            tracing::warn!(id = %id, error = %e, "save metadata does not match schema, skipped");
            None
        }
        Err(e) if e.is_structural() => {
            tracing::warn!(id = %id, kind = ?e.kind(), error = %e, "unreadable save metadata");
            Some(ListEntry::Unknown { id })
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(id = %id, "save removed during listing");
            None
        }
        Err(e) => {
            tracing::warn!(id = %id, kind = ?e.kind(), error = %e, "save could not be read, skipped");
            None
        }
    }
}

type JoinedRead = std::result::Result<
    (String, std::result::Result<MetadataRead, ContainerError>),
    tokio::task::JoinError,
>;

fn collect_read(joined: JoinedRead, entries: &mut Vec<ListEntry>) {
    match joined {
        Ok((id, result)) => entries.extend(classify(id, result)),
        Err(e) => tracing::warn!(error = %e, "metadata read task failed"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
