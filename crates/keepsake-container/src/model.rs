//! Save value types shared by the codec and every store backend.
//!
//! [`SaveMetadata`] is the small JSON record stored in a container's
//! metadata region. [`SaveRecord`] is what a store hands back on load: the
//! metadata plus the payload, when the payload region is intact.

use serde::{Deserialize, Serialize};

use crate::ContainerErrorKind;

// ---------------------------------------------------------------------------
// SaveType
// ---------------------------------------------------------------------------

/// The kind of save slot. Serialized as an integer (`0`, `1`, `2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SaveType {
    /// Player-initiated save. Never evicted automatically.
    Manual,
    /// Quick-save slot, bounded by the temporary retention limit.
    QuickSave,
    /// Automatic recovery save, bounded by the recovery retention limit.
    Recovery,
}

impl SaveType {
    /// All save types, in wire order.
    pub const ALL: [SaveType; 3] = [SaveType::Manual, SaveType::QuickSave, SaveType::Recovery];
}

impl From<SaveType> for u8 {
    fn from(value: SaveType) -> Self {
        match value {
            SaveType::Manual => 0,
            SaveType::QuickSave => 1,
            SaveType::Recovery => 2,
        }
    }
}

impl TryFrom<u8> for SaveType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SaveType::Manual),
            1 => Ok(SaveType::QuickSave),
            2 => Ok(SaveType::Recovery),
            other => Err(format!("unknown save type {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// SaveMetadata
// ---------------------------------------------------------------------------

/// Descriptive record stored in the metadata region of a container.
///
/// Fields other than the known ones are kept in [`extra`](Self::extra) and
/// written back unchanged, so callers may attach their own keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// Stable key of the save. Also the container's file stem.
    pub id: String,
    /// Slot kind.
    #[serde(rename = "type")]
    pub save_type: SaveType,
    /// Last write time, milliseconds since the Unix epoch.
    pub updated: u64,
    /// Optional preview (usually an encoded thumbnail).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Any additional caller-provided fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SaveMetadata {
    /// Metadata with no preview and no extra fields.
    pub fn new(id: impl Into<String>, save_type: SaveType, updated: u64) -> Self {
        Self {
            id: id.into(),
            save_type,
            updated,
            preview: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Builder-style setter for the preview.
    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }
}

// ---------------------------------------------------------------------------
// SaveRecord
// ---------------------------------------------------------------------------

/// A save as returned by a store.
///
/// `payload` is `None` when the metadata was readable but the payload region
/// was not; `content_error` then says why. Such a record is still a real
/// save (it shows up in listings) but cannot be loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub metadata: SaveMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_error: Option<ContainerErrorKind>,
}

impl SaveRecord {
    /// Returns `true` if the payload was decoded.
    pub fn is_loadable(&self) -> bool {
        self.payload.is_some()
    }
}
