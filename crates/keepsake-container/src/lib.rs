//! Keepsake Container -- on-disk save file format and save value types.
//!
//! Every save is stored as one self-describing container file:
//!
//! ```text
//! offset 0..4     : u32 big-endian = M (metadata length in bytes)
//! offset 4..4+M   : UTF-8 JSON object (metadata)
//! offset 4+M..EOF : MessagePack payload
//! ```
//!
//! Metadata and payload are decoded independently, so a save whose payload
//! is truncated or garbled can still be listed from its metadata.
//!
//! # Quick Start
//!
//! ```
//! use keepsake_container::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let dir = std::env::temp_dir().join("keepsake-doc-quickstart");
//! tokio::fs::create_dir_all(&dir).await.unwrap();
//! let path = dir.join("slot.dat");
//!
//! let metadata = SaveMetadata::new("slot", SaveType::Manual, 100);
//! let payload = serde_json::json!({ "x": 1 });
//! write_container(&path, &metadata, &payload, WriteMode::Direct).await.unwrap();
//!
//! let mut reader = ContainerReader::open(&path).await.unwrap();
//! let read_back: SaveMetadata = reader.read_metadata_as().await.unwrap();
//! assert_eq!(read_back, metadata);
//! assert_eq!(reader.read_content().await.unwrap(), payload);
//! reader.close();
//! # });
//! ```

#![deny(unsafe_code)]

pub mod container;
pub mod model;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while writing or reading a save container.
///
/// [`Io`](ContainerError::Io) is the fatal class: the file could not be
/// opened, read, or written at all. The four `Invalid*` variants are the
/// structural class: the file exists but one of its regions is malformed.
/// Callers match on [`kind`](ContainerError::kind) to tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The underlying file operation failed.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header is missing, zero, or points past the end of the file.
    #[error("invalid metadata size {declared} (file is {file_size} bytes)")]
    InvalidMetadataSize { declared: u64, file_size: u64 },

    /// The metadata region is not a valid JSON object.
    #[error("invalid metadata: {details}")]
    InvalidMetadata { details: String },

    /// No bytes remain after the metadata region.
    #[error("invalid content size {content_size} (metadata {metadata_size} bytes, file {file_size} bytes)")]
    InvalidContentSize {
        content_size: i64,
        metadata_size: u64,
        file_size: u64,
    },

    /// The payload region could not be decoded.
    #[error("invalid content: {details}")]
    InvalidContent { details: String },

    /// Metadata or payload could not be encoded for writing.
    #[error("failed to encode {part}: {details}")]
    Encode { part: &'static str, details: String },
}

/// Discriminant of a [`ContainerError`], suitable for sending across a
/// process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerErrorKind {
    Io,
    InvalidMetadataSize,
    InvalidMetadata,
    InvalidContentSize,
    InvalidContent,
    Encode,
}

impl ContainerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ContainerErrorKind {
        match self {
            Self::Io { .. } => ContainerErrorKind::Io,
            Self::InvalidMetadataSize { .. } => ContainerErrorKind::InvalidMetadataSize,
            Self::InvalidMetadata { .. } => ContainerErrorKind::InvalidMetadata,
            Self::InvalidContentSize { .. } => ContainerErrorKind::InvalidContentSize,
            Self::InvalidContent { .. } => ContainerErrorKind::InvalidContent,
            Self::Encode { .. } => ContainerErrorKind::Encode,
        }
    }

    /// Returns `true` for errors describing a malformed file region rather
    /// than a failed file operation.
    pub fn is_structural(&self) -> bool {
        self.kind().is_structural()
    }

    /// Returns `true` if the file did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl ContainerErrorKind {
    /// Returns `true` for the four structural kinds.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::InvalidMetadataSize
                | Self::InvalidMetadata
                | Self::InvalidContentSize
                | Self::InvalidContent
        )
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::container::{
        encode_container, write_container, ContainerReader, WriteMode, HEADER_LEN,
    };
    pub use crate::model::{SaveMetadata, SaveRecord, SaveType};
    pub use crate::{ContainerError, ContainerErrorKind};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
