//! Container encoding, writing, and the two-phase reader.
//!
//! [`write_container`] serializes metadata to JSON and the payload to
//! MessagePack, prefixes a big-endian `u32` metadata length, and writes the
//! whole buffer in one operation.
//!
//! [`ContainerReader`] decodes the two regions independently:
//!
//! - [`read_metadata`](ContainerReader::read_metadata) only needs the header
//!   and the metadata region to be intact.
//! - [`read_content`](ContainerReader::read_content) re-reads the header on
//!   its own and only needs the payload region to be intact.
//!
//! Structural problems come back as the `Invalid*` variants of
//! [`ContainerError`]; nothing in this module panics on malformed input.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::ContainerError;

/// Size of the metadata length header in bytes.
pub const HEADER_LEN: usize = 4;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// How [`write_container`] puts bytes on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Overwrite the target file in place. A crash mid-write can leave a
    /// truncated container, which later reads report as a structural error.
    #[default]
    Direct,
    /// Write a temporary sibling file, flush it, then rename it over the
    /// target. Readers never observe a half-written container.
    Atomic,
}

/// Encode a container into a single byte buffer.
///
/// # Errors
///
/// Returns [`ContainerError::Encode`] if the metadata does not serialize to a
/// JSON object, is larger than `u32::MAX` bytes, or if the payload cannot be
/// encoded as MessagePack.
pub fn encode_container<M, P>(metadata: &M, payload: &P) -> Result<Vec<u8>, ContainerError>
where
    M: Serialize + ?Sized,
    P: Serialize + ?Sized,
{
    let meta_value = serde_json::to_value(metadata).map_err(|e| ContainerError::Encode {
        part: "metadata",
        details: e.to_string(),
    })?;
    if !meta_value.is_object() {
        return Err(ContainerError::Encode {
            part: "metadata",
            details: "metadata must serialize to a JSON object".to_owned(),
        });
    }
    let meta_bytes = serde_json::to_vec(&meta_value).map_err(|e| ContainerError::Encode {
        part: "metadata",
        details: e.to_string(),
    })?;
    let meta_len = u32::try_from(meta_bytes.len()).map_err(|_| ContainerError::Encode {
        part: "metadata",
        details: format!("metadata is {} bytes, limit is {}", meta_bytes.len(), u32::MAX),
    })?;

    let payload_bytes = rmp_serde::to_vec_named(payload).map_err(|e| ContainerError::Encode {
        part: "payload",
        details: e.to_string(),
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + meta_bytes.len() + payload_bytes.len());
    buf.extend_from_slice(&meta_len.to_be_bytes());
    buf.extend_from_slice(&meta_bytes);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode and write a container to `path`.
///
/// The parent directory must already exist.
///
/// # Errors
///
/// Returns [`ContainerError::Encode`] for unencodable input and
/// [`ContainerError::Io`] if the file cannot be written.
pub async fn write_container<M, P>(
    path: impl AsRef<Path>,
    metadata: &M,
    payload: &P,
    mode: WriteMode,
) -> Result<(), ContainerError>
where
    M: Serialize + ?Sized,
    P: Serialize + ?Sized,
{
    let path = path.as_ref();
    let bytes = encode_container(metadata, payload)?;

    match mode {
        WriteMode::Direct => tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| ContainerError::io(path, e))?,
        WriteMode::Atomic => write_atomic(path, &bytes).await?,
    }

    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        ?mode,
        "container written"
    );
    Ok(())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ContainerError> {
    let temp_path = temp_sibling(path);

    if let Err(e) = write_then_rename(&temp_path, path, bytes).await {
        if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
            tracing::debug!(
                path = %temp_path.display(),
                error = %cleanup,
                "failed to remove temporary container"
            );
        }
        return Err(ContainerError::io(path, e));
    }
    Ok(())
}

async fn write_then_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(temp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(temp_path, path).await
}

/// `<dir>/.<file name>.<pid>.<seq>.tmp`. The `.tmp` extension keeps it out of
/// `.dat` listings.
fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{file_name}.{}.{seq}.tmp", std::process::id()))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// An open container file.
///
/// Both read phases seek independently, so they may be called in any order
/// and either may fail without affecting the other. The file handle is
/// released by [`close`](Self::close) or when the reader is dropped.
#[derive(Debug)]
pub struct ContainerReader {
    path: PathBuf,
    file: File,
    file_size: u64,
}

impl ContainerReader {
    /// Open a container for reading.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] if the file cannot be opened or
    /// inspected (missing file, permission denied).
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|e| ContainerError::io(&path, e))?;
        let file_size = file
            .metadata()
            .await
            .map_err(|e| ContainerError::io(&path, e))?
            .len();
        Ok(Self {
            path,
            file,
            file_size,
        })
    }

    /// Path this reader was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file in bytes at open time.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Read and parse the metadata region as a JSON object.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::InvalidMetadataSize`] if the header is short, zero,
    ///   or declares more bytes than the file holds.
    /// - [`ContainerError::InvalidMetadata`] if the region is not a JSON object.
    /// - [`ContainerError::Io`] if reading fails.
    pub async fn read_metadata(
        &mut self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, ContainerError> {
        let bytes = self.read_metadata_bytes().await?;
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(other) => Err(ContainerError::InvalidMetadata {
                details: format!("expected a JSON object, found {}", json_type_name(&other)),
            }),
            Err(e) => Err(ContainerError::InvalidMetadata {
                details: e.to_string(),
            }),
        }
    }

    /// Read the metadata region and deserialize it into `T`.
    ///
    /// A region that parses as JSON but does not match `T` is reported as
    /// [`ContainerError::InvalidMetadata`].
    pub async fn read_metadata_as<T: DeserializeOwned>(&mut self) -> Result<T, ContainerError> {
        let map = self.read_metadata().await?;
        serde_json::from_value(serde_json::Value::Object(map)).map_err(|e| {
            ContainerError::InvalidMetadata {
                details: e.to_string(),
            }
        })
    }

    /// Read and decode the payload region.
    ///
    /// The metadata length is re-read from the header, so this works whether
    /// or not the metadata region itself is valid JSON.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::InvalidContentSize`] if no bytes follow the
    ///   metadata region.
    /// - [`ContainerError::InvalidContent`] if the bytes are not valid
    ///   MessagePack.
    /// - [`ContainerError::Io`] if reading fails.
    pub async fn read_content(&mut self) -> Result<serde_json::Value, ContainerError> {
        self.read_content_as().await
    }

    /// Read the payload region and decode it into `T`.
    pub async fn read_content_as<T: DeserializeOwned>(&mut self) -> Result<T, ContainerError> {
        let bytes = self.read_content_bytes().await?;
        rmp_serde::from_slice(&bytes).map_err(|e| ContainerError::InvalidContent {
            details: e.to_string(),
        })
    }

    /// Release the file handle.
    pub fn close(self) {
        drop(self);
    }

    // -- internals ----------------------------------------------------------

    /// Declared metadata length. A file too short to hold a header reads as 0.
    async fn read_header(&mut self) -> Result<u64, ContainerError> {
        if self.file_size < HEADER_LEN as u64 {
            return Ok(0);
        }
        let mut header = [0u8; HEADER_LEN];
        match self.read_exact_at(0, &mut header).await {
            Ok(()) => Ok(u64::from(u32::from_be_bytes(header))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(ContainerError::io(&self.path, e)),
        }
    }

    async fn read_metadata_bytes(&mut self) -> Result<Vec<u8>, ContainerError> {
        let declared = self.read_header().await?;
        let size_error = ContainerError::InvalidMetadataSize {
            declared,
            file_size: self.file_size,
        };
        if declared == 0 || HEADER_LEN as u64 + declared > self.file_size {
            return Err(size_error);
        }

        let mut buf = vec![0u8; declared as usize];
        match self.read_exact_at(HEADER_LEN as u64, &mut buf).await {
            Ok(()) => Ok(buf),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(size_error),
            Err(e) => Err(ContainerError::io(&self.path, e)),
        }
    }

    async fn read_content_bytes(&mut self) -> Result<Vec<u8>, ContainerError> {
        let metadata_size = self.read_header().await?;
        let content_size = self.file_size as i64 - HEADER_LEN as i64 - metadata_size as i64;
        let size_error = ContainerError::InvalidContentSize {
            content_size,
            metadata_size,
            file_size: self.file_size,
        };
        if content_size <= 0 {
            return Err(size_error);
        }

        let mut buf = vec![0u8; content_size as usize];
        match self
            .read_exact_at(HEADER_LEN as u64 + metadata_size, &mut buf)
            .await
        {
            Ok(()) => Ok(buf),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(size_error),
            Err(e) => Err(ContainerError::io(&self.path, e)),
        }
    }

    async fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.read_exact(buf).await?;
        Ok(())
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
