//! Corruption tests: damaged containers must come back as typed structural
//! errors, and damage to one region must not hide the other.

use std::path::{Path, PathBuf};

use keepsake_container::prelude::*;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn write_sample(dir: &Path, name: &str) -> (PathBuf, SaveMetadata, serde_json::Value) {
    let path = dir.join(format!("{name}.dat"));
    let meta = SaveMetadata::new(name, SaveType::QuickSave, 1_700_000_000_000);
    let payload = json!({
        "player": { "hp": 42, "pos": [1.5, -2.0] },
        "flags": ["met_the_owl", "opened_gate"],
    });
    write_container(&path, &meta, &payload, WriteMode::Direct)
        .await
        .unwrap();
    (path, meta, payload)
}

fn metadata_len(path: &Path) -> usize {
    let bytes = std::fs::read(path).unwrap();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
}

fn overwrite(path: &Path, offset: usize, patch: &[u8]) {
    let mut bytes = std::fs::read(path).unwrap();
    bytes[offset..offset + patch.len()].copy_from_slice(patch);
    std::fs::write(path, bytes).unwrap();
}

// ---------------------------------------------------------------------------
// Payload damage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn truncated_payload_keeps_metadata_readable() {
    let dir = tempfile::tempdir().unwrap();
    let (path, meta, _) = write_sample(dir.path(), "trunc").await;

    let boundary = HEADER_LEN + metadata_len(&path);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..boundary]).unwrap();

    let mut reader = ContainerReader::open(&path).await.unwrap();
    let read_meta: SaveMetadata = reader.read_metadata_as().await.unwrap();
    assert_eq!(read_meta, meta);

    let err = reader.read_content().await.unwrap_err();
    assert_eq!(err.kind(), ContainerErrorKind::InvalidContentSize);
}

#[tokio::test]
async fn partially_truncated_payload_is_invalid_content() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _, _) = write_sample(dir.path(), "half").await;

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let mut reader = ContainerReader::open(&path).await.unwrap();
    assert!(reader.read_metadata().await.is_ok());
    let err = reader.read_content().await.unwrap_err();
    assert_eq!(err.kind(), ContainerErrorKind::InvalidContent);
    assert!(err.is_structural());
}

#[tokio::test]
async fn garbled_payload_is_invalid_content() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _, _) = write_sample(dir.path(), "garbled").await;

    // 0xc1 is never used in MessagePack.
    let boundary = HEADER_LEN + metadata_len(&path);
    overwrite(&path, boundary, &[0xc1]);

    let mut reader = ContainerReader::open(&path).await.unwrap();
    assert!(reader.read_metadata().await.is_ok());
    let err = reader.read_content().await.unwrap_err();
    assert_eq!(err.kind(), ContainerErrorKind::InvalidContent);
}

// ---------------------------------------------------------------------------
// Metadata damage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_json_metadata_keeps_payload_readable() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _, payload) = write_sample(dir.path(), "badmeta").await;

    overwrite(&path, HEADER_LEN, b"\xff\xfe not json");

    let mut reader = ContainerReader::open(&path).await.unwrap();
    let err = reader.read_metadata().await.unwrap_err();
    assert_eq!(err.kind(), ContainerErrorKind::InvalidMetadata);
    assert_eq!(reader.read_content().await.unwrap(), payload);
}

#[tokio::test]
async fn json_array_metadata_is_invalid_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("array.dat");

    let meta = b"[1,2]";
    let mut bytes = (meta.len() as u32).to_be_bytes().to_vec();
    bytes.extend_from_slice(meta);
    bytes.extend_from_slice(&rmp_serde::to_vec_named(&json!({ "x": 1 })).unwrap());
    std::fs::write(&path, bytes).unwrap();

    let mut reader = ContainerReader::open(&path).await.unwrap();
    let err = reader.read_metadata().await.unwrap_err();
    assert_eq!(err.kind(), ContainerErrorKind::InvalidMetadata);
    assert_eq!(reader.read_content().await.unwrap(), json!({ "x": 1 }));
}

#[tokio::test]
async fn metadata_missing_required_fields_fails_typed_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.dat");
    write_container(&path, &json!({ "id": "partial" }), &json!({}), WriteMode::Direct)
        .await
        .unwrap();

    let mut reader = ContainerReader::open(&path).await.unwrap();
    assert!(reader.read_metadata().await.is_ok());
    let err = reader.read_metadata_as::<SaveMetadata>().await.unwrap_err();
    assert_eq!(err.kind(), ContainerErrorKind::InvalidMetadata);
}

// ---------------------------------------------------------------------------
// Header damage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn header_past_end_of_file_is_a_size_error_for_both_phases() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _, _) = write_sample(dir.path(), "header").await;

    let file_size = std::fs::metadata(&path).unwrap().len() as u32;
    overwrite(&path, 0, &(file_size + 1000).to_be_bytes());

    let mut reader = ContainerReader::open(&path).await.unwrap();
    let meta_err = reader.read_metadata().await.unwrap_err();
    assert_eq!(meta_err.kind(), ContainerErrorKind::InvalidMetadataSize);
    let content_err = reader.read_content().await.unwrap_err();
    assert_eq!(content_err.kind(), ContainerErrorKind::InvalidContentSize);
}

#[tokio::test]
async fn zero_header_is_invalid_metadata_size() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _, _) = write_sample(dir.path(), "zero").await;
    overwrite(&path, 0, &[0, 0, 0, 0]);

    let mut reader = ContainerReader::open(&path).await.unwrap();
    let err = reader.read_metadata().await.unwrap_err();
    assert_eq!(err.kind(), ContainerErrorKind::InvalidMetadataSize);
}

#[tokio::test]
async fn files_shorter_than_header_are_size_errors() {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in [("empty", &b""[..]), ("short", &b"\x00\x01"[..])] {
        let path = dir.path().join(format!("{name}.dat"));
        std::fs::write(&path, contents).unwrap();

        let mut reader = ContainerReader::open(&path).await.unwrap();
        assert_eq!(
            reader.read_metadata().await.unwrap_err().kind(),
            ContainerErrorKind::InvalidMetadataSize,
            "{name}"
        );
        assert_eq!(
            reader.read_content().await.unwrap_err().kind(),
            ContainerErrorKind::InvalidContentSize,
            "{name}"
        );
    }
}
