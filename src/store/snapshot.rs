//! Snapshot file format
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "checksum": "crc32:deadbeef",
//!   "body": { "tables": { "course": [ { "id": 1, ... } ] }, "sequences": { "course": 1 } }
//! }
//! ```
//!
//! The checksum covers the compact JSON encoding of `body`. Writes go to a
//! temporary sibling file that is fsynced and then renamed over the target,
//! so a crash never leaves a half-written snapshot behind.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::checksum::{compute_checksum, format_checksum, verify_checksum};
use super::database::Row;
use super::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event};

pub const FORMAT_VERSION: u8 = 1;

/// Snapshot contents: every row (with `id`) and the last id per table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBody {
    pub tables: BTreeMap<String, Vec<Row>>,
    pub sequences: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u8,
    checksum: String,
    body: Value,
}

/// Writes `body` to `path` atomically.
pub fn write_snapshot(path: &Path, body: &SnapshotBody) -> StoreResult<()> {
    let body = serde_json::to_value(body).map_err(|e| StoreError::Io(e.to_string()))?;
    let encoded = serde_json::to_vec(&body).map_err(|e| StoreError::Io(e.to_string()))?;

    let file = SnapshotFile {
        format_version: FORMAT_VERSION,
        checksum: format_checksum(compute_checksum(&encoded)),
        body,
    };
    let contents = serde_json::to_vec_pretty(&file).map_err(|e| StoreError::Io(e.to_string()))?;

    let tmp = temp_path(path);
    {
        let mut out = File::create(&tmp)?;
        out.write_all(&contents)?;
        out.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    Ok(())
}

/// Reads and verifies a snapshot file.
pub fn read_snapshot(path: &Path) -> StoreResult<SnapshotBody> {
    let contents = fs::read(path)?;

    let file: SnapshotFile = serde_json::from_slice(&contents)
        .map_err(|e| corrupted(path, format!("unreadable snapshot: {}", e)))?;

    if file.format_version != FORMAT_VERSION {
        return Err(corrupted(
            path,
            format!("unsupported format version {}", file.format_version),
        ));
    }

    let encoded = serde_json::to_vec(&file.body).map_err(|e| StoreError::Io(e.to_string()))?;
    if !verify_checksum(&encoded, &file.checksum) {
        return Err(corrupted(path, "checksum mismatch".to_string()));
    }

    serde_json::from_value(file.body)
        .map_err(|e| corrupted(path, format!("malformed snapshot body: {}", e)))
}

fn corrupted(path: &Path, reason: String) -> StoreError {
    log_event_with_fields(
        Event::SnapshotCorrupted,
        &[("path", &path.display().to_string()), ("reason", &reason)],
    );
    StoreError::Corrupted(reason)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
