//! Backup inventory records and full/incremental classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of the backup inventory emitted by the remote info command.
///
/// Field names follow the wal-g `backup-list --json --detail` output; the
/// remaining fields of that output are ignored on decode. Records are never
/// mutated after parsing, only filtered into derived views.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BackupRecord {
    /// Backup artifact name.
    pub backup_name: String,
    /// Completion timestamp reported by the backup tool.
    pub time: DateTime<Utc>,
    /// Size before compression, in bytes.
    pub uncompressed_size: i64,
    /// Size after compression, in bytes.
    pub compressed_size: i64,
}

impl BackupRecord {
    /// Returns true when this record is a full backup.
    ///
    /// Incremental backups are named `<base>_<suffix>_<suffix>`, so any name
    /// with two or more underscores is a delta against an identified base
    /// and everything else stands alone.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.backup_name.matches('_').count() < 2
    }

    /// Compressed size in whole gigabytes, truncated.
    #[must_use]
    pub const fn compressed_gigabytes(&self) -> i64 {
        self.compressed_size >> 30
    }
}

/// Error raised when the inventory JSON cannot be decoded.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The payload is not a well-formed JSON array of inventory objects.
    /// The whole parse fails; no partial list is produced.
    #[error("malformed backup inventory: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decodes the inventory JSON array into typed records.
///
/// # Errors
///
/// Returns [`InventoryError::Malformed`] on any syntax or type mismatch.
pub fn parse_inventory(json: &str) -> Result<Vec<BackupRecord>, InventoryError> {
    Ok(serde_json::from_str(json)?)
}

/// Filters an inventory down to the full backups, preserving order.
#[must_use]
pub fn full_only(records: &[BackupRecord]) -> Vec<BackupRecord> {
    records
        .iter()
        .filter(|record| record.is_full())
        .cloned()
        .collect()
}
