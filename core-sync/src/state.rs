//! # Sync State
//!
//! Durable per-file upload lifecycle.
//!
//! ## State Machine
//!
//! ```text
//!            scan finds new file
//!                   │
//!                   ▼
//!               Pending ──────► Uploading ──► Synced
//!                 ▲                 │
//!                 │                 ▼
//!                 └──── retry ──── Failed ──(threshold)──► Error
//!                 │                                          │
//!                 └──────────── user reset ──────────────────┘
//! ```
//!
//! `Pending` and `Failed` are picked up by the next upload batch. `Synced`
//! and `Error` are terminal for the upload worker.

use crate::media::LocalMediaFile;
use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};

// ============================================================================
// Status
// ============================================================================

/// Upload status of a sync record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Queued, never attempted or reset for another attempt
    Pending,
    /// An upload attempt owns this record
    Uploading,
    /// Stored on the server
    Synced,
    /// The last attempt failed; eligible for the next batch
    Failed,
    /// Gave up after repeated failures; needs a user reset
    Error,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 5] = [
        SyncStatus::Pending,
        SyncStatus::Uploading,
        SyncStatus::Synced,
        SyncStatus::Failed,
        SyncStatus::Error,
    ];

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Uploading => "uploading",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
            SyncStatus::Error => "error",
        }
    }

    /// Whether the upload worker will pick the record up
    pub fn is_uploadable(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Failed)
    }

    /// Whether the worker never leaves this status on its own
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Synced | SyncStatus::Error)
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "uploading" => Ok(SyncStatus::Uploading),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            "error" => Ok(SyncStatus::Error),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Record
// ============================================================================

/// One row of the sync state table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateRecord {
    /// Generated id; `0` until the record is first stored
    pub id: i64,
    /// Unique key
    pub local_path: String,
    pub file_name: String,
    pub server_path: String,
    pub file_size: u64,
    pub fingerprint: String,
    pub mime_type: String,
    /// Capture time in milliseconds since the Unix epoch
    pub date_taken: i64,
    pub is_video: bool,
    pub status: SyncStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub server_file_id: Option<i64>,
    pub server_etag: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SyncStateRecord {
    /// A fresh `Pending` record for a newly discovered file
    pub fn pending(file: &LocalMediaFile, repo: &str, now_ms: i64) -> Self {
        Self {
            id: 0,
            local_path: file.local_path(),
            file_name: file.name.clone(),
            server_path: file.server_path(repo),
            file_size: file.size,
            fingerprint: file.fingerprint.clone(),
            mime_type: file.mime_type.clone(),
            date_taken: file.date_taken,
            is_video: file.is_video,
            status: SyncStatus::Pending,
            retry_count: 0,
            last_error: None,
            server_file_id: None,
            server_etag: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Snapshot counts across the whole sync table
///
/// `failed` includes records in [`SyncStatus::Error`], so
/// `pending + uploading + synced + failed == total`. `errored` repeats the
/// `Error` subset for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub total: u64,
    pub pending: u64,
    pub uploading: u64,
    pub synced: u64,
    pub failed: u64,
    pub errored: u64,
}

impl SyncStats {
    /// Build from per-status counts
    pub fn from_counts(counts: impl IntoIterator<Item = (SyncStatus, u64)>) -> Self {
        let mut stats = SyncStats::default();
        for (status, count) in counts {
            match status {
                SyncStatus::Pending => stats.pending += count,
                SyncStatus::Uploading => stats.uploading += count,
                SyncStatus::Synced => stats.synced += count,
                SyncStatus::Failed => stats.failed += count,
                SyncStatus::Error => {
                    stats.failed += count;
                    stats.errored += count;
                }
            }
            stats.total += count;
        }
        stats
    }

    /// Percentage of records already on the server
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.synced as f64 / self.total as f64 * 100.0
        }
    }

    /// Records still waiting for an upload attempt
    pub fn remaining(&self) -> u64 {
        self.pending + self.uploading + (self.failed - self.errored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_round_trip_and_classes() {
        for status in SyncStatus::ALL {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("done".parse::<SyncStatus>().is_err());

        assert!(SyncStatus::Pending.is_uploadable());
        assert!(SyncStatus::Failed.is_uploadable());
        assert!(!SyncStatus::Error.is_uploadable());
        assert!(SyncStatus::Synced.is_terminal());
        assert!(SyncStatus::Error.is_terminal());
        assert!(!SyncStatus::Uploading.is_terminal());
    }

    #[test]
    fn test_pending_record_from_file() {
        let file = LocalMediaFile {
            id: 9,
            name: "VID_1.mp4".to_string(),
            path: PathBuf::from("/dcim/VID_1.mp4"),
            size: 4096,
            mime_type: "video/mp4".to_string(),
            date_taken: 1_700_000_000_000,
            fingerprint: "4096_00_1".to_string(),
            is_video: true,
        };

        let record = SyncStateRecord::pending(&file, "dcim", 42);

        assert!(!record.is_persisted());
        assert_eq!(record.status, SyncStatus::Pending);
        assert_eq!(record.server_path, "/dcim/2023/11/VID_1.mp4");
        assert_eq!(record.local_path, "/dcim/VID_1.mp4");
        assert!(record.is_video);
        assert_eq!(record.created_at, 42);
        assert_eq!(record.updated_at, 42);
    }

    #[test]
    fn test_stats_buckets_sum_to_total() {
        let stats = SyncStats::from_counts([
            (SyncStatus::Pending, 3),
            (SyncStatus::Uploading, 1),
            (SyncStatus::Synced, 4),
            (SyncStatus::Failed, 1),
            (SyncStatus::Error, 1),
        ]);

        assert_eq!(stats.total, 10);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.errored, 1);
        assert_eq!(
            stats.pending + stats.uploading + stats.synced + stats.failed,
            stats.total
        );
        assert_eq!(stats.remaining(), 5);
        assert!((stats.progress_percent() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_stats_progress() {
        assert_eq!(SyncStats::default().progress_percent(), 0.0);
    }
}
