//! # Media Scanner
//!
//! Discovers photos and videos in the local media store and fingerprints them.
//!
//! The fingerprint is `{size}_{hex of first 8 bytes}_{mtime millis}`. It is a
//! cheap change detector used to avoid queuing the same file twice; the upload
//! engine computes the real content hash separately.

use crate::media::{is_video_mime, LocalMediaFile};
use crate::{Result, SyncError};
use bridge_traits::media::{MediaCollection, MediaStore, MediaStoreEntry};
use bridge_traits::storage::FileSystemAccess;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Number of leading bytes that go into a fingerprint
pub const FINGERPRINT_HEAD_BYTES: u64 = 8;

/// Default upper bound on files returned by one scan
pub const DEFAULT_SCAN_LIMIT: usize = 500;

pub struct MediaScanner {
    media_store: Arc<dyn MediaStore>,
    file_system: Arc<dyn FileSystemAccess>,
}

impl MediaScanner {
    pub fn new(media_store: Arc<dyn MediaStore>, file_system: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            media_store,
            file_system,
        }
    }

    /// Return up to `limit` media files captured after `since` (epoch millis,
    /// `0` for everything), newest first.
    ///
    /// Images take the budget first and videos get what is left. Entries
    /// whose file is gone or unreadable are skipped and do not count against
    /// the budget.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Scan`] if the media store cannot be queried.
    #[instrument(skip(self))]
    pub async fn scan(&self, limit: usize, since: i64) -> Result<Vec<LocalMediaFile>> {
        let mut files = Vec::new();
        if limit == 0 {
            return Ok(files);
        }

        self.collect(MediaCollection::Images, since, limit, &mut files)
            .await?;

        let remaining = limit - files.len();
        if remaining > 0 {
            self.collect(MediaCollection::Videos, since, remaining, &mut files)
                .await?;
        }

        files.sort_by(|a, b| b.date_taken.cmp(&a.date_taken));

        info!(found = files.len(), since = since, "Media scan complete");
        Ok(files)
    }

    async fn query(
        &self,
        collection: MediaCollection,
        since: i64,
        limit: usize,
    ) -> Result<Vec<MediaStoreEntry>> {
        self.media_store
            .query(collection, since, limit)
            .await
            .map_err(|e| SyncError::Scan(format!("{:?} query failed: {}", collection, e)))
    }

    /// Add up to `budget` readable files from `collection` to `files`.
    ///
    /// The store only takes a row limit, so when entries get skipped the
    /// query is repeated with a larger limit and the rows already inspected
    /// are passed over. Stops once the budget is met or the store returns
    /// fewer rows than asked for.
    async fn collect(
        &self,
        collection: MediaCollection,
        since: i64,
        budget: usize,
        files: &mut Vec<LocalMediaFile>,
    ) -> Result<()> {
        let start = files.len();
        let target = start + budget;
        let mut inspected = 0;
        let mut request = budget;

        loop {
            let entries = self.query(collection, since, request).await?;
            let returned = entries.len();

            for entry in entries.into_iter().skip(inspected) {
                if files.len() >= target {
                    return Ok(());
                }
                inspected += 1;
                if let Some(file) = self.inspect(entry).await {
                    files.push(file);
                }
            }

            if files.len() >= target || returned < request {
                return Ok(());
            }

            let skipped = inspected - (files.len() - start);
            debug!(
                collection = ?collection,
                skipped = skipped,
                "Querying past skipped media entries"
            );
            request = inspected + (target - files.len());
        }
    }

    /// Turn a store entry into a [`LocalMediaFile`], or `None` if the file
    /// cannot be read
    async fn inspect(&self, entry: MediaStoreEntry) -> Option<LocalMediaFile> {
        match self.file_system.exists(&entry.path).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(file = %entry.display_name, "Skipping media entry without backing file");
                return None;
            }
            Err(e) => {
                warn!(file = %entry.display_name, error = %e, "Existence check failed");
                return None;
            }
        }

        let fingerprint = match self.fingerprint(&entry).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!(file = %entry.display_name, error = %e, "Skipping unreadable media file");
                return None;
            }
        };

        Some(LocalMediaFile {
            id: entry.id,
            is_video: is_video_mime(&entry.mime_type),
            name: entry.display_name,
            path: entry.path,
            size: entry.size,
            mime_type: entry.mime_type,
            date_taken: entry.date_taken,
            fingerprint,
        })
    }

    async fn fingerprint(&self, entry: &MediaStoreEntry) -> bridge_traits::error::Result<String> {
        let metadata = self.file_system.metadata(&entry.path).await?;
        let head = self
            .file_system
            .read_range(&entry.path, 0, FINGERPRINT_HEAD_BYTES)
            .await?;

        Ok(quick_fingerprint(
            entry.size,
            &head,
            metadata.modified_at.unwrap_or(0),
        ))
    }
}

/// `{size}_{hex(head[..8])}_{modified_ms}`
pub fn quick_fingerprint(size: u64, head: &[u8], modified_ms: i64) -> String {
    let head = &head[..head.len().min(FINGERPRINT_HEAD_BYTES as usize)];
    format!("{}_{}_{}", size, hex::encode(head), modified_ms)
}
