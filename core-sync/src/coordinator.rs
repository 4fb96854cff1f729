//! # Sync Coordinator
//!
//! Drives local media through the sync state table and onto the file hub.
//!
//! ## Overview
//!
//! The `SyncCoordinator` owns the only write path into the sync state table.
//! It coordinates:
//! - `MediaScanner` to discover files newer than the sync watermark
//! - `SyncStateRepository` to queue records and track their status
//! - `UploadEngine` to send one file at a time with server-side resume
//! - `EventBus` to announce scans, batches and queue changes
//!
//! ## Workflow
//!
//! ### Scan and queue
//! 1. Watermark = latest capture time among synced records (0 if none)
//! 2. Scan the media store for files captured after the watermark
//! 3. Skip files whose fingerprint is already known, whatever their path
//! 4. Insert the rest as `Pending`
//!
//! ### Upload pending
//! 1. Check the network precondition when a monitor is configured
//! 2. Return stale `Uploading` records to `Pending`
//! 3. Take up to `max_files` `Pending`/`Failed` records, newest first
//! 4. For each: claim it, upload it, record `Synced` or `Failed`
//! 5. Escalate records whose retry count exceeds the threshold to `Error`
//!
//! A failure of one file never aborts the batch. Only store and scanner
//! errors are returned to the caller.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncCoordinator, SyncUpdate};
//! use tokio::sync::mpsc;
//!
//! let queued = coordinator.scan_and_queue("dcim").await?;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! tokio::spawn(async move {
//!     while let Some(update) = rx.recv().await {
//!         if let SyncUpdate::FileProgress { record_id, fraction } = update {
//!             println!("{record_id}: {:.0}%", fraction * 100.0);
//!         }
//!     }
//! });
//!
//! let summary = coordinator.upload_pending("dcim", 10, Some(tx)).await?;
//! println!("{} of {} uploaded", summary.succeeded, summary.total);
//! ```

use crate::media::LocalMediaFile;
use crate::repository::SyncStateRepository;
use crate::scanner::{MediaScanner, DEFAULT_SCAN_LIMIT};
use crate::state::{SyncStateRecord, SyncStats, SyncStatus};
use crate::upload::{UploadEngine, UploadResult, DEFAULT_HASH_BUFFER_SIZE};
use crate::{Result, SyncError};
use bridge_traits::network::{NetworkMonitor, NetworkStatus, NetworkType};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{CoreEvent, EventBus, QueueEvent, SyncEvent};
use futures::stream::BoxStream;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Sync coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// File hub repository that receives the media
    pub repo_name: String,

    /// Maximum files returned by one media scan
    pub scan_limit: usize,

    /// Files uploaded by one `run_sync`
    pub batch_size: usize,

    /// Failures a record may accumulate before it moves to `Error`. The
    /// failure that pushes the retry count past this value escalates it.
    /// `None` retries forever.
    pub max_retry_attempts: Option<u32>,

    /// Refuse to upload unless on an unmetered WiFi connection
    pub wifi_only: bool,

    /// Read buffer for content hashing (bytes)
    pub hash_buffer_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repo_name: "dcim".to_string(),
            scan_limit: DEFAULT_SCAN_LIMIT,
            batch_size: 10,
            max_retry_attempts: Some(5),
            wifi_only: false,
            hash_buffer_size: DEFAULT_HASH_BUFFER_SIZE,
        }
    }
}

impl SyncConfig {
    /// Reject settings the coordinator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.repo_name.trim().is_empty() {
            return Err(SyncError::Config("repo_name must not be empty".to_string()));
        }
        if self.scan_limit == 0 {
            return Err(SyncError::Config("scan_limit must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(SyncError::Config("batch_size must be at least 1".to_string()));
        }
        if self.hash_buffer_size == 0 {
            return Err(SyncError::Config(
                "hash_buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-file notifications delivered while a batch runs
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    /// Fraction of the file already on the server, non-decreasing per record
    FileProgress { record_id: i64, fraction: f64 },
    /// The attempt for this record finished
    FileComplete {
        record_id: i64,
        success: bool,
        error: Option<String>,
    },
}

/// Result of one file in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadOutcome {
    pub record_id: i64,
    pub file_name: String,
    pub success: bool,
    pub server_path: Option<String>,
    pub error: Option<String>,
}

/// Result of one `upload_pending` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Files attempted in this batch
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<FileUploadOutcome>,
}

impl UploadSummary {
    fn push(&mut self, outcome: FileUploadOutcome) {
        self.total += 1;
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }

    /// Fraction of attempted files that succeeded
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}

/// Result of one `run_sync` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRunReport {
    /// Records newly queued by the scan
    pub queued: usize,
    pub upload: UploadSummary,
}

/// Central orchestrator for scanning and uploading
pub struct SyncCoordinator {
    config: SyncConfig,
    repository: Arc<dyn SyncStateRepository>,
    scanner: MediaScanner,
    engine: UploadEngine,
    file_system: Arc<dyn FileSystemAccess>,
    event_bus: EventBus,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Arc<dyn Clock>,
    /// Held for the whole of a scan, batch, run or queue maintenance call
    active: Mutex<()>,
}

impl SyncCoordinator {
    /// Create a new sync coordinator
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if `config` does not validate.
    pub fn new(
        config: SyncConfig,
        repository: Arc<dyn SyncStateRepository>,
        scanner: MediaScanner,
        engine: UploadEngine,
        file_system: Arc<dyn FileSystemAccess>,
        event_bus: EventBus,
        network_monitor: Option<Arc<dyn NetworkMonitor>>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            repository,
            scanner,
            engine,
            file_system,
            event_bus,
            network_monitor,
            clock: Arc::new(SystemClock),
            active: Mutex::new(()),
        })
    }

    /// Replace the time source used for new records
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn begin(&self) -> Result<MutexGuard<'_, ()>> {
        self.active.try_lock().map_err(|_| SyncError::SyncInProgress)
    }

    /// Whether a scan, batch or run is in progress
    pub fn is_sync_active(&self) -> bool {
        self.active.try_lock().is_err()
    }

    // ========================================================================
    // Scan
    // ========================================================================

    /// Scan for new media and queue it. Returns the number of new records.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if another operation holds the guard
    /// - [`SyncError::Scan`] if the media store is unreachable
    /// - [`SyncError::Database`] if the store fails
    pub async fn scan_and_queue(&self, repo: &str) -> Result<usize> {
        let _guard = self.begin()?;
        self.scan_and_queue_inner(repo).await
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn scan_and_queue_inner(&self, repo: &str) -> Result<usize> {
        let since = self.repository.max_synced_date_taken().await?.unwrap_or(0);
        let files = self.scanner.scan(self.config.scan_limit, since).await?;
        let discovered = files.len();

        let fresh = self.new_records(repo, &files).await?;
        if !fresh.is_empty() {
            self.repository.insert_many(&fresh).await?;
        }

        info!(
            since = since,
            discovered = discovered,
            queued = fresh.len(),
            "Queued new media"
        );
        self.emit(CoreEvent::Sync(SyncEvent::ScanCompleted {
            repo: repo.to_string(),
            discovered: discovered as u64,
            queued: fresh.len() as u64,
        }));

        Ok(fresh.len())
    }

    async fn new_records(
        &self,
        repo: &str,
        files: &[LocalMediaFile],
    ) -> Result<Vec<SyncStateRecord>> {
        let now = self.clock.unix_timestamp_millis();
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();

        for file in files {
            if !seen.insert(file.fingerprint.as_str()) {
                continue;
            }
            if let Some(existing) = self
                .repository
                .find_by_fingerprint(&file.fingerprint)
                .await?
            {
                debug!(
                    file = %file.name,
                    record_id = existing.id,
                    status = %existing.status,
                    "Fingerprint already tracked"
                );
                continue;
            }
            fresh.push(SyncStateRecord::pending(file, repo, now));
        }

        Ok(fresh)
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Upload up to `max_files` pending or failed records.
    ///
    /// Per-file updates are sent on `updates` when given. Per-file failures
    /// are recorded on the record and reported in the summary; they never
    /// fail the call.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if another operation holds the guard
    /// - [`SyncError::NetworkUnavailable`] if the network precondition fails
    /// - [`SyncError::Database`] if the store fails mid-batch
    pub async fn upload_pending(
        &self,
        repo: &str,
        max_files: usize,
        updates: Option<UnboundedSender<SyncUpdate>>,
    ) -> Result<UploadSummary> {
        let _guard = self.begin()?;
        self.upload_pending_inner(repo, max_files, updates.as_ref())
            .await
    }

    #[instrument(skip(self, updates), fields(repo = %repo))]
    async fn upload_pending_inner(
        &self,
        repo: &str,
        max_files: usize,
        updates: Option<&UnboundedSender<SyncUpdate>>,
    ) -> Result<UploadSummary> {
        self.check_network().await?;

        let stale = self
            .repository
            .transition_all(SyncStatus::Uploading, SyncStatus::Pending)
            .await?;
        if stale > 0 {
            warn!(count = stale, "Re-queued uploads left over from an interrupted run");
            self.emit(CoreEvent::Queue(QueueEvent::Requeued {
                from: SyncStatus::Uploading.to_string(),
                count: stale,
            }));
        }

        let limit = u32::try_from(max_files).unwrap_or(u32::MAX);
        let records = self
            .repository
            .find_by_statuses(&[SyncStatus::Pending, SyncStatus::Failed], Some(limit))
            .await?;

        let mut summary = UploadSummary::default();
        if records.is_empty() {
            debug!("Nothing to upload");
            return Ok(summary);
        }

        let batch_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        info!(batch_id = %batch_id, files = records.len(), "Starting upload batch");
        self.emit(CoreEvent::Sync(SyncEvent::BatchStarted {
            batch_id: batch_id.clone(),
            repo: repo.to_string(),
            files: records.len() as u64,
        }));

        for record in &records {
            match self.process_record(repo, record, updates).await {
                Ok(Some(outcome)) => {
                    self.emit(CoreEvent::Sync(SyncEvent::FileCompleted {
                        batch_id: batch_id.clone(),
                        record_id: outcome.record_id,
                        file_name: outcome.file_name.clone(),
                        success: outcome.success,
                        error: outcome.error.clone(),
                    }));
                    summary.push(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(batch_id = %batch_id, error = %e, "Upload batch aborted");
                    self.emit(CoreEvent::Sync(SyncEvent::BatchFailed {
                        batch_id: batch_id.clone(),
                        message: e.to_string(),
                    }));
                    return Err(e);
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            batch_id = %batch_id,
            attempted = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms = duration_ms,
            "Upload batch complete"
        );
        self.emit(CoreEvent::Sync(SyncEvent::BatchCompleted {
            batch_id,
            attempted: summary.total as u64,
            succeeded: summary.succeeded as u64,
            failed: summary.failed as u64,
            duration_ms,
        }));

        Ok(summary)
    }

    /// Attempt one record. `None` when another caller already owns it.
    async fn process_record(
        &self,
        repo: &str,
        record: &SyncStateRecord,
        updates: Option<&UnboundedSender<SyncUpdate>>,
    ) -> Result<Option<FileUploadOutcome>> {
        if !self.repository.try_mark_uploading(record.id).await? {
            debug!(record_id = record.id, "Record claimed elsewhere, skipping");
            return Ok(None);
        }

        let path = PathBuf::from(&record.local_path);
        let attempt = match self.file_system.exists(&path).await {
            Ok(true) => self.transfer(repo, record, &path, updates).await,
            Ok(false) => Err(SyncError::FileNotFound {
                path: record.local_path.clone(),
            }),
            Err(e) => Err(SyncError::LocalRead {
                path: record.local_path.clone(),
                message: e.to_string(),
            }),
        };

        let outcome = match attempt {
            Ok(uploaded) => {
                let updated = self
                    .repository
                    .mark_synced(record.id, uploaded.server_file_id, &uploaded.etag)
                    .await?;
                if updated {
                    info!(
                        record_id = record.id,
                        file = %record.file_name,
                        etag = %uploaded.etag,
                        "File synced"
                    );
                    FileUploadOutcome {
                        record_id: record.id,
                        file_name: record.file_name.clone(),
                        success: true,
                        server_path: Some(uploaded.server_path),
                        error: None,
                    }
                } else {
                    warn!(
                        record_id = record.id,
                        file = %record.file_name,
                        "Record removed while its upload was in flight"
                    );
                    FileUploadOutcome {
                        record_id: record.id,
                        file_name: record.file_name.clone(),
                        success: false,
                        server_path: Some(uploaded.server_path),
                        error: Some(SyncError::RecordNotFound { id: record.id }.to_string()),
                    }
                }
            }
            Err(e) if e.is_per_file() => {
                let message = e.to_string();
                self.record_failure(record, &message).await?;
                FileUploadOutcome {
                    record_id: record.id,
                    file_name: record.file_name.clone(),
                    success: false,
                    server_path: None,
                    error: Some(message),
                }
            }
            Err(e) => return Err(e),
        };

        if let Some(updates) = updates {
            updates
                .send(SyncUpdate::FileComplete {
                    record_id: outcome.record_id,
                    success: outcome.success,
                    error: outcome.error.clone(),
                })
                .ok();
        }

        Ok(Some(outcome))
    }

    /// Run the engine while forwarding its progress as [`SyncUpdate`]s
    async fn transfer(
        &self,
        repo: &str,
        record: &SyncStateRecord,
        path: &Path,
        updates: Option<&UnboundedSender<SyncUpdate>>,
    ) -> Result<UploadResult> {
        let Some(updates) = updates else {
            return self
                .engine
                .upload(repo, &record.server_path, path, None)
                .await;
        };

        let forward = |fraction: f64| {
            updates
                .send(SyncUpdate::FileProgress {
                    record_id: record.id,
                    fraction,
                })
                .ok();
        };

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let upload = self
            .engine
            .upload(repo, &record.server_path, path, Some(&progress_tx));
        tokio::pin!(upload);

        let result = loop {
            tokio::select! {
                result = &mut upload => break result,
                Some(fraction) = progress_rx.recv() => forward(fraction),
            }
        };
        while let Ok(fraction) = progress_rx.try_recv() {
            forward(fraction);
        }

        result
    }

    async fn record_failure(&self, record: &SyncStateRecord, message: &str) -> Result<()> {
        let Some(retry_count) = self.repository.mark_failed(record.id, message).await? else {
            warn!(
                record_id = record.id,
                file = %record.file_name,
                error = %message,
                "Record removed while its upload was in flight"
            );
            return Ok(());
        };
        warn!(
            record_id = record.id,
            file = %record.file_name,
            retry_count = retry_count,
            error = %message,
            "File upload failed"
        );

        if let Some(max) = self.config.max_retry_attempts {
            if retry_count > max {
                self.repository
                    .update_status(record.id, SyncStatus::Error)
                    .await?;
                warn!(
                    record_id = record.id,
                    retry_count = retry_count,
                    "Giving up on file until it is reset"
                );
                self.emit(CoreEvent::Queue(QueueEvent::Escalated {
                    record_id: record.id,
                    retry_count,
                }));
            }
        }

        Ok(())
    }

    async fn check_network(&self) -> Result<()> {
        let Some(monitor) = &self.network_monitor else {
            return Ok(());
        };

        let info = monitor
            .get_network_info()
            .await
            .map_err(|e| SyncError::NetworkUnavailable(format!("Failed to check network: {}", e)))?;

        if info.status != NetworkStatus::Connected {
            return Err(SyncError::NetworkUnavailable(
                "No network connection".to_string(),
            ));
        }

        if self.config.wifi_only {
            if !matches!(info.network_type, Some(NetworkType::WiFi)) {
                return Err(SyncError::NetworkUnavailable(
                    "WiFi-only mode enabled but not on WiFi".to_string(),
                ));
            }
            if info.is_metered {
                return Err(SyncError::NetworkUnavailable(
                    "WiFi-only mode enabled but network is metered".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Scan, then upload one batch, under a single guard.
    ///
    /// The upload step runs even when the scan queued nothing, so earlier
    /// failures get their next attempt.
    pub async fn run_sync(
        &self,
        repo: &str,
        max_files: usize,
        updates: Option<UnboundedSender<SyncUpdate>>,
    ) -> Result<SyncRunReport> {
        let _guard = self.begin()?;
        let queued = self.scan_and_queue_inner(repo).await?;
        let upload = self
            .upload_pending_inner(repo, max_files, updates.as_ref())
            .await?;
        Ok(SyncRunReport { queued, upload })
    }

    /// Abort a server-side upload session
    pub async fn cancel_upload(&self, repo: &str, upload_id: &str) -> Result<()> {
        self.engine.cancel(repo, upload_id).await
    }

    // ========================================================================
    // Queue maintenance
    // ========================================================================
    //
    // These take the same guard as scans and batches, so they return
    // `SyncInProgress` instead of touching records a batch is working on.

    /// Move every `Failed` record back to `Pending`. `Error` records are left
    /// alone.
    #[instrument(skip(self))]
    pub async fn retry_failed(&self, repo: &str) -> Result<u64> {
        let _guard = self.begin()?;
        let count = self
            .repository
            .transition_all(SyncStatus::Failed, SyncStatus::Pending)
            .await?;
        info!(count = count, "Re-queued failed uploads");
        if count > 0 {
            self.emit(CoreEvent::Queue(QueueEvent::Requeued {
                from: SyncStatus::Failed.to_string(),
                count,
            }));
        }
        Ok(count)
    }

    /// Move every `Error` record back to `Pending` with a fresh retry budget
    #[instrument(skip(self))]
    pub async fn reset_errored(&self) -> Result<u64> {
        let _guard = self.begin()?;
        let errored = self
            .repository
            .find_by_statuses(&[SyncStatus::Error], None)
            .await?;

        let now = self.clock.unix_timestamp_millis();
        let mut count = 0;
        for mut record in errored {
            record.status = SyncStatus::Pending;
            record.retry_count = 0;
            record.updated_at = now;
            if self.repository.update(&record).await? {
                count += 1;
            }
        }

        info!(count = count, "Reset errored uploads");
        if count > 0 {
            self.emit(CoreEvent::Queue(QueueEvent::Requeued {
                from: SyncStatus::Error.to_string(),
                count,
            }));
        }
        Ok(count)
    }

    /// Delete every record in `status`
    pub async fn remove_by_status(&self, status: SyncStatus) -> Result<u64> {
        let _guard = self.begin()?;
        let count = self.repository.delete_by_status(status).await?;
        debug!(status = %status, count = count, "Removed records");
        if count > 0 {
            self.emit(CoreEvent::Queue(QueueEvent::Removed { count }));
        }
        Ok(count)
    }

    /// Drop the record for `local_path`, so a later scan may queue it again
    pub async fn forget(&self, local_path: &str) -> Result<bool> {
        let _guard = self.begin()?;
        let removed = self.repository.delete_by_local_path(local_path).await?;
        if removed {
            self.emit(CoreEvent::Queue(QueueEvent::Removed { count: 1 }));
        }
        Ok(removed)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn stats(&self) -> Result<SyncStats> {
        self.repository.stats().await
    }

    /// Whether a file with this fingerprint is already on the server
    pub async fn is_file_synced(&self, fingerprint: &str) -> Result<bool> {
        Ok(self
            .repository
            .find_by_fingerprint(fingerprint)
            .await?
            .is_some_and(|record| record.status == SyncStatus::Synced))
    }

    pub async fn records(&self) -> Result<Vec<SyncStateRecord>> {
        self.repository.find_all().await
    }

    pub async fn record_by_path(&self, local_path: &str) -> Result<Option<SyncStateRecord>> {
        self.repository.find_by_local_path(local_path).await
    }

    pub fn watch_records(&self) -> BoxStream<'static, Result<Vec<SyncStateRecord>>> {
        self.repository.watch_records()
    }

    pub fn watch_count(&self, status: SyncStatus) -> BoxStream<'static, Result<u64>> {
        self.repository.watch_count(status)
    }

    pub fn watch_stats(&self) -> BoxStream<'static, Result<SyncStats>> {
        self.repository.watch_stats()
    }

    fn emit(&self, event: CoreEvent) {
        self.event_bus.emit(event).ok();
    }
}
