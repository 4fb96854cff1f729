//! # Media Sync Module
//!
//! Backs up device photos and videos to a file hub server.
//!
//! ## Overview
//!
//! Files move through a durable per-file status table:
//! - The scanner finds media captured after the last synced file
//! - New fingerprints are queued as `Pending`
//! - The upload worker sends them in server-sized chunks, resuming whatever
//!   the server already holds
//! - Outcomes are recorded as `Synced`, `Failed` or, after repeated failures,
//!   `Error`
//!
//! ## Components
//!
//! - **Scanner** (`scanner`): media store query and quick fingerprints
//! - **Sync State** (`state`): status machine, records and stats
//! - **Repository** (`repository`): SQLite persistence and live feeds
//! - **Upload Engine** (`upload`): resumable chunked transfer with progress
//! - **Sync Coordinator** (`coordinator`): scan, queue, upload and retry

pub mod coordinator;
pub mod db;
pub mod error;
pub mod media;
pub mod repository;
pub mod scanner;
pub mod state;
pub mod upload;

pub use coordinator::{
    FileUploadOutcome, SyncConfig, SyncCoordinator, SyncRunReport, SyncUpdate, UploadSummary,
};
pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{Result, SyncError};
pub use media::LocalMediaFile;
pub use repository::{SqliteSyncStateRepository, SyncStateRepository};
pub use scanner::MediaScanner;
pub use state::{SyncStateRecord, SyncStats, SyncStatus};
pub use upload::{UploadEngine, UploadResult};
