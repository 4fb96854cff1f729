//! DCIM sync engine.
//!
//! Re-exports the service façade together with the runtime and sync crates
//! so a host application can depend on `dcim-sync` alone. The default
//! `desktop-shims` feature wires the `bridge-desktop` implementations.

pub use core_runtime::{config, events, logging};
pub use core_service::{CoreError, Result, SyncService};
pub use core_sync::{
    SyncConfig, SyncCoordinator, SyncRunReport, SyncStats, SyncStatus, SyncUpdate, UploadSummary,
};
