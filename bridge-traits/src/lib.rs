//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync core and platform-specific
//! implementations. Each trait represents a capability that the core requires but
//! that must be implemented differently per platform (desktop, Android).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`ChunkedUploadApi`](upload::ChunkedUploadApi) - Resumable upload sessions on the file hub
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Existence checks, metadata and ranged reads
//!
//! ### Platform Integration
//! - [`MediaStore`](media::MediaStore) - Query the device's photo and video index
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and metered network detection
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//! | Android  | host-provided       |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report transport failures as `BridgeError::Network`
//! - Include error context (e.g., file paths, HTTP status)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod error;
pub mod http;
pub mod media;
pub mod network;
pub mod storage;
pub mod time;
pub mod upload;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use media::{MediaCollection, MediaStore, MediaStoreEntry};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
pub use upload::{ChunkAck, ChunkedUploadApi, FinalizedUpload, UploadSession};
