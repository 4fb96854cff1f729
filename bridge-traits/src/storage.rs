//! File System Abstraction
//!
//! Read-only access to the local media files the sync engine uploads.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    /// Creation time in milliseconds since the Unix epoch, when the platform reports one
    pub created_at: Option<i64>,
    /// Last modification time in milliseconds since the Unix epoch
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file reads so the scanner and upload engine can run against
/// sandboxed platform storage or an in-memory fixture.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn header(fs: &dyn FileSystemAccess, path: &Path) -> Result<Bytes> {
///     fs.read_range(path, 0, 8).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Returns fewer bytes when the range runs past the end of the file.
    async fn read_range(&self, path: &Path, offset: u64, len: u64) -> Result<Bytes>;

    /// Open a file for streaming reads
    async fn open_read_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
}
