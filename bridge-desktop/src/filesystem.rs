//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// Tokio-based read access to local media files
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

pub(crate) fn epoch_millis(time: std::io::Result<SystemTime>) -> Option<i64> {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(Self::map_io_error)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await.map_err(Self::map_io_error)?;

        Ok(FileMetadata {
            size: metadata.len(),
            created_at: epoch_millis(metadata.created()),
            modified_at: epoch_millis(metadata.modified()),
            is_directory: metadata.is_dir(),
        })
    }

    async fn read_range(&self, path: &Path, offset: u64, len: u64) -> Result<Bytes> {
        let mut file = fs::File::open(path).await.map_err(Self::map_io_error)?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(Self::map_io_error)?;

        let mut buffer = Vec::with_capacity(len.min(16 * 1024 * 1024) as usize);
        let read = file
            .take(len)
            .read_to_end(&mut buffer)
            .await
            .map_err(Self::map_io_error)?;

        debug!(path = ?path, offset = offset, read = read, "Read file range");
        Ok(Bytes::from(buffer))
    }

    async fn open_read_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let file = fs::File::open(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Opened file for reading");
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("bridge-desktop-fs-{}", std::process::id()));
        fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_metadata_and_exists() {
        let fs_access = TokioFileSystem::new();
        let path = temp_file("meta.bin", b"0123456789").await;

        assert!(fs_access.exists(&path).await.unwrap());
        assert!(!fs_access
            .exists(&path.with_file_name("missing.bin"))
            .await
            .unwrap());

        let metadata = fs_access.metadata(&path).await.unwrap();
        assert_eq!(metadata.size, 10);
        assert!(!metadata.is_directory);
        // Milliseconds, not seconds.
        assert!(metadata.modified_at.unwrap() > 1_000_000_000_000);
    }

    #[tokio::test]
    async fn test_read_range_clamps_at_eof() {
        let fs_access = TokioFileSystem::new();
        let path = temp_file("range.bin", b"0123456789").await;

        assert_eq!(
            fs_access.read_range(&path, 2, 4).await.unwrap(),
            Bytes::from_static(b"2345")
        );
        assert_eq!(
            fs_access.read_range(&path, 8, 100).await.unwrap(),
            Bytes::from_static(b"89")
        );
        assert!(fs_access.read_range(&path, 20, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_read_stream() {
        let fs_access = TokioFileSystem::new();
        let path = temp_file("stream.bin", b"streamed").await;

        let mut reader = fs_access.open_read_stream(&path).await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"streamed");
    }
}
