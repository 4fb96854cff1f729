//! # Upload Engine
//!
//! Runs the resumable chunked-upload protocol for a single file.
//!
//! ## Overview
//!
//! 1. Check the local file exists and hash it (MD5, streamed)
//! 2. `begin` a session; the server picks the chunk size and lists chunks it already holds
//! 3. Send every missing chunk in index order, reporting byte progress
//! 4. `finalize` to get the server's etag
//!
//! Any failure returns immediately and leaves the server session alone, so
//! the next attempt can resume it. Nothing about the session is stored locally.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = UploadEngine::new(api, file_system);
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let result = engine.upload("dcim", "/dcim/2024/05/IMG_1.jpg", path, Some(&tx)).await?;
//! ```

use crate::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::upload::{ChunkedUploadApi, UploadSession};
use md5::{Digest, Md5};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument};

/// Read buffer used while hashing
pub const DEFAULT_HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub server_path: String,
    pub etag: String,
    /// Size confirmed by the server
    pub size: u64,
    pub upload_id: String,
    pub server_file_id: Option<i64>,
}

pub struct UploadEngine {
    api: Arc<dyn ChunkedUploadApi>,
    file_system: Arc<dyn FileSystemAccess>,
    hash_buffer_size: usize,
}

impl UploadEngine {
    pub fn new(api: Arc<dyn ChunkedUploadApi>, file_system: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            api,
            file_system,
            hash_buffer_size: DEFAULT_HASH_BUFFER_SIZE,
        }
    }

    pub fn with_hash_buffer_size(mut self, size: usize) -> Self {
        self.hash_buffer_size = size.max(1);
        self
    }

    /// Upload `local_path` to `server_path` in `repo`.
    ///
    /// Progress values sent on `progress` are fractions of the file's bytes
    /// already on the server. They never decrease and end at exactly `1.0`
    /// when the upload succeeds. A closed receiver is ignored.
    ///
    /// # Errors
    ///
    /// - [`SyncError::FileNotFound`] if the file is gone
    /// - [`SyncError::LocalRead`] if it cannot be read
    /// - [`SyncError::Network`] / [`SyncError::Server`] for failed exchanges
    /// - [`SyncError::ChunkRejected`] if the server refuses a chunk
    #[instrument(skip(self, local_path, progress), fields(server_path = %server_path))]
    pub async fn upload(
        &self,
        repo: &str,
        server_path: &str,
        local_path: &Path,
        progress: Option<&UnboundedSender<f64>>,
    ) -> Result<UploadResult> {
        let display_path = local_path.to_string_lossy().into_owned();
        let exists = self
            .file_system
            .exists(local_path)
            .await
            .map_err(|e| local_read_error(&display_path, e))?;
        if !exists {
            return Err(SyncError::FileNotFound { path: display_path });
        }

        let size = self
            .file_system
            .metadata(local_path)
            .await
            .map_err(|e| local_read_error(&display_path, e))?
            .size;
        let checksum = self.content_hash(local_path).await?;

        let session = self
            .api
            .begin_upload(repo, server_path, size, &checksum)
            .await
            .map_err(SyncError::from_exchange)?;
        validate_session(&session, size)?;

        let mut reporter = ProgressReporter::new(size, progress);
        let received: HashSet<u32> = session.uploaded_chunks.iter().copied().collect();
        let mut sent = 0u32;

        for index in 0..session.total_chunks {
            let offset = u64::from(index) * session.chunk_size;
            let len = chunk_len(size, session.chunk_size, index);

            if received.contains(&index) {
                debug!(index, "Chunk already on server");
            } else {
                let data = self
                    .file_system
                    .read_range(local_path, offset, len)
                    .await
                    .map_err(|e| local_read_error(&display_path, e))?;

                let ack = self
                    .api
                    .upload_chunk(repo, &session.upload_id, index, data)
                    .await
                    .map_err(SyncError::from_exchange)?;
                if !ack.success {
                    return Err(SyncError::ChunkRejected {
                        index,
                        message: ack
                            .message
                            .unwrap_or_else(|| "Chunk upload failed".to_string()),
                    });
                }
                sent += 1;
            }

            reporter.advance(len);
        }

        let finalized = self
            .api
            .finalize_upload(repo, &session.upload_id)
            .await
            .map_err(SyncError::from_exchange)?;
        reporter.finish();

        info!(
            upload_id = %session.upload_id,
            chunks_sent = sent,
            chunks_resumed = received.len(),
            size = finalized.size,
            "Upload complete"
        );

        Ok(UploadResult {
            server_path: server_path.to_string(),
            etag: finalized.etag,
            size: finalized.size,
            upload_id: session.upload_id,
            server_file_id: finalized.file_id,
        })
    }

    /// Abandon a server-side upload session
    #[instrument(skip(self))]
    pub async fn cancel(&self, repo: &str, upload_id: &str) -> Result<()> {
        let ack = self
            .api
            .cancel_upload(repo, upload_id)
            .await
            .map_err(SyncError::from_exchange)?;

        if ack.success {
            Ok(())
        } else {
            Err(SyncError::Server(
                ack.message
                    .unwrap_or_else(|| "Cancel upload failed".to_string()),
            ))
        }
    }

    /// Lowercase hex MD5 of the whole file, read in bounded buffers.
    ///
    /// The file hub matches resumable sessions on this value, so it has to
    /// be the digest every other client of the hub sends.
    pub async fn content_hash(&self, local_path: &Path) -> Result<String> {
        let display_path = local_path.to_string_lossy();
        let mut reader = self
            .file_system
            .open_read_stream(local_path)
            .await
            .map_err(|e| local_read_error(&display_path, e))?;

        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; self.hash_buffer_size];
        loop {
            let read = reader
                .read(&mut buffer)
                .await
                .map_err(|e| SyncError::LocalRead {
                    path: display_path.to_string(),
                    message: e.to_string(),
                })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

/// Bytes in chunk `index` of a `size`-byte file split into `chunk_size` pieces
pub fn chunk_len(size: u64, chunk_size: u64, index: u32) -> u64 {
    let offset = u64::from(index).saturating_mul(chunk_size);
    chunk_size.min(size.saturating_sub(offset))
}

fn validate_session(session: &UploadSession, size: u64) -> Result<()> {
    if session.total_chunks > 0 && session.chunk_size == 0 {
        return Err(SyncError::Server(format!(
            "upload session {} has zero chunk size",
            session.upload_id
        )));
    }
    let capacity = u64::from(session.total_chunks).saturating_mul(session.chunk_size);
    if capacity < size {
        return Err(SyncError::Server(format!(
            "upload session {} covers {} of {} bytes",
            session.upload_id, capacity, size
        )));
    }
    Ok(())
}

fn local_read_error(path: &str, error: bridge_traits::BridgeError) -> SyncError {
    SyncError::LocalRead {
        path: path.to_string(),
        message: error.to_string(),
    }
}

/// Emits non-decreasing byte fractions
struct ProgressReporter<'a> {
    total: u64,
    accounted: u64,
    last: f64,
    sender: Option<&'a UnboundedSender<f64>>,
}

impl<'a> ProgressReporter<'a> {
    fn new(total: u64, sender: Option<&'a UnboundedSender<f64>>) -> Self {
        Self {
            total,
            accounted: 0,
            last: 0.0,
            sender,
        }
    }

    fn advance(&mut self, bytes: u64) {
        self.accounted = self.accounted.saturating_add(bytes).min(self.total);
        let fraction = if self.total == 0 {
            1.0
        } else {
            self.accounted as f64 / self.total as f64
        };
        self.emit(fraction);
    }

    fn finish(&mut self) {
        if self.last < 1.0 {
            self.emit(1.0);
        }
    }

    fn emit(&mut self, fraction: f64) {
        let fraction = fraction.clamp(self.last, 1.0);
        self.last = fraction;
        if let Some(sender) = self.sender {
            sender.send(fraction).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::BridgeError;
    use bridge_traits::upload::{ChunkAck, FinalizedUpload};
    use bytes::Bytes;
    use mockall::mock;

    mock! {
        Api {}

        #[async_trait]
        impl ChunkedUploadApi for Api {
            async fn begin_upload(
                &self,
                repo: &str,
                path: &str,
                size: u64,
                checksum: &str,
            ) -> bridge_traits::error::Result<UploadSession>;

            async fn upload_chunk(
                &self,
                repo: &str,
                upload_id: &str,
                index: u32,
                data: Bytes,
            ) -> bridge_traits::error::Result<ChunkAck>;

            async fn finalize_upload(
                &self,
                repo: &str,
                upload_id: &str,
            ) -> bridge_traits::error::Result<FinalizedUpload>;

            async fn cancel_upload(
                &self,
                repo: &str,
                upload_id: &str,
            ) -> bridge_traits::error::Result<ChunkAck>;
        }
    }

    mock! {
        Fs {}

        #[async_trait]
        impl FileSystemAccess for Fs {
            async fn exists(&self, path: &Path) -> bridge_traits::error::Result<bool>;
            async fn metadata(
                &self,
                path: &Path,
            ) -> bridge_traits::error::Result<bridge_traits::storage::FileMetadata>;
            async fn read_range(
                &self,
                path: &Path,
                offset: u64,
                len: u64,
            ) -> bridge_traits::error::Result<Bytes>;
            async fn open_read_stream(
                &self,
                path: &Path,
            ) -> bridge_traits::error::Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    type Reader = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

    const CONTENT: &[u8] = b"0123456789";

    fn file_fs() -> MockFs {
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(true));
        fs.expect_metadata().returning(|_| {
            Ok(bridge_traits::storage::FileMetadata {
                size: CONTENT.len() as u64,
                created_at: None,
                modified_at: Some(1),
                is_directory: false,
            })
        });
        fs.expect_open_read_stream()
            .returning(|_| Ok(Box::new(std::io::Cursor::new(CONTENT.to_vec())) as Reader));
        fs.expect_read_range().returning(|_, offset, len| {
            let start = offset as usize;
            let end = (start + len as usize).min(CONTENT.len());
            Ok(Bytes::copy_from_slice(&CONTENT[start..end]))
        });
        fs
    }

    fn session(uploaded: Vec<u32>) -> UploadSession {
        UploadSession {
            upload_id: "up-1".to_string(),
            total_chunks: 3,
            chunk_size: 4,
            uploaded_chunks: uploaded,
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<f64>) -> Vec<f64> {
        let mut values = Vec::new();
        while let Ok(v) = rx.try_recv() {
            values.push(v);
        }
        values
    }

    #[test]
    fn test_chunk_len() {
        assert_eq!(chunk_len(10, 4, 0), 4);
        assert_eq!(chunk_len(10, 4, 2), 2);
        assert_eq!(chunk_len(10, 4, 3), 0);
        assert_eq!(chunk_len(0, 4, 0), 0);
    }

    #[tokio::test]
    async fn test_content_hash_is_md5() {
        let engine = UploadEngine::new(Arc::new(MockApi::new()), Arc::new(file_fs()))
            .with_hash_buffer_size(3);
        let hash = engine.content_hash(Path::new("/dcim/a.jpg")).await.unwrap();

        assert_eq!(
            hash,
            "781e5e245d69b566979b86e28d23f2c7"
        );
    }

    #[tokio::test]
    async fn test_upload_sends_every_chunk() {
        let mut api = MockApi::new();
        api.expect_begin_upload()
            .withf(|repo, path, size, checksum| {
                repo == "dcim"
                    && path == "/dcim/2024/01/a.jpg"
                    && *size == 10
                    && checksum == "781e5e245d69b566979b86e28d23f2c7"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(session(vec![])));
        api.expect_upload_chunk()
            .times(3)
            .returning(|_, _, index, data| {
                let expected = [&b"0123"[..], &b"4567"[..], &b"89"[..]][index as usize];
                assert_eq!(&data[..], expected);
                Ok(ChunkAck {
                    success: true,
                    message: None,
                })
            });
        api.expect_finalize_upload().times(1).returning(|_, _| {
            Ok(FinalizedUpload {
                etag: "etag-1".to_string(),
                size: 10,
                file_id: Some(3),
            })
        });

        let engine = UploadEngine::new(Arc::new(api), Arc::new(file_fs()));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = engine
            .upload("dcim", "/dcim/2024/01/a.jpg", Path::new("/dcim/a.jpg"), Some(&tx))
            .await
            .unwrap();

        assert_eq!(result.etag, "etag-1");
        assert_eq!(result.size, 10);
        assert_eq!(result.upload_id, "up-1");
        assert_eq!(result.server_file_id, Some(3));

        let progress = drain(&mut rx);
        assert_eq!(progress, vec![0.4, 0.8, 1.0]);
    }

    #[tokio::test]
    async fn test_upload_skips_chunks_server_has() {
        let mut api = MockApi::new();
        api.expect_begin_upload()
            .returning(|_, _, _, _| Ok(session(vec![0, 2])));
        api.expect_upload_chunk()
            .withf(|_, _, index, _| *index == 1)
            .times(1)
            .returning(|_, _, _, _| {
                Ok(ChunkAck {
                    success: true,
                    message: None,
                })
            });
        api.expect_finalize_upload().returning(|_, _| {
            Ok(FinalizedUpload {
                etag: "etag-2".to_string(),
                size: 10,
                file_id: None,
            })
        });

        let engine = UploadEngine::new(Arc::new(api), Arc::new(file_fs()));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        engine
            .upload("dcim", "/dcim/2024/01/a.jpg", Path::new("/dcim/a.jpg"), Some(&tx))
            .await
            .unwrap();

        let progress = drain(&mut rx);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn test_rejected_chunk_aborts_without_finalize() {
        let mut api = MockApi::new();
        api.expect_begin_upload()
            .returning(|_, _, _, _| Ok(session(vec![])));
        api.expect_upload_chunk().times(2).returning(|_, _, index, _| {
            Ok(ChunkAck {
                success: index == 0,
                message: None,
            })
        });
        api.expect_finalize_upload().never();
        api.expect_cancel_upload().never();

        let engine = UploadEngine::new(Arc::new(api), Arc::new(file_fs()));
        let err = engine
            .upload("dcim", "/dcim/2024/01/a.jpg", Path::new("/dcim/a.jpg"), None)
            .await
            .unwrap_err();

        match err {
            SyncError::ChunkRejected { index, message } => {
                assert_eq!(index, 1);
                assert_eq!(message, "Chunk upload failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_error_on_chunk() {
        let mut api = MockApi::new();
        api.expect_begin_upload()
            .returning(|_, _, _, _| Ok(session(vec![])));
        api.expect_upload_chunk()
            .times(1)
            .returning(|_, _, _, _| Err(BridgeError::Network("connection reset".to_string())));

        let engine = UploadEngine::new(Arc::new(api), Arc::new(file_fs()));
        let err = engine
            .upload("dcim", "/dcim/2024/01/a.jpg", Path::new("/dcim/a.jpg"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Network(_)));
    }

    #[tokio::test]
    async fn test_missing_file_fails_fast() {
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(false));
        let mut api = MockApi::new();
        api.expect_begin_upload().never();

        let engine = UploadEngine::new(Arc::new(api), Arc::new(fs));
        let err = engine
            .upload("dcim", "/dcim/2024/01/a.jpg", Path::new("/dcim/a.jpg"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_zero_byte_file_reports_complete() {
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(true));
        fs.expect_metadata().returning(|_| {
            Ok(bridge_traits::storage::FileMetadata {
                size: 0,
                created_at: None,
                modified_at: None,
                is_directory: false,
            })
        });
        fs.expect_open_read_stream()
            .returning(|_| Ok(Box::new(std::io::Cursor::new(Vec::new())) as Reader));

        let mut api = MockApi::new();
        api.expect_begin_upload().returning(|_, _, _, _| {
            Ok(UploadSession {
                upload_id: "empty".to_string(),
                total_chunks: 0,
                chunk_size: 1024,
                uploaded_chunks: vec![],
            })
        });
        api.expect_upload_chunk().never();
        api.expect_finalize_upload().returning(|_, _| {
            Ok(FinalizedUpload {
                etag: "e".to_string(),
                size: 0,
                file_id: None,
            })
        });

        let engine = UploadEngine::new(Arc::new(api), Arc::new(fs));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        engine
            .upload("dcim", "/dcim/2024/01/empty.jpg", Path::new("/e"), Some(&tx))
            .await
            .unwrap();

        assert_eq!(drain(&mut rx), vec![1.0]);
    }

    #[tokio::test]
    async fn test_session_too_small_is_server_error() {
        let mut api = MockApi::new();
        api.expect_begin_upload().returning(|_, _, _, _| {
            Ok(UploadSession {
                upload_id: "short".to_string(),
                total_chunks: 1,
                chunk_size: 4,
                uploaded_chunks: vec![],
            })
        });

        let engine = UploadEngine::new(Arc::new(api), Arc::new(file_fs()));
        let err = engine
            .upload("dcim", "/dcim/2024/01/a.jpg", Path::new("/dcim/a.jpg"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Server(_)));
    }

    #[tokio::test]
    async fn test_cancel() {
        let mut api = MockApi::new();
        api.expect_cancel_upload()
            .withf(|repo, id| repo == "dcim" && id == "up-1")
            .returning(|_, _| {
                Ok(ChunkAck {
                    success: true,
                    message: None,
                })
            });

        let engine = UploadEngine::new(Arc::new(api), Arc::new(file_fs()));
        assert!(engine.cancel("dcim", "up-1").await.is_ok());
    }
}
