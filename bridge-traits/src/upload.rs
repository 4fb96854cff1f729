//! Chunked Upload Protocol
//!
//! The remote side of a resumable upload: a session is opened with `begin`,
//! fed chunk by chunk, then closed by `finalize` or abandoned with `cancel`.
//! The server picks the chunk size and reports which chunks it already holds,
//! which is how an interrupted upload resumes.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Server reply to a begin request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub upload_id: String,
    pub total_chunks: u32,
    pub chunk_size: u64,
    /// Chunk indices the server already has from an earlier attempt
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
}

/// Server reply to a chunk or cancel request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAck {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Server reply to a finalize request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedUpload {
    pub etag: String,
    pub size: u64,
    #[serde(default)]
    pub file_id: Option<i64>,
}

/// Remote chunked-upload API
///
/// `repo` is the target repository and `path` the absolute server path of the
/// file inside it. `checksum` is the lowercase hex MD5 of the whole file.
#[async_trait]
pub trait ChunkedUploadApi: Send + Sync {
    async fn begin_upload(
        &self,
        repo: &str,
        path: &str,
        size: u64,
        checksum: &str,
    ) -> Result<UploadSession>;

    async fn upload_chunk(
        &self,
        repo: &str,
        upload_id: &str,
        index: u32,
        data: Bytes,
    ) -> Result<ChunkAck>;

    async fn finalize_upload(&self, repo: &str, upload_id: &str) -> Result<FinalizedUpload>;

    async fn cancel_upload(&self, repo: &str, upload_id: &str) -> Result<ChunkAck>;
}
