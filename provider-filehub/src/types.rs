//! File hub wire types
//!
//! JSON bodies returned by the `/api/files/{repo}/upload/*` endpoints.

use bridge_traits::upload::{ChunkAck, FinalizedUpload, UploadSession};
use serde::{Deserialize, Serialize};

/// `POST .../upload/begin` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginUploadResponse {
    pub upload_id: String,
    pub total_chunks: u32,
    pub chunk_size: u64,
    /// Chunks already stored for a resumed session
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
}

/// `PUT .../upload/chunk` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadChunkResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST .../upload/finalize` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeUploadResponse {
    pub etag: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
}

/// `POST .../upload/cancel` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelUploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<BeginUploadResponse> for UploadSession {
    fn from(response: BeginUploadResponse) -> Self {
        UploadSession {
            upload_id: response.upload_id,
            total_chunks: response.total_chunks,
            chunk_size: response.chunk_size,
            uploaded_chunks: response.uploaded_chunks,
        }
    }
}

impl From<UploadChunkResponse> for ChunkAck {
    fn from(response: UploadChunkResponse) -> Self {
        ChunkAck {
            success: response.success,
            message: response.message,
        }
    }
}

impl From<CancelUploadResponse> for ChunkAck {
    fn from(response: CancelUploadResponse) -> Self {
        ChunkAck {
            success: response.success,
            message: response.message,
        }
    }
}

impl From<FinalizeUploadResponse> for FinalizedUpload {
    fn from(response: FinalizeUploadResponse) -> Self {
        FinalizedUpload {
            etag: response.etag,
            size: response.size,
            file_id: response.file_id,
        }
    }
}
