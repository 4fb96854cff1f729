//! Error types for the file hub provider

use std::fmt;
use thiserror::Error;

/// The protocol exchange a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOperation {
    Begin,
    Chunk,
    Finalize,
    Cancel,
}

impl fmt::Display for UploadOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UploadOperation::Begin => "Begin upload",
            UploadOperation::Chunk => "Upload chunk",
            UploadOperation::Finalize => "Finalize upload",
            UploadOperation::Cancel => "Cancel upload",
        };
        f.write_str(label)
    }
}

/// File hub provider errors
#[derive(Error, Debug)]
pub enum FileHubError {
    /// The server answered with a non-success status
    #[error("{operation} failed: {status_code}")]
    RequestFailed {
        operation: UploadOperation,
        status_code: u16,
    },

    /// The session cookie is missing or expired
    #[error("Unauthorized - Please login again")]
    Unauthorized,

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

/// Result type for file hub operations
pub type Result<T> = std::result::Result<T, FileHubError>;

impl From<FileHubError> for bridge_traits::error::BridgeError {
    fn from(error: FileHubError) -> Self {
        let message = error.to_string();
        match error {
            FileHubError::RequestFailed { status_code, .. } => {
                bridge_traits::error::BridgeError::Http {
                    status: status_code,
                    message,
                }
            }
            FileHubError::Unauthorized => bridge_traits::error::BridgeError::Unauthorized,
            FileHubError::ParseError(msg) => {
                bridge_traits::error::BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            FileHubError::Bridge(e) => e,
        }
    }
}
