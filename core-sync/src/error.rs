use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The local media store could not be queried.
    #[error("Media scan failed: {0}")]
    Scan(String),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Chunk {index} rejected: {message}")]
    ChunkRejected { index: u32, message: String },

    #[error("Failed to read {path}: {message}")]
    LocalRead { path: String, message: String },

    #[error("Sync already in progress")]
    SyncInProgress,

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Sync record {id} not found")]
    RecordNotFound { id: i64 },

    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),

    #[error("Invalid sync configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl SyncError {
    /// Errors that only concern one file and are recorded on its sync record.
    ///
    /// Everything else means the store, media index or runtime is unusable
    /// and is returned to the caller.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            SyncError::FileNotFound { .. }
                | SyncError::Network(_)
                | SyncError::Server(_)
                | SyncError::ChunkRejected { .. }
                | SyncError::LocalRead { .. }
        )
    }

    /// Classify a failed protocol exchange.
    pub(crate) fn from_exchange(error: BridgeError) -> Self {
        match error {
            BridgeError::Network(msg) => SyncError::Network(msg),
            BridgeError::Io(e) => SyncError::Network(e.to_string()),
            other => SyncError::Server(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
