//! Local Media Store Abstraction
//!
//! The device's media index (Android MediaStore, a DCIM directory walk on
//! desktop). The sync engine only ever queries it; it never writes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Which media collection to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaCollection {
    Images,
    Videos,
}

/// One row of the media index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStoreEntry {
    /// Store-assigned identifier, stable for the lifetime of the entry
    pub id: i64,
    pub display_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
    /// Capture time in milliseconds since the Unix epoch
    pub date_taken: i64,
}

/// Media index query trait
///
/// Implementations must:
/// - return only entries with `date_taken > since` when `since > 0`
/// - order results by `date_taken`, newest first
/// - return at most `limit` entries
///
/// An unreachable index is reported as an error. Entries whose backing
/// file has disappeared may still be returned; callers check existence.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::media::{MediaCollection, MediaStore};
///
/// async fn newest_photo(store: &dyn MediaStore) -> Result<Option<MediaStoreEntry>> {
///     Ok(store.query(MediaCollection::Images, 0, 1).await?.into_iter().next())
/// }
/// ```
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn query(
        &self,
        collection: MediaCollection,
        since: i64,
        limit: usize,
    ) -> Result<Vec<MediaStoreEntry>>;
}
