//! Media Store Implementation over a directory tree

use crate::filesystem::epoch_millis;
use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{MediaCollection, MediaStore, MediaStoreEntry},
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("dng", "image/x-adobe-dng"),
];

const VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("3gp", "video/3gpp"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
];

/// Media index built by walking a camera directory
///
/// Files are classified by extension. The modification time stands in for
/// the capture time, and the id is derived from the path so it stays stable
/// across walks. Hidden files and directories (such as `.thumbnails`) are
/// skipped.
pub struct DirectoryMediaStore {
    root: PathBuf,
}

impl DirectoryMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn walk(&self, collection: MediaCollection) -> Result<Vec<MediaStoreEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut listing = match fs::read_dir(&dir).await {
                Ok(listing) => listing,
                Err(e) if dir == self.root => return Err(BridgeError::Io(e)),
                Err(e) => {
                    warn!(dir = ?dir, error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            while let Some(item) = listing.next_entry().await? {
                let name = item.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let metadata = match item.metadata().await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        debug!(file = %name, error = %e, "Skipping entry without metadata");
                        continue;
                    }
                };

                let path = item.path();
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some((found, mime_type)) = classify(&path) else {
                    continue;
                };
                if found != collection {
                    continue;
                }

                entries.push(MediaStoreEntry {
                    id: stable_id(&path),
                    display_name: name,
                    size: metadata.len(),
                    mime_type: mime_type.to_string(),
                    date_taken: epoch_millis(metadata.modified()).unwrap_or(0),
                    path,
                });
            }
        }

        Ok(entries)
    }
}

fn classify(path: &Path) -> Option<(MediaCollection, &'static str)> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let lookup = |table: &[(&str, &'static str)]| {
        table
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, mime)| *mime)
    };

    lookup(IMAGE_TYPES)
        .map(|mime| (MediaCollection::Images, mime))
        .or_else(|| lookup(VIDEO_TYPES).map(|mime| (MediaCollection::Videos, mime)))
}

/// Positive id from the first eight bytes of the path's SHA-256
fn stable_id(path: &Path) -> i64 {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) >> 1) as i64
}

#[async_trait]
impl MediaStore for DirectoryMediaStore {
    async fn query(
        &self,
        collection: MediaCollection,
        since: i64,
        limit: usize,
    ) -> Result<Vec<MediaStoreEntry>> {
        let mut entries = self.walk(collection).await?;
        if since > 0 {
            entries.retain(|entry| entry.date_taken > since);
        }
        entries.sort_by(|a, b| b.date_taken.cmp(&a.date_taken).then(a.path.cmp(&b.path)));
        entries.truncate(limit);

        debug!(
            root = ?self.root,
            collection = ?collection,
            found = entries.len(),
            "Media directory scanned"
        );
        Ok(entries)
    }
}
