//! Local media files discovered by the scanner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A photo or video found on the device during one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMediaFile {
    /// Media store id
    pub id: i64,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
    /// Capture time in milliseconds since the Unix epoch
    pub date_taken: i64,
    /// Cheap change detector: `{size}_{hex of first 8 bytes}_{mtime millis}`
    pub fingerprint: String,
    pub is_video: bool,
}

impl LocalMediaFile {
    /// Server path `/{repo}/{yyyy}/{MM}/{name}`, dated by capture time in UTC
    pub fn server_path(&self, repo: &str) -> String {
        let taken = DateTime::<Utc>::from_timestamp_millis(self.date_taken).unwrap_or_default();
        format!("/{}/{}/{}", repo, taken.format("%Y/%m"), self.name)
    }

    pub fn local_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Whether a MIME type denotes a video
pub fn is_video_mime(mime_type: &str) -> bool {
    mime_type.starts_with("video/")
}
