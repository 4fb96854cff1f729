//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `MediaStore` as a recursive walk of a camera directory
//! - `NetworkMonitor` as a TCP probe of the sync server
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DirectoryMediaStore, ReqwestHttpClient, TokioFileSystem};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let fs = TokioFileSystem::new();
//! let media = DirectoryMediaStore::new("/home/me/Pictures/DCIM");
//! ```

mod filesystem;
mod http;
mod media_store;
mod network;

pub use filesystem::TokioFileSystem;
pub use http::{ReqwestHttpClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use media_store::DirectoryMediaStore;
pub use network::DesktopNetworkMonitor;
