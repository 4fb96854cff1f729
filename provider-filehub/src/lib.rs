//! # File Hub Provider
//!
//! Implements [`ChunkedUploadApi`](bridge_traits::upload::ChunkedUploadApi) for a
//! file-hub server's resumable upload endpoints.
//!
//! ## Overview
//!
//! This module provides:
//! - The four-step upload protocol (begin, chunk, finalize, cancel)
//! - Session-cookie authentication
//! - Mapping of HTTP failures to [`FileHubError`] and then to `BridgeError`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use provider_filehub::FileHubConnector;
//!
//! let connector = FileHubConnector::new(http_client, "https://hub.example.com")
//!     .with_session_cookie(cookie);
//! let session = connector.begin_upload("dcim", "/dcim/2024/05/IMG_1.jpg", size, &md5_hex).await?;
//! ```

pub mod connector;
pub mod error;
pub mod types;

pub use connector::FileHubConnector;
pub use error::{FileHubError, Result, UploadOperation};
