//! # Core Configuration Module
//!
//! Provides configuration management for the sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the server endpoint, the state database location and the
//! host bridges the sync engine runs on. It enforces fail-fast validation so a
//! misconfigured host fails at startup rather than on the first upload.
//!
//! ## Required Capabilities (with desktop defaults)
//!
//! - `HttpClient` - talks to the file hub (desktop default: reqwest)
//! - `FileSystemAccess` - reads local media (desktop default: tokio fs)
//! - `MediaStore` - the device's media index (desktop default: a walk of `media_root`)
//!
//! ## Optional Capabilities
//!
//! - `NetworkMonitor` - connectivity and metered detection
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .server_url("https://files.example.com")
//!     .database_path("/var/lib/dcim-sync/state.db")
//!     .media_root("/home/me/Pictures/DCIM")
//!     .session_cookie("sid=abc123")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient, MediaStore, NetworkMonitor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Core configuration for the sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the file hub, without a trailing slash
    pub server_url: String,

    /// Path to the SQLite state database
    pub database_path: PathBuf,

    /// Root of the local camera directory (desktop media store)
    pub media_root: Option<PathBuf>,

    /// Session cookie sent with every file hub request
    pub session_cookie: Option<String>,

    pub connect_timeout: Duration,
    pub request_timeout: Duration,

    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub media_store: Arc<dyn MediaStore>,

    /// Network connectivity monitor (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("server_url", &self.server_url)
            .field("database_path", &self.database_path)
            .field("media_root", &self.media_root)
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "[REDACTED]"),
            )
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("media_store", &"MediaStore { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Gate uploads on connectivity (requires NetworkMonitor)
    pub enable_network_awareness: bool,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The server URL is an http(s) URL
    /// - Database path is not empty
    /// - Timeouts are non-zero
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        validate_server_url(&self.server_url)?;

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Connect and request timeouts must be greater than zero".to_string(),
            ));
        }

        if let Some(cookie) = &self.session_cookie {
            if cookie.trim().is_empty() {
                return Err(Error::Config(
                    "Session cookie cannot be blank. Omit it instead.".to_string(),
                ));
            }
        }

        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_server_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            Error::Config(format!(
                "Server URL must start with http:// or https://, got '{}'",
                url
            ))
        })?;

    if rest.is_empty() {
        return Err(Error::Config("Server URL has no host".to_string()));
    }
    Ok(())
}

// ============================================================================
// Platform defaults
// ============================================================================

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default. \
             Android: inject the platform implementation through the builder.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeouts(connect_timeout, request_timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(
    _connect_timeout: Duration,
    _request_timeout: Duration,
) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", "file hub requests"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing("FileSystemAccess", "reading local media"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_media_store(media_root: Option<&PathBuf>) -> Result<Arc<dyn MediaStore>> {
    match media_root {
        Some(root) => Ok(Arc::new(bridge_desktop::DirectoryMediaStore::new(root))),
        None => Err(Error::CapabilityMissing {
            capability: "MediaStore".to_string(),
            message: "The desktop media store walks a camera directory. \
                      Set .media_root() or inject a MediaStore implementation."
                .to_string(),
        }),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_media_store(_media_root: Option<&PathBuf>) -> Result<Arc<dyn MediaStore>> {
    Err(capability_missing("MediaStore", "discovering photos and videos"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor(server_url: &str) -> Result<Arc<dyn NetworkMonitor>> {
    let monitor = bridge_desktop::DesktopNetworkMonitor::new(server_url)
        .map_err(|e| Error::Config(format!("Cannot monitor server reachability: {}", e)))?;
    Ok(Arc::new(monitor))
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for constructing [`CoreConfig`] instances.
///
/// Missing bridges are filled with platform defaults where the build has
/// them; otherwise [`build()`](CoreConfigBuilder::build) fails with
/// [`Error::CapabilityMissing`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    server_url: Option<String>,
    database_path: Option<PathBuf>,
    media_root: Option<PathBuf>,
    session_cookie: Option<String>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    media_store: Option<Arc<dyn MediaStore>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the file hub base URL. A trailing slash is dropped.
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn media_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.media_root = Some(path.into());
        self
    }

    pub fn session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn media_store(mut self, store: Arc<dyn MediaStore>) -> Self {
        self.media_store = Some(store);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Enables network-aware uploads.
    ///
    /// With `desktop-shims` a server reachability probe is injected when no
    /// monitor was provided.
    pub fn enable_network_awareness(mut self, enabled: bool) -> Self {
        self.features.enable_network_awareness = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `Error::Config` when the server URL or database path is missing or
    ///   invalid, or feature flags are inconsistent with the bridges
    /// - `Error::CapabilityMissing` when a required bridge has no default
    pub fn build(self) -> Result<CoreConfig> {
        let server_url = self.server_url.ok_or_else(|| {
            Error::Config("Server URL is required. Use .server_url() to set it.".to_string())
        })?;
        let server_url = server_url.trim_end_matches('/').to_string();
        validate_server_url(&server_url)?;

        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(connect_timeout, request_timeout)?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let media_store = match self.media_store {
            Some(store) => store,
            None => provide_default_media_store(self.media_root.as_ref())?,
        };

        #[cfg(feature = "desktop-shims")]
        let network_monitor = match self.network_monitor {
            Some(monitor) => Some(monitor),
            None if self.features.enable_network_awareness => {
                Some(provide_default_network_monitor(&server_url)?)
            }
            None => None,
        };
        #[cfg(not(feature = "desktop-shims"))]
        let network_monitor = self.network_monitor;

        let config = CoreConfig {
            server_url,
            database_path,
            media_root: self.media_root,
            session_cookie: self.session_cookie,
            connect_timeout,
            request_timeout,
            http_client,
            file_system,
            media_store,
            network_monitor,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        BridgeError, FileMetadata, HttpRequest, HttpResponse, MediaCollection, MediaStoreEntry,
        NetworkInfo, NetworkType,
    };
    use bytes::Bytes;
    use std::path::Path;

    type BridgeResult<T> = std::result::Result<T, BridgeError>;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::NotAvailable("mock".to_string()))
        }
    }

    struct MockFileSystem;

    #[async_trait]
    impl FileSystemAccess for MockFileSystem {
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            Err(BridgeError::NotAvailable("mock".to_string()))
        }

        async fn read_range(&self, _path: &Path, _offset: u64, _len: u64) -> BridgeResult<Bytes> {
            Ok(Bytes::new())
        }

        async fn open_read_stream(
            &self,
            _path: &Path,
        ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            Err(BridgeError::NotAvailable("mock".to_string()))
        }
    }

    struct MockMediaStore;

    #[async_trait]
    impl MediaStore for MockMediaStore {
        async fn query(
            &self,
            _collection: MediaCollection,
            _since: i64,
            _limit: usize,
        ) -> BridgeResult<Vec<MediaStoreEntry>> {
            Ok(Vec::new())
        }
    }

    struct MockNetworkMonitor;

    #[async_trait]
    impl NetworkMonitor for MockNetworkMonitor {
        async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
            Ok(NetworkInfo::connected(NetworkType::WiFi))
        }
    }

    fn mocked() -> CoreConfigBuilder {
        CoreConfig::builder()
            .server_url("https://files.example.com")
            .database_path("/tmp/dcim-sync.db")
            .http_client(Arc::new(MockHttpClient))
            .file_system(Arc::new(MockFileSystem))
            .media_store(Arc::new(MockMediaStore))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = mocked().build().unwrap();

        assert_eq!(config.server_url, "https://files.example.com");
        assert_eq!(config.database_path, PathBuf::from("/tmp/dcim-sync.db"));
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.network_monitor.is_none());
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let config = mocked()
            .server_url("http://192.168.1.20:8080/")
            .build()
            .unwrap();
        assert_eq!(config.server_url, "http://192.168.1.20:8080");
    }

    #[test]
    fn test_builder_requires_server_url() {
        let result = CoreConfig::builder()
            .database_path("/tmp/dcim-sync.db")
            .http_client(Arc::new(MockHttpClient))
            .file_system(Arc::new(MockFileSystem))
            .media_store(Arc::new(MockMediaStore))
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Server URL is required"));
    }

    #[test]
    fn test_builder_rejects_non_http_url() {
        for url in ["ftp://files.example.com", "files.example.com", "https://", "https:///"] {
            let result = mocked().server_url(url).build();
            assert!(matches!(result, Err(Error::Config(_))), "accepted {}", url);
        }
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder()
            .server_url("https://files.example.com")
            .http_client(Arc::new(MockHttpClient))
            .file_system(Arc::new(MockFileSystem))
            .media_store(Arc::new(MockMediaStore))
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database path is required"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = mocked().request_timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_cookie() {
        let result = mocked().session_cookie("  ").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_network_awareness_with_monitor() {
        let config = mocked()
            .network_monitor(Arc::new(MockNetworkMonitor))
            .enable_network_awareness(true)
            .build()
            .unwrap();

        assert!(config.features.enable_network_awareness);
        assert!(config.network_monitor.is_some());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_validate_network_awareness_requires_monitor() {
        let result = mocked().enable_network_awareness(true).build();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("no NetworkMonitor provided"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_bridges_are_capability_errors() {
        let result = CoreConfig::builder()
            .server_url("https://files.example.com")
            .database_path("/tmp/dcim-sync.db")
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .server_url("https://files.example.com")
            .database_path("/tmp/dcim-sync.db")
            .media_root("/tmp")
            .enable_network_awareness(true)
            .build()
            .expect("desktop defaults should succeed");

        assert!(config.network_monitor.is_some());
        assert_eq!(config.media_root, Some(PathBuf::from("/tmp")));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_media_store_requires_root() {
        let result = CoreConfig::builder()
            .server_url("https://files.example.com")
            .database_path("/tmp/dcim-sync.db")
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, message }) => {
                assert_eq!(capability, "MediaStore");
                assert!(message.contains(".media_root()"));
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_session_cookie() {
        let config = mocked().session_cookie("sid=secret-value").build().unwrap();
        let rendered = format!("{:?}", config);

        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret-value"));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = mocked().build().unwrap();
        let cloned = config.clone();
        assert_eq!(config.server_url, cloned.server_url);
        assert!(Arc::ptr_eq(&config.media_store, &cloned.media_store));
    }
}
