//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! media index, network monitor) into the sync engine. Desktop apps typically
//! enable the `desktop-shims` feature, which lets `CoreConfig` fill missing
//! bridges from `bridge-desktop`. Android hosts inject their own.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::SyncService;
//! use core_sync::SyncConfig;
//!
//! let config = CoreConfig::builder()
//!     .server_url("https://hub.example.com")
//!     .database_path("/var/lib/dcim-sync/state.db")
//!     .media_root("/home/me/Pictures/DCIM")
//!     .build()?;
//!
//! let service = SyncService::bootstrap(config, SyncConfig::default()).await?;
//! let report = service.run_sync(None).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use core_sync::{
    create_pool, DatabaseConfig, MediaScanner, SqliteSyncStateRepository, SyncConfig,
    SyncCoordinator, SyncRunReport, SyncStateRepository, SyncUpdate, UploadEngine,
};
use provider_filehub::FileHubConnector;
use sqlx::SqlitePool;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
///
/// Owns the state database pool and the event bus, and hands out the
/// coordinator for anything beyond the scheduled unit of work.
pub struct SyncService {
    coordinator: Arc<SyncCoordinator>,
    event_bus: EventBus,
    pool: SqlitePool,
}

impl SyncService {
    /// Open the state database and assemble the sync pipeline.
    ///
    /// # Errors
    ///
    /// - `CoreError::Sync` if `sync_config` is invalid or the database
    ///   cannot be opened or migrated
    #[instrument(skip_all, fields(server = %core_config.server_url, repo = %sync_config.repo_name))]
    pub async fn bootstrap(core_config: CoreConfig, sync_config: SyncConfig) -> Result<Self> {
        sync_config.validate()?;

        let pool = create_pool(DatabaseConfig::new(&core_config.database_path)).await?;
        let repository: Arc<dyn SyncStateRepository> =
            Arc::new(SqliteSyncStateRepository::new(pool.clone()));

        let scanner = MediaScanner::new(
            Arc::clone(&core_config.media_store),
            Arc::clone(&core_config.file_system),
        );

        let mut connector =
            FileHubConnector::new(Arc::clone(&core_config.http_client), &core_config.server_url)
                .with_request_timeout(core_config.request_timeout);
        if let Some(cookie) = &core_config.session_cookie {
            connector = connector.with_session_cookie(cookie.clone());
        }

        let engine = UploadEngine::new(Arc::new(connector), Arc::clone(&core_config.file_system))
            .with_hash_buffer_size(sync_config.hash_buffer_size);

        let event_bus = EventBus::default();
        let coordinator = SyncCoordinator::new(
            sync_config,
            repository,
            scanner,
            engine,
            Arc::clone(&core_config.file_system),
            event_bus.clone(),
            core_config.network_monitor.clone(),
        )?;

        info!(
            network_aware = core_config.network_monitor.is_some(),
            "Sync service ready"
        );

        Ok(Self {
            coordinator: Arc::new(coordinator),
            event_bus,
            pool,
        })
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Subscribe to sync and queue events emitted from now on
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// The scheduler's unit of work: scan, then upload one batch.
    pub async fn run_sync(
        &self,
        updates: Option<UnboundedSender<SyncUpdate>>,
    ) -> Result<SyncRunReport> {
        let config = self.coordinator.config();
        let report = self
            .coordinator
            .run_sync(&config.repo_name, config.batch_size, updates)
            .await?;
        Ok(report)
    }

    /// Close the state database. In-flight operations finish first.
    pub async fn shutdown(self) {
        self.pool.close().await;
        info!("Sync service stopped");
    }
}
