//! # Sync State Repository
//!
//! Persistence for [`SyncStateRecord`]s.
//!
//! ## Overview
//!
//! Every mutation is a single SQL statement (or one transaction for batch
//! inserts), so readers never see a half-written row. Mutations also bump a
//! change counter that drives the live feeds returned by `watch_*`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::repository::{SqliteSyncStateRepository, SyncStateRepository};
//!
//! let repo = SqliteSyncStateRepository::new(pool);
//! let id = repo.insert(&record).await?;
//! if repo.try_mark_uploading(id).await? {
//!     // this caller owns the upload attempt
//! }
//! ```

use crate::state::{SyncStateRecord, SyncStats, SyncStatus};
use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

const COLUMNS: &str = "id, local_path, file_name, server_path, file_size, fingerprint, mime_type, \
     date_taken, is_video, status, retry_count, last_error, server_file_id, server_etag, \
     created_at, updated_at";

/// Sync state persistence operations
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Insert a record, replacing any existing row with the same local path.
    /// Returns the stored id.
    async fn insert(&self, record: &SyncStateRecord) -> Result<i64>;

    /// Insert several records in one transaction
    async fn insert_many(&self, records: &[SyncStateRecord]) -> Result<Vec<i64>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<SyncStateRecord>>;

    async fn find_by_local_path(&self, local_path: &str) -> Result<Option<SyncStateRecord>>;

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SyncStateRecord>>;

    /// Records in any of `statuses`, newest capture first
    async fn find_by_statuses(
        &self,
        statuses: &[SyncStatus],
        limit: Option<u32>,
    ) -> Result<Vec<SyncStateRecord>>;

    /// Every record, newest capture first
    async fn find_all(&self) -> Result<Vec<SyncStateRecord>>;

    async fn count_by_status(&self, status: SyncStatus) -> Result<u64>;

    /// Counts for every status taken from one query
    async fn stats(&self) -> Result<SyncStats>;

    /// Latest capture time among synced records
    async fn max_synced_date_taken(&self) -> Result<Option<i64>>;

    /// Set status. Returns `false` when no record has this id.
    async fn update_status(&self, id: i64, status: SyncStatus) -> Result<bool>;

    /// Set `Failed`, store the error and increment the retry count.
    /// Returns the new retry count, or `None` when no record has this id.
    async fn mark_failed(&self, id: i64, error: &str) -> Result<Option<u32>>;

    /// Set `Synced` with the server's file id and etag
    async fn mark_synced(&self, id: i64, server_file_id: Option<i64>, etag: &str)
        -> Result<bool>;

    /// Replace every column of an existing record
    async fn update(&self, record: &SyncStateRecord) -> Result<bool>;

    /// Move a `Pending` or `Failed` record to `Uploading`.
    ///
    /// Returns `false` if the record is in any other status, so at most one
    /// caller can own an upload attempt.
    async fn try_mark_uploading(&self, id: i64) -> Result<bool>;

    /// Move every record in `from` to `to`. Returns the number moved.
    async fn transition_all(&self, from: SyncStatus, to: SyncStatus) -> Result<u64>;

    async fn delete_by_status(&self, status: SyncStatus) -> Result<u64>;

    async fn delete_by_local_path(&self, local_path: &str) -> Result<bool>;

    /// Live feed of all records. Yields the current list, then a fresh one
    /// after each committed change.
    fn watch_records(&self) -> BoxStream<'static, Result<Vec<SyncStateRecord>>>;

    /// Live feed of the number of records in `status`
    fn watch_count(&self, status: SyncStatus) -> BoxStream<'static, Result<u64>>;

    /// Live feed of [`SyncStats`]
    fn watch_stats(&self) -> BoxStream<'static, Result<SyncStats>>;
}

/// SQLite implementation of the sync state repository
pub struct SqliteSyncStateRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    changes: watch::Sender<u64>,
}

impl SqliteSyncStateRepository {
    /// Create a new repository over a migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Create a repository with an injected time source for timestamps
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            pool,
            clock,
            changes,
        }
    }

    fn now(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn notify_if(&self, changed: bool) -> bool {
        if changed {
            self.notify();
        }
        changed
    }

    fn feed<T, Q, Fut>(&self, query: Q) -> BoxStream<'static, Result<T>>
    where
        T: Send + 'static,
        Q: Fn(SqlitePool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let state = FeedState {
            pool: self.pool.clone(),
            changes: self.changes.subscribe(),
            query,
            primed: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.primed && state.changes.changed().await.is_err() {
                return None;
            }
            state.primed = true;
            let snapshot = (state.query)(state.pool.clone()).await;
            Some((snapshot, state))
        })
        .boxed()
    }
}

struct FeedState<Q> {
    pool: SqlitePool,
    changes: watch::Receiver<u64>,
    query: Q,
    primed: bool,
}

fn db_err(e: sqlx::Error) -> SyncError {
    SyncError::Database(e.to_string())
}

fn row_to_record(row: &SqliteRow) -> Result<SyncStateRecord> {
    Ok(SyncStateRecord {
        id: row.try_get("id").map_err(db_err)?,
        local_path: row.try_get("local_path").map_err(db_err)?,
        file_name: row.try_get("file_name").map_err(db_err)?,
        server_path: row.try_get("server_path").map_err(db_err)?,
        file_size: row.try_get::<i64, _>("file_size").map_err(db_err)?.max(0) as u64,
        fingerprint: row.try_get("fingerprint").map_err(db_err)?,
        mime_type: row.try_get("mime_type").map_err(db_err)?,
        date_taken: row.try_get("date_taken").map_err(db_err)?,
        is_video: row.try_get("is_video").map_err(db_err)?,
        status: row.try_get::<String, _>("status").map_err(db_err)?.parse()?,
        retry_count: row.try_get::<i64, _>("retry_count").map_err(db_err)?.max(0) as u32,
        last_error: row.try_get("last_error").map_err(db_err)?,
        server_file_id: row.try_get("server_file_id").map_err(db_err)?,
        server_etag: row.try_get("server_etag").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn insert_query(record: &SyncStateRecord) -> SqliteQuery<'_> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO sync_state (
            id, local_path, file_name, server_path, file_size, fingerprint, mime_type,
            date_taken, is_video, status, retry_count, last_error, server_file_id,
            server_etag, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.is_persisted().then_some(record.id))
    .bind(&record.local_path)
    .bind(&record.file_name)
    .bind(&record.server_path)
    .bind(record.file_size as i64)
    .bind(&record.fingerprint)
    .bind(&record.mime_type)
    .bind(record.date_taken)
    .bind(record.is_video)
    .bind(record.status.as_str())
    .bind(record.retry_count as i64)
    .bind(&record.last_error)
    .bind(record.server_file_id)
    .bind(&record.server_etag)
    .bind(record.created_at)
    .bind(record.updated_at)
}

async fn fetch_all(pool: &SqlitePool) -> Result<Vec<SyncStateRecord>> {
    let sql = format!(
        "SELECT {} FROM sync_state ORDER BY date_taken DESC, id DESC",
        COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await.map_err(db_err)?;
    rows.iter().map(row_to_record).collect()
}

async fn fetch_count(pool: &SqlitePool, status: SyncStatus) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_state WHERE status = ?")
        .bind(status.as_str())
        .fetch_one(pool)
        .await
        .map_err(db_err)?;
    Ok(count as u64)
}

async fn fetch_stats(pool: &SqlitePool) -> Result<SyncStats> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM sync_state GROUP BY status")
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

    let mut counts = Vec::with_capacity(rows.len());
    for row in rows {
        let status: SyncStatus = row.try_get::<String, _>("status").map_err(db_err)?.parse()?;
        let count: i64 = row.try_get("count").map_err(db_err)?;
        counts.push((status, count as u64));
    }
    Ok(SyncStats::from_counts(counts))
}

async fn fetch_one_where(
    pool: &SqlitePool,
    column: &str,
    value: &str,
) -> Result<Option<SyncStateRecord>> {
    let sql = format!(
        "SELECT {} FROM sync_state WHERE {} = ? ORDER BY id LIMIT 1",
        COLUMNS, column
    );
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;
    row.as_ref().map(row_to_record).transpose()
}

#[async_trait]
impl SyncStateRepository for SqliteSyncStateRepository {
    async fn insert(&self, record: &SyncStateRecord) -> Result<i64> {
        let result = insert_query(record)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        self.notify();
        Ok(result.last_insert_rowid())
    }

    async fn insert_many(&self, records: &[SyncStateRecord]) -> Result<Vec<i64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let result = insert_query(record).execute(&mut *tx).await.map_err(db_err)?;
            ids.push(result.last_insert_rowid());
        }
        tx.commit().await.map_err(db_err)?;

        debug!(count = ids.len(), "Inserted sync records");
        self.notify();
        Ok(ids)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<SyncStateRecord>> {
        let sql = format!("SELECT {} FROM sync_state WHERE id = ?", COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_by_local_path(&self, local_path: &str) -> Result<Option<SyncStateRecord>> {
        fetch_one_where(&self.pool, "local_path", local_path).await
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SyncStateRecord>> {
        fetch_one_where(&self.pool, "fingerprint", fingerprint).await
    }

    async fn find_by_statuses(
        &self,
        statuses: &[SyncStatus],
        limit: Option<u32>,
    ) -> Result<Vec<SyncStateRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let mut sql = format!(
            "SELECT {} FROM sync_state WHERE status IN ({}) ORDER BY date_taken DESC, id DESC",
            COLUMNS, placeholders
        );
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        if let Some(limit) = limit {
            query = query.bind(limit as i64);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn find_all(&self) -> Result<Vec<SyncStateRecord>> {
        fetch_all(&self.pool).await
    }

    async fn count_by_status(&self, status: SyncStatus) -> Result<u64> {
        fetch_count(&self.pool, status).await
    }

    async fn stats(&self) -> Result<SyncStats> {
        fetch_stats(&self.pool).await
    }

    async fn max_synced_date_taken(&self) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT MAX(date_taken) FROM sync_state WHERE status = 'synced'")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn update_status(&self, id: i64, status: SyncStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE sync_state SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(self.now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(self.notify_if(result.rows_affected() > 0))
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<Option<u32>> {
        let retry_count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE sync_state SET
                status = 'failed',
                last_error = ?,
                retry_count = retry_count + 1,
                updated_at = ?
            WHERE id = ?
            RETURNING retry_count
            "#,
        )
        .bind(error)
        .bind(self.now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        self.notify_if(retry_count.is_some());
        Ok(retry_count.map(|count| count.max(0) as u32))
    }

    async fn mark_synced(
        &self,
        id: i64,
        server_file_id: Option<i64>,
        etag: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_state SET
                status = 'synced',
                server_file_id = ?,
                server_etag = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(server_file_id)
        .bind(etag)
        .bind(self.now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(self.notify_if(result.rows_affected() > 0))
    }

    async fn update(&self, record: &SyncStateRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_state SET
                local_path = ?,
                file_name = ?,
                server_path = ?,
                file_size = ?,
                fingerprint = ?,
                mime_type = ?,
                date_taken = ?,
                is_video = ?,
                status = ?,
                retry_count = ?,
                last_error = ?,
                server_file_id = ?,
                server_etag = ?,
                created_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.local_path)
        .bind(&record.file_name)
        .bind(&record.server_path)
        .bind(record.file_size as i64)
        .bind(&record.fingerprint)
        .bind(&record.mime_type)
        .bind(record.date_taken)
        .bind(record.is_video)
        .bind(record.status.as_str())
        .bind(record.retry_count as i64)
        .bind(&record.last_error)
        .bind(record.server_file_id)
        .bind(&record.server_etag)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(self.notify_if(result.rows_affected() > 0))
    }

    async fn try_mark_uploading(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_state SET status = 'uploading', updated_at = ?
            WHERE id = ? AND status IN ('pending', 'failed')
            "#,
        )
        .bind(self.now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(self.notify_if(result.rows_affected() == 1))
    }

    async fn transition_all(&self, from: SyncStatus, to: SyncStatus) -> Result<u64> {
        let result =
            sqlx::query("UPDATE sync_state SET status = ?, updated_at = ? WHERE status = ?")
                .bind(to.as_str())
                .bind(self.now())
                .bind(from.as_str())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        let moved = result.rows_affected();
        self.notify_if(moved > 0);
        Ok(moved)
    }

    async fn delete_by_status(&self, status: SyncStatus) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sync_state WHERE status = ?")
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let deleted = result.rows_affected();
        self.notify_if(deleted > 0);
        Ok(deleted)
    }

    async fn delete_by_local_path(&self, local_path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sync_state WHERE local_path = ?")
            .bind(local_path)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(self.notify_if(result.rows_affected() > 0))
    }

    fn watch_records(&self) -> BoxStream<'static, Result<Vec<SyncStateRecord>>> {
        self.feed(|pool| async move { fetch_all(&pool).await })
    }

    fn watch_count(&self, status: SyncStatus) -> BoxStream<'static, Result<u64>> {
        self.feed(move |pool| async move { fetch_count(&pool, status).await })
    }

    fn watch_stats(&self) -> BoxStream<'static, Result<SyncStats>> {
        self.feed(|pool| async move { fetch_stats(&pool).await })
    }
}
