//! SQLite dedup store.
//!
//! A file-based store that survives restarts. Every operation opens its own
//! connection and closes it before returning, so nothing holds the file
//! between calls and an admin tool can inspect it while the watcher runs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteSynchronous};
use sqlx::{ConnectOptions, Connection, FromRow};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::traits::BaseDedupStore;
use crate::types::ProcessedRecord;

/// SQLite-backed record of processed feed items.
pub struct SqliteDedupStore {
    path: PathBuf,
}

impl SqliteDedupStore {
    /// Point the store at `path`, creating its parent directory if needed.
    ///
    /// The database file itself is created lazily by the first connection.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> StoreResult<SqliteConnection> {
        SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Full)
            .connect()
            .await
            .map_err(StoreError::db("connect"))
    }
}

// Row type for sqlx queries
#[derive(Debug, FromRow)]
struct ProcessedRow {
    id: String,
    title: Option<String>,
    processed_at: Option<String>,
}

impl ProcessedRow {
    fn into_record(self) -> StoreResult<ProcessedRecord> {
        let raw = self.processed_at.unwrap_or_default();
        let processed_at = parse_timestamp(&raw).ok_or_else(|| StoreError::Corrupt {
            identity: self.id.clone(),
            reason: format!("invalid processed_at: {:?}", raw),
        })?;

        Ok(ProcessedRecord {
            identity: self.id,
            title: self.title.unwrap_or_default(),
            processed_at,
        })
    }
}

/// Accepts RFC 3339 and the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form older rows use.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl BaseDedupStore for SqliteDedupStore {
    async fn initialize(&self) -> StoreResult<()> {
        let mut conn = self.connect().await?;
        let result = sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_books (
                id TEXT PRIMARY KEY,
                title TEXT,
                processed_at TEXT
            )
            "#,
        )
        .execute(&mut conn)
        .await
        .map_err(StoreError::db("initialize"));

        let closed = conn.close().await.map_err(StoreError::db("close"));
        result?;
        closed
    }

    async fn is_processed(&self, identity: &str) -> StoreResult<bool> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_scalar::<_, i64>("SELECT 1 FROM processed_books WHERE id = ?")
            .bind(identity)
            .fetch_optional(&mut conn)
            .await
            .map_err(StoreError::db("is_processed"));

        let closed = conn.close().await.map_err(StoreError::db("close"));
        let found = result?;
        closed?;
        Ok(found.is_some())
    }

    async fn mark_processed(
        &self,
        identity: &str,
        title: &str,
        processed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut conn = self.connect().await?;
        let result = sqlx::query(
            "INSERT OR REPLACE INTO processed_books (id, title, processed_at) VALUES (?, ?, ?)",
        )
        .bind(identity)
        .bind(title)
        .bind(processed_at.to_rfc3339())
        .execute(&mut conn)
        .await
        .map_err(StoreError::db("mark_processed"));

        let closed = conn.close().await.map_err(StoreError::db("close"));
        result?;
        closed
    }

    async fn get(&self, identity: &str) -> StoreResult<Option<ProcessedRecord>> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_as::<_, ProcessedRow>(
            "SELECT id, title, processed_at FROM processed_books WHERE id = ?",
        )
        .bind(identity)
        .fetch_optional(&mut conn)
        .await
        .map_err(StoreError::db("get"));

        let closed = conn.close().await.map_err(StoreError::db("close"));
        let row = result?;
        closed?;
        row.map(ProcessedRow::into_record).transpose()
    }

    async fn count(&self) -> StoreResult<usize> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM processed_books")
            .fetch_one(&mut conn)
            .await
            .map_err(StoreError::db("count"));

        let closed = conn.close().await.map_err(StoreError::db("close"));
        let count = result?;
        closed?;
        Ok(count as usize)
    }
}
