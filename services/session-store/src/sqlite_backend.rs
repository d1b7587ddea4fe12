//! Embedded single-file backend.

use crate::config::DatabaseConfig;
use crate::record::{FlatRecord, DATA_COLUMNS};
use crate::session_store::{
    bind_flat_record, insert_statement, EmotionCount, Result, SessionBackend, SessionSummary,
    StoreError, TABLE_NAME,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS session_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        phase TEXT,
        area TEXT,
        timestamp TEXT,
        speaker TEXT,
        text TEXT,
        hmd_position_x REAL,
        hmd_position_y REAL,
        hmd_position_z REAL,
        hmd_gaze_x REAL,
        hmd_gaze_y REAL,
        hmd_gaze_z REAL,
        hmd_gaze_actor TEXT,
        hmd_movement_speed REAL,
        controller_r_x REAL,
        controller_r_y REAL,
        controller_r_z REAL,
        controller_l_x REAL,
        controller_l_y REAL,
        controller_l_z REAL,
        controller_r_actor TEXT,
        controller_l_actor TEXT,
        controller_r_speed REAL,
        controller_l_speed REAL,
        user_emotion TEXT,
        emotion_window_flag BOOLEAN,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

const CREATE_SESSION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_session_records_session_id ON session_records (session_id)";

/// SQLite-backed session storage
pub struct SqliteBackend {
    pool: SqlitePool,
    insert_sql: String,
    select_sql: String,
}

impl SqliteBackend {
    /// Open (creating if needed) the database file named in the config
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.sqlite_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connect("sqlite", e))?;

        info!(path = %config.sqlite_path, "Opened SQLite database");

        Ok(Self::from_pool(pool))
    }

    /// Private in-memory database, kept alive on a single connection
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::connect("sqlite", e))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connect("sqlite", e))?;

        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            insert_sql: insert_statement(|_| "?".to_string()),
            select_sql: format!(
                "SELECT id, {}, CAST(created_at AS TEXT) AS created_at FROM {TABLE_NAME} \
                 WHERE session_id = ? ORDER BY timestamp ASC NULLS LAST, id",
                DATA_COLUMNS.join(", ")
            ),
        }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn scalar(&self, sql: &str, context: &'static str) -> Result<i64> {
        let (value,): (i64,) = sqlx::query_as(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::query(context))?;
        Ok(value)
    }
}

#[async_trait]
impl SessionBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn create_schema(&self) -> Result<()> {
        for statement in [CREATE_TABLE, CREATE_SESSION_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Schema(e.to_string()))?;
        }
        Ok(())
    }

    async fn insert_batch(&self, records: &[FlatRecord]) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::query("Failed to begin transaction"))?;

        let mut inserted = 0;
        for record in records {
            let result = bind_flat_record!(sqlx::query(&self.insert_sql), record)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::query("Failed to insert session record"))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(StoreError::query("Failed to commit transaction"))?;

        debug!(inserted = inserted, "SQLite batch committed");

        Ok(inserted)
    }

    async fn count_records(&self) -> Result<i64> {
        self.scalar("SELECT COUNT(*) FROM session_records", "Failed to count records")
            .await
    }

    async fn count_sessions(&self) -> Result<i64> {
        self.scalar(
            "SELECT COUNT(DISTINCT session_id) FROM session_records",
            "Failed to count sessions",
        )
        .await
    }

    async fn session_summaries(&self, limit: i64, offset: i64) -> Result<Vec<SessionSummary>> {
        sqlx::query_as::<_, SessionSummary>(
            r#"
            SELECT
                session_id,
                COUNT(*) AS records,
                CAST(MIN(created_at) AS TEXT) AS created
            FROM session_records
            GROUP BY session_id
            ORDER BY MIN(created_at) DESC, session_id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query("Failed to list sessions"))
    }

    async fn session_records(&self, session_id: &str) -> Result<Vec<FlatRecord>> {
        sqlx::query_as::<_, FlatRecord>(&self.select_sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("Failed to query session records"))
    }

    async fn count_recent(&self, window_hours: u32) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM session_records WHERE created_at >= datetime('now', ?)",
        )
        .bind(format!("-{window_hours} hours"))
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::query("Failed to count recent records"))?;
        Ok(count)
    }

    async fn top_emotions(&self, limit: i64) -> Result<Vec<EmotionCount>> {
        sqlx::query_as::<_, EmotionCount>(
            r#"
            SELECT user_emotion AS emotion, COUNT(*) AS count
            FROM session_records
            WHERE user_emotion IS NOT NULL AND user_emotion != ''
            GROUP BY user_emotion
            ORDER BY count DESC, emotion
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query("Failed to rank emotions"))
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM session_records")
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("Failed to clear records"))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("Database ping failed"))?;
        Ok(())
    }
}
