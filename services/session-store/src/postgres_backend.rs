//! Networked PostgreSQL backend.
//!
//! The schema keeps single-precision `REAL` columns and a `SERIAL` key, so
//! reads widen them (`DOUBLE PRECISION`, `BIGINT`) to the shared record
//! types. `REAL` values widen through their shortest text form so a stored
//! `1.1` reads back as `1.1`, as it does from SQLite. `created_at` is read
//! back as text and normalized by the store. Text sort keys use the `C`
//! collation to match SQLite's byte-wise ordering.

use crate::config::DatabaseConfig;
use crate::record::{FlatRecord, DATA_COLUMNS, REAL_COLUMNS};
use crate::session_store::{
    bind_flat_record, insert_statement, EmotionCount, Result, SessionBackend, SessionSummary,
    StoreError, TABLE_NAME,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS session_records (
        id SERIAL PRIMARY KEY,
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

/// Column list for reading a full [`FlatRecord`]
fn record_columns() -> String {
    let data = DATA_COLUMNS.iter().map(|column| {
        if REAL_COLUMNS.contains(column) {
            format!("{column}::TEXT::DOUBLE PRECISION AS {column}")
        } else {
            column.to_string()
        }
    });

    std::iter::once("id::BIGINT AS id".to_string())
        .chain(data)
        .chain(std::iter::once("created_at::TEXT AS created_at".to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// PostgreSQL-backed session storage
pub struct PostgresBackend {
    pool: PgPool,
    insert_sql: String,
    select_sql: String,
}

impl PostgresBackend {
    /// Connect to the server named by `database.url`
    ///
    /// Fails if no connection can be established within the connect timeout.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::connect("postgres", e))?;

        info!("Connected to PostgreSQL database");

        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            insert_sql: insert_statement(|i| format!("${i}")),
            select_sql: format!(
                "SELECT {} FROM {TABLE_NAME} WHERE session_id = $1 \
                 ORDER BY timestamp COLLATE \"C\" ASC NULLS LAST, id",
                record_columns()
            ),
        }
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
impl SessionBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
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

        debug!(inserted = inserted, "PostgreSQL batch committed");

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
                MIN(created_at)::TEXT AS created
            FROM session_records
            GROUP BY session_id
            ORDER BY MIN(created_at) DESC, session_id COLLATE "C"
            LIMIT $1 OFFSET $2
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
            "SELECT COUNT(*) FROM session_records \
             WHERE created_at >= NOW() - make_interval(hours => $1)",
        )
        .bind(i32::try_from(window_hours).unwrap_or(i32::MAX))
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
            ORDER BY COUNT(*) DESC, user_emotion COLLATE "C"
            LIMIT $1
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
