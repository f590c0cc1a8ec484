use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use talos_core::checkpoint::CheckpointStore;
use talos_core::error::AppError;
use talos_core::work::{CheckpointRecord, WorkStatus, WorkUnit};

/// SQLite-backed checkpoint store.
///
/// Claiming relies on a single conditional UPSERT, which SQLite executes
/// atomically: concurrent claims for the same unit resolve to exactly one
/// winner. Terminal transitions are guarded so re-marking is a no-op.
#[derive(Clone)]
pub struct SqliteCheckpointRepository {
    pool: SqlitePool,
}

impl SqliteCheckpointRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn store_error(e: sqlx::Error) -> AppError {
    AppError::CheckpointError(e.to_string())
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct CheckpointRow {
    unit_id: String,
    domain: String,
    product_id: String,
    status: String,
    attempt_count: i64,
    last_error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<CheckpointRow> for CheckpointRecord {
    fn from(row: CheckpointRow) -> Self {
        CheckpointRecord {
            unit_id: row.unit_id,
            domain: row.domain,
            product_id: row.product_id,
            status: row.status.parse().unwrap_or(WorkStatus::Pending),
            attempt_count: row.attempt_count as u32,
            last_error: row.last_error,
            updated_at: row.updated_at,
        }
    }
}

impl CheckpointStore for SqliteCheckpointRepository {
    async fn load(&self) -> Result<HashMap<String, CheckpointRecord>, AppError> {
        let rows = sqlx::query_as::<_, CheckpointRow>(r#"SELECT * FROM checkpoints"#)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.unit_id.clone(), row.into()))
            .collect())
    }

    async fn seed(&self, units: &[WorkUnit]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let now = Utc::now();
        for unit in units {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO checkpoints
                    (unit_id, domain, product_id, status, attempt_count, updated_at)
                VALUES (?1, ?2, ?3, 'pending', 0, ?4)
                "#,
            )
            .bind(unit.id())
            .bind(&unit.domain)
            .bind(&unit.product_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }
        tx.commit().await.map_err(store_error)?;
        Ok(())
    }

    async fn claim(&self, unit: &WorkUnit) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO checkpoints
                (unit_id, domain, product_id, status, attempt_count, updated_at)
            VALUES (?1, ?2, ?3, 'in_progress', 1, ?4)
            ON CONFLICT(unit_id) DO UPDATE SET
                status = 'in_progress',
                attempt_count = checkpoints.attempt_count + 1,
                last_error = NULL,
                updated_at = excluded.updated_at
            WHERE checkpoints.status IN ('pending', 'failed')
            "#,
        )
        .bind(unit.id())
        .bind(&unit.domain)
        .bind(&unit.product_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_done(&self, unit_id: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE checkpoints
            SET status = 'done', last_error = NULL, updated_at = ?2
            WHERE unit_id = ?1 AND status NOT IN ('done', 'failed')
            "#,
        )
        .bind(unit_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn mark_failed(&self, unit_id: &str, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE checkpoints
            SET status = 'failed', last_error = ?2, updated_at = ?3
            WHERE unit_id = ?1 AND status NOT IN ('done', 'failed')
            "#,
        )
        .bind(unit_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn is_complete(&self) -> Result<bool, AppError> {
        let (open,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM checkpoints WHERE status IN ('pending', 'in_progress')"#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(open == 0)
    }

    async fn reset(&self) -> Result<(), AppError> {
        sqlx::query(r#"DELETE FROM checkpoints"#)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn recover_stale(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE checkpoints
            SET status = 'pending', updated_at = ?1
            WHERE status = 'in_progress'
            "#,
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            tracing::info!(recovered, "Recovered stale in-progress checkpoints");
        }
        Ok(recovered)
    }

    async fn status_counts(&self) -> Result<Vec<(WorkStatus, i64)>, AppError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT status, COUNT(*) FROM checkpoints GROUP BY status ORDER BY status"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|(status, count)| status.parse().ok().map(|s| (s, count)))
            .collect())
    }

    async fn failed_records(&self) -> Result<Vec<CheckpointRecord>, AppError> {
        let rows = sqlx::query_as::<_, CheckpointRow>(
            r#"SELECT * FROM checkpoints WHERE status = 'failed' ORDER BY updated_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
