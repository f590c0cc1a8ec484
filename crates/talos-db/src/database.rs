use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use talos_core::AppError;

use crate::checkpoint_repository::SqliteCheckpointRepository;
use crate::config::DatabaseConfig;

/// SQL migration statements, executed one at a time.
const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS checkpoints (
        unit_id TEXT PRIMARY KEY,
        domain TEXT NOT NULL,
        product_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        attempt_count INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_checkpoints_status
        ON checkpoints(status)"#,
];

/// Central database facade: owns the connection pool, runs migrations,
/// and vends repository instances.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the checkpoint database with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| AppError::CheckpointError(format!("failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::CheckpointError(format!("migration failed: {e}")))?;
        }
        Ok(())
    }

    /// Get a [`SqliteCheckpointRepository`] backed by this pool.
    pub fn checkpoint_repo(&self) -> SqliteCheckpointRepository {
        SqliteCheckpointRepository::new(self.pool.clone())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
