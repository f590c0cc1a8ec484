use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use talos_db::Database;

/// In-memory SQLite database with migrations applied.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite");

    let db = Database::from_pool(pool.clone());
    db.migrate().await.expect("migrations failed");

    pool
}
