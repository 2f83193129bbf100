//! Database module - SQLite connection and migrations for the durable attack log

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // An in-memory database lives and dies with its connection
    let max_connections = if database_url.contains(":memory:") { 1 } else { 10 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Attack log (append-only, seq assigned by the database)
CREATE TABLE IF NOT EXISTS attacks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id BLOB NOT NULL UNIQUE,
    fingerprint TEXT NOT NULL,
    attack_type TEXT NOT NULL,
    severity INTEGER NOT NULL CHECK (severity BETWEEN 0 AND 10),
    confidence REAL NOT NULL,
    timestamp TEXT NOT NULL,
    ledger_tx TEXT
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_attacks_fingerprint ON attacks(fingerprint);
CREATE INDEX IF NOT EXISTS idx_attacks_timestamp ON attacks(timestamp)
"#;

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        tokio_test::assert_ok!(run_migrations(&pool).await);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attacks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
