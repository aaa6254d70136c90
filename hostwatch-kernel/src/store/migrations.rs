//! Migrations du schéma SQLite (table `schema_version` + étapes numérotées).

use super::StoreError;
use sqlx::SqlitePool;
use tracing::info;

const SCHEMA_VERSION: i64 = 1;

pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("[store] schema up to date (version {})", current_version);
        return Ok(());
    }

    info!("[store] migrating schema from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    Ok(())
}

async fn migrate_to_v1(pool: &SqlitePool) -> Result<(), StoreError> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            ip TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'offline',
            last_seen INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            node_id INTEGER NOT NULL REFERENCES nodes(id),
            cpu_percent REAL NOT NULL,
            memory_total INTEGER NOT NULL,
            memory_used INTEGER NOT NULL,
            memory_percent REAL NOT NULL,
            cpu_temp REAL NOT NULL,
            timestamp INTEGER NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_samples_node_ts ON samples(node_id, timestamp)",
        "DELETE FROM schema_version",
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    // tout ou rien : un redémarrage après crash rejoue la migration complète
    let mut tx = pool.begin().await.map_err(|e| StoreError::Migration(e.to_string()))?;
    for statement in statements {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
    }
    tx.commit().await.map_err(|e| StoreError::Migration(e.to_string()))?;

    info!("[store] migration to schema version 1 complete");
    Ok(())
}
