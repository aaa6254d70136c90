/**
 * STORE HOSTWATCH - Handle de stockage SQLite partagé
 *
 * RÔLE :
 * Ouvre la base (pool sqlx), applique les migrations, et fournit le handle
 * unique passé explicitement à chaque composant (registre, séries, auth).
 *
 * FONCTIONNEMENT :
 * - Init unique au démarrage, fermeture unique à l'arrêt (`close`)
 * - WAL + clés étrangères actives + busy timeout pour les écritures concurrentes
 * - Aucune verrou applicatif : l'atomicité repose sur les transactions et
 *   les contraintes d'unicité SQLite
 */

pub mod migrations;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
#[cfg(test)]
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("value out of range for column {0}")]
    OutOfRange(&'static str),
    #[error("stored timestamp out of range: {0}")]
    Timestamp(#[from] time::error::ComponentRange),
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Ouvre (ou crée) la base au chemin donné et applique les migrations
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        info!("[store] opening database at {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        migrations::run(&store.pool).await?;
        Ok(store)
    }

    /// Base en mémoire pour les tests : une seule connexion, jamais recyclée
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        migrations::run(&store.pool).await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("[store] database closed");
    }
}

/// Conversion u64 (API) -> INTEGER SQLite
pub(crate) fn to_sql_int(value: u64, column: &'static str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_runs_migrations() {
        let store = Store::open_in_memory().await.unwrap();
        let version: i64 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hostwatch.db");

        let store = Store::open(&path).await.unwrap();
        store.close().await;

        let reopened = Store::open(&path).await.unwrap();
        let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(reopened.pool())
            .await
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let store = Store::open_in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO samples (node_id, cpu_percent, memory_total, memory_used, memory_percent, cpu_temp, timestamp)
             VALUES (42, 1.0, 1, 1, 1.0, 0.0, 0)",
        )
        .execute(store.pool())
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_to_sql_int_bounds() {
        assert_eq!(to_sql_int(42, "memory_total").unwrap(), 42);
        assert!(matches!(to_sql_int(u64::MAX, "memory_total"), Err(StoreError::OutOfRange("memory_total"))));
    }
}
