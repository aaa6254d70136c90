/**
 * NODE REGISTRY - Identité des machines supervisées (clé : IP observée)
 *
 * RÔLE : Seul propriétaire du cycle de vie des nœuds. Création à la première
 * ingestion depuis une IP inconnue, mise à jour (nom, online, last_seen) ensuite.
 *
 * ATOMICITÉ : l'upsert est UNE seule écriture conditionnelle
 * (INSERT ... ON CONFLICT(ip) DO UPDATE ... RETURNING id). Deux ingestions
 * simultanées depuis une IP jamais vue ne peuvent pas créer deux lignes.
 *
 * LIMITE CONNUE : aucun balayage ne repasse un nœud en `offline`.
 */

use crate::models::{from_unix_millis, to_unix_millis, Node, NodeId};
use crate::store::{Store, StoreError};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use time::OffsetDateTime;

#[derive(Clone)]
pub struct NodeRegistry {
    store: Store,
}

impl NodeRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub async fn upsert_node(&self, name: &str, ip: &str) -> Result<NodeId, StoreError> {
        upsert_node_with(self.store.pool(), name, ip, crate::models::now_utc()).await
    }

    #[cfg(test)]
    pub async fn get_node_by_ip(&self, ip: &str) -> Result<Option<Node>, StoreError> {
        let row = sqlx::query("SELECT id, name, ip, status, last_seen FROM nodes WHERE ip = ?")
            .bind(ip)
            .fetch_optional(self.store.pool())
            .await?;
        row.map(|r| node_from_row(&r)).transpose()
    }

    /// Liste triée par id (ordre d'insertion)
    pub async fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        let rows = sqlx::query("SELECT id, name, ip, status, last_seen FROM nodes ORDER BY id")
            .fetch_all(self.store.pool())
            .await?;
        rows.iter().map(node_from_row).collect()
    }
}

/// Variante générique sur l'exécuteur : utilisable seule ou dans la
/// transaction d'ingestion
pub async fn upsert_node_with<'e, E>(
    executor: E,
    name: &str,
    ip: &str,
    seen_at: OffsetDateTime,
) -> Result<NodeId, StoreError>
where
    E: SqliteExecutor<'e>,
{
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO nodes (name, ip, status, last_seen)
        VALUES (?, ?, 'online', ?)
        ON CONFLICT(ip) DO UPDATE SET
            name = excluded.name,
            status = 'online',
            last_seen = excluded.last_seen
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(ip)
    .bind(to_unix_millis(seen_at))
    .fetch_one(executor)
    .await?;
    Ok(id)
}

fn node_from_row(row: &SqliteRow) -> Result<Node, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Node {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        ip: row.try_get("ip")?,
        status: status
            .parse()
            .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))?,
        last_seen: from_unix_millis(row.try_get("last_seen")?)?,
    })
}
