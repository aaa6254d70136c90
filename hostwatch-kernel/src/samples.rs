/**
 * METRICS STORE - Séries temporelles d'échantillons par nœud
 *
 * RÔLE : Seul propriétaire des échantillons. Ajout pur (jamais d'écrasement),
 * lecture du dernier échantillon et d'une fenêtre glissante en jours.
 *
 * INVARIANTS :
 * - Un échantillon référence un nœud existant (clé étrangère SQLite)
 * - Horodatage serveur attribué si l'agent n'en fournit pas
 * - Dernier = timestamp max, égalité départagée par l'id le plus grand
 * - Fenêtre = [now - jours, now], triée par timestamp décroissant
 * - Aucune rétention/compaction
 */

use crate::models::{
    from_unix_millis, now_utc, to_unix_millis, truncate_to_millis, MetricsSample, NewSample, NodeId, SampleId,
};
use crate::store::{to_sql_int, Store, StoreError};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use time::OffsetDateTime;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Normalise une fenêtre demandée : toute valeur <= 0 devient 1 jour
pub fn window_days(requested: i64) -> u32 {
    if requested <= 0 {
        1
    } else {
        u32::try_from(requested).unwrap_or(u32::MAX)
    }
}

#[derive(Clone)]
pub struct SampleStore {
    store: Store,
}

impl SampleStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub async fn append(&self, sample: &NewSample) -> Result<SampleId, StoreError> {
        append_with(self.store.pool(), sample).await
    }

    pub async fn latest(&self, node_id: NodeId) -> Result<Option<MetricsSample>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, node_id, cpu_percent, memory_total, memory_used, memory_percent, cpu_temp, timestamp
            FROM samples
            WHERE node_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(node_id)
        .fetch_optional(self.store.pool())
        .await?;
        row.map(|r| sample_from_row(&r)).transpose()
    }

    pub async fn range(&self, node_id: NodeId, days: u32) -> Result<Vec<MetricsSample>, StoreError> {
        self.range_at(node_id, days, now_utc()).await
    }

    pub(crate) async fn range_at(
        &self,
        node_id: NodeId,
        days: u32,
        now: OffsetDateTime,
    ) -> Result<Vec<MetricsSample>, StoreError> {
        let upper = to_unix_millis(now);
        let lower = upper - i64::from(days) * MILLIS_PER_DAY;

        let rows = sqlx::query(
            r#"
            SELECT id, node_id, cpu_percent, memory_total, memory_used, memory_percent, cpu_temp, timestamp
            FROM samples
            WHERE node_id = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(node_id)
        .bind(lower)
        .bind(upper)
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(sample_from_row).collect()
    }
}

/// Ajout générique sur l'exécuteur (pool ou transaction d'ingestion)
pub async fn append_with<'e, E>(executor: E, sample: &NewSample) -> Result<SampleId, StoreError>
where
    E: SqliteExecutor<'e>,
{
    let timestamp = sample.timestamp.map(truncate_to_millis).unwrap_or_else(now_utc);

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO samples (node_id, cpu_percent, memory_total, memory_used, memory_percent, cpu_temp, timestamp)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(sample.node_id)
    .bind(sample.cpu_percent)
    .bind(to_sql_int(sample.memory_total, "memory_total")?)
    .bind(to_sql_int(sample.memory_used, "memory_used")?)
    .bind(sample.memory_percent)
    .bind(sample.cpu_temp)
    .bind(to_unix_millis(timestamp))
    .fetch_one(executor)
    .await?;
    Ok(id)
}

fn sample_from_row(row: &SqliteRow) -> Result<MetricsSample, StoreError> {
    let memory_total: i64 = row.try_get("memory_total")?;
    let memory_used: i64 = row.try_get("memory_used")?;
    Ok(MetricsSample {
        id: row.try_get("id")?,
        node_id: row.try_get("node_id")?,
        cpu_percent: row.try_get("cpu_percent")?,
        memory_total: u64::try_from(memory_total).map_err(|_| StoreError::OutOfRange("memory_total"))?,
        memory_used: u64::try_from(memory_used).map_err(|_| StoreError::OutOfRange("memory_used"))?,
        memory_percent: row.try_get("memory_percent")?,
        cpu_temp: row.try_get("cpu_temp")?,
        timestamp: from_unix_millis(row.try_get("timestamp")?)?,
    })
}
