/**
 * INGESTION - Réception des échantillons poussés par les agents
 *
 * RÔLE :
 * Résout l'identité de l'émetteur (IP + nom), enregistre/rafraîchit le nœud
 * puis ajoute l'échantillon, dans UNE transaction : soit les deux écritures,
 * soit aucune.
 *
 * IDENTITÉ :
 * - IP : X-Real-IP > première entrée de X-Forwarded-For > adresse du pair TCP
 * - Nom : header Node-Name, sinon l'IP résolue
 *
 * LIMITE CONNUE : les headers de proxy sont crus sur parole, un client peut
 * se faire passer pour un autre nœud.
 */

use crate::models::{now_utc, IngestSample, NodeId};
use crate::registry::upsert_node_with;
use crate::samples::append_with;
use crate::store::{Store, StoreError};
use axum::http::HeaderMap;
use std::net::SocketAddr;
use tracing::debug;

pub const NODE_NAME_HEADER: &str = "node-name";

/// IP du client : headers de proxy d'abord, pair TCP en dernier recours
pub fn resolve_client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(real_ip) = header_value("x-real-ip") {
        return real_ip.to_string();
    }

    if let Some(first) = header_value("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    peer.ip().to_string()
}

/// Nom annoncé par l'agent ; vide ou absent -> IP
pub fn resolve_node_name(headers: &HeaderMap, ip: &str) -> String {
    headers
        .get(NODE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ip)
        .to_string()
}

#[derive(Clone)]
pub struct Ingestor {
    store: Store,
}

impl Ingestor {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Upsert du nœud + ajout de l'échantillon, atomiques
    pub async fn ingest(&self, node_name: &str, ip: &str, sample: IngestSample) -> Result<NodeId, StoreError> {
        let mut tx = self.store.pool().begin().await?;

        let node_id = upsert_node_with(&mut *tx, node_name, ip, now_utc()).await?;
        append_with(&mut *tx, &sample.bind(node_id)).await?;

        tx.commit().await?;
        debug!("[ingest] sample stored for node {node_id} ({node_name} @ {ip})");
        Ok(node_id)
    }
}
