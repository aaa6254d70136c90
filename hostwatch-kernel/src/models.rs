/**
 * MODÈLE DE DONNÉES HOSTWATCH - Types partagés stockage / API
 *
 * RÔLE : Entités persistées (User, Node, MetricsSample), payloads entrants
 * (ingestion, login) et enveloppes de réponse JSON typées par endpoint.
 *
 * HORODATAGE : une seule représentation canonique. En mémoire `OffsetDateTime`
 * UTC tronqué à la milliseconde, en base INTEGER (ms Unix), sur le fil RFC 3339.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::error::ComponentRange;
use time::{Duration, OffsetDateTime};

pub type UserId = i64;
pub type NodeId = i64;
pub type SampleId = i64;

/// Horloge serveur, tronquée à la milliseconde (précision de stockage)
pub fn now_utc() -> OffsetDateTime {
    truncate_to_millis(OffsetDateTime::now_utc())
}

pub fn truncate_to_millis(ts: OffsetDateTime) -> OffsetDateTime {
    ts - Duration::nanoseconds(i64::from(ts.nanosecond() % 1_000_000))
}

pub fn to_unix_millis(ts: OffsetDateTime) -> i64 {
    ts.unix_timestamp_nanos().div_euclid(1_000_000) as i64
}

/// Relecture d'une colonne INTEGER ; hors plage = erreur, jamais d'horodatage de repli
pub fn from_unix_millis(ms: i64) -> Result<OffsetDateTime, ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
}

/// Années représentables en RFC 3339 une fois ramenées en UTC
const WIRE_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

fn within_wire_range(ts: OffsetDateTime) -> bool {
    OffsetDateTime::from_unix_timestamp(ts.unix_timestamp())
        .map(|utc| WIRE_YEARS.contains(&utc.year()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Entités persistées
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip)] // jamais exposé en JSON
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Online => "online",
            NodeStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(NodeStatus::Online),
            "offline" => Ok(NodeStatus::Offline),
            other => Err(format!("unknown node status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub ip: String,
    pub status: NodeStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSample {
    pub id: SampleId,
    pub node_id: NodeId,
    pub cpu_percent: f64,
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_percent: f64,
    pub cpu_temp: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Échantillon prêt à être ajouté : node_id lié, horodatage résolu
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub node_id: NodeId,
    pub cpu_percent: f64,
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_percent: f64,
    pub cpu_temp: f64,
    pub timestamp: Option<OffsetDateTime>,
}

// ---------------------------------------------------------------------------
// Payloads entrants
// ---------------------------------------------------------------------------

/// Corps de POST /api/metrics (le node_id est attribué côté serveur)
#[derive(Debug, Clone, Deserialize)]
pub struct IngestSample {
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub memory_total: u64,
    #[serde(default)]
    pub memory_used: u64,
    #[serde(default)]
    pub memory_percent: f64,
    #[serde(default)]
    pub cpu_temp: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl IngestSample {
    /// Contrôle de plage : pourcentages dans [0, 100], valeurs finies,
    /// mémoire stockable en INTEGER, horodatage entre les années 1 et 9999 (UTC)
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [("cpu_percent", self.cpu_percent), ("memory_percent", self.memory_percent)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(format!("{field} must be within 0-100"));
            }
        }
        if !self.cpu_temp.is_finite() {
            return Err("cpu_temp must be a finite number".into());
        }
        for (field, value) in [("memory_total", self.memory_total), ("memory_used", self.memory_used)] {
            if i64::try_from(value).is_err() {
                return Err(format!("{field} is too large"));
            }
        }
        if let Some(ts) = self.timestamp {
            if !within_wire_range(ts) {
                return Err("timestamp must fall between years 1 and 9999 (UTC)".into());
            }
        }
        Ok(())
    }

    pub fn bind(self, node_id: NodeId) -> NewSample {
        NewSample {
            node_id,
            cpu_percent: self.cpu_percent,
            memory_total: self.memory_total,
            memory_used: self.memory_used,
            memory_percent: self.memory_percent,
            cpu_temp: self.cpu_temp,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

// ---------------------------------------------------------------------------
// Enveloppes de réponse (forme du fil : {success, data|list|message})
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Serialize)]
pub struct ListEnvelope<T> {
    pub success: bool,
    pub list: Vec<T>,
}

impl<T> ListEnvelope<T> {
    pub fn ok(list: Vec<T>) -> Self {
        Self { success: true, list }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub success: bool,
    pub message: String,
}

impl MessageEnvelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}
