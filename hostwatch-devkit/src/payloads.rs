/*!
Builders de payloads JSON conformes à l'API HostWatch

`SampleBuilder` produit le corps de POST /api/metrics (sans node_id, attribué
par le kernel). Valeurs par défaut réalistes, horodatage absent sauf demande.
*/

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SampleBuilder {
    cpu_percent: f64,
    memory_total: u64,
    memory_used: u64,
    cpu_temp: f64,
    timestamp: Option<DateTime<Utc>>,
}

impl SampleBuilder {
    pub fn new() -> Self {
        Self {
            cpu_percent: 25.0,
            memory_total: 8 * GIB,
            memory_used: 2 * GIB,
            cpu_temp: 45.0,
            timestamp: None,
        }
    }

    pub fn cpu_percent(mut self, cpu: f64) -> Self {
        self.cpu_percent = cpu;
        self
    }

    pub fn memory(mut self, total: u64, used: u64) -> Self {
        self.memory_total = total;
        self.memory_used = used;
        self
    }

    pub fn cpu_temp(mut self, temp: f64) -> Self {
        self.cpu_temp = temp;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Horodatage relatif : maintenant moins `days` jours
    pub fn days_ago(self, days: i64) -> Self {
        self.at(Utc::now() - Duration::days(days))
    }

    pub fn build(&self) -> Value {
        let memory_percent = if self.memory_total == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_total as f64 * 100.0
        };

        let mut payload = serde_json::json!({
            "cpu_percent": self.cpu_percent,
            "memory_total": self.memory_total,
            "memory_used": self.memory_used,
            "memory_percent": memory_percent,
            "cpu_temp": self.cpu_temp,
        });
        if let Some(ts) = self.timestamp {
            payload["timestamp"] = Value::String(ts.to_rfc3339());
        }
        payload
    }
}

impl Default for SampleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Corps de POST /api/login
pub fn login_body(username: &str, password: &str) -> Value {
    serde_json::json!({
        "username": username,
        "password": password,
    })
}
