//! Agent configuration (TOML)
//!
//! Handles:
//! - Kernel ingestion URL and request timeout
//! - Node display name and sampling interval
//! - Per-metric enable flags
//!
//! A missing file always yields defaults. A malformed file is fatal only when
//! its path was given explicitly through `HOSTWATCH_AGENT_CONFIG`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "HOSTWATCH_AGENT_CONFIG";
const DEFAULT_URL: &str = "http://localhost:8080/api/metrics";
const DEFAULT_INTERVAL_SECS: u64 = 30;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server: ServerConfig,
    pub agent: AgentInfo,
    pub collector: CollectorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInfo {
    pub node_name: String,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub cpu: bool,
    pub memory: bool,
    pub temp: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { cpu: true, memory: true, temp: true }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            agent: AgentInfo::default(),
            collector: CollectorConfig::default(),
        }
    }
}

fn default_node_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "default-node".to_string())
}

impl AgentConfig {
    /// Load config from `HOSTWATCH_AGENT_CONFIG` or the OS config directory
    pub async fn load() -> Result<Self> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(explicit);
            return Self::load_from(&path)
                .await
                .with_context(|| format!("Invalid agent config {}", path.display()));
        }

        let Some(path) = Self::config_file_path() else {
            warn!("No config directory on this platform, using defaults");
            return Ok(Self::default());
        };

        match Self::load_from(&path).await {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Ignoring invalid config {}: {:#}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: AgentConfig = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config.normalized())
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("hostwatch-agent");
        path.push("config.toml");
        Some(path)
    }

    /// Zero durations and blank names fall back to defaults
    fn normalized(mut self) -> Self {
        if self.agent.interval_secs == 0 {
            self.agent.interval_secs = DEFAULT_INTERVAL_SECS;
        }
        if self.server.timeout_secs == 0 {
            self.server.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if self.agent.node_name.trim().is_empty() {
            self.agent.node_name = default_node_name();
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.agent.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }
}
