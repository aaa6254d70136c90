use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

pub const DEFAULT_TOKEN_SECRET: &str = "hostwatch_secret_change_me";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: String,
    pub database: PathBuf,
    pub auth: AuthConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AuthConf {
    pub token_secret: String,
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            database: PathBuf::from("./data/hostwatch.db"),
            auth: AuthConf::default(),
        }
    }
}

impl Default for AuthConf {
    fn default() -> Self {
        Self {
            token_secret: DEFAULT_TOKEN_SECRET.into(),
            admin_username: "admin".into(),
            admin_password: "admin123".into(),
        }
    }
}

impl KernelConfig {
    /// Secrets surchargés par l'environnement (.env compris)
    pub fn apply_env(&mut self) {
        if let Some(secret) = non_empty_env("HOSTWATCH_TOKEN_SECRET") {
            self.auth.token_secret = secret;
        }
        if let Some(password) = non_empty_env("HOSTWATCH_ADMIN_PASSWORD") {
            self.auth.admin_password = password;
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("HOSTWATCH_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    let mut cfg = load_config_from(Path::new(&path)).await;
    cfg.apply_env();
    if cfg.auth.token_secret == DEFAULT_TOKEN_SECRET {
        warn!("[kernel] token secret par défaut, à changer en production");
    }
    cfg
}

pub async fn load_config_from(path: &Path) -> KernelConfig {
    if !path.exists() {
        info!("[kernel] pas de {}, usage config par défaut", path.display());
        return KernelConfig::default();
    }

    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!("[kernel] lecture config impossible ({}): {e}", path.display());
            return KernelConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }

    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!("[kernel] config invalide: {e}");
        KernelConfig::default()
    })
}
