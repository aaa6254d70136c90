/**
 * HOSTWATCH KERNEL - Point d'entrée du collecteur central
 *
 * RÔLE : Orchestration config -> stockage -> compte admin -> HTTP.
 * Un seul handle de stockage, ouvert au démarrage, fermé à l'arrêt.
 *
 * ÉCHECS FATALS : ouverture/migration de la base, amorçage admin, bind du port.
 * Config absente ou invalide : valeurs par défaut, jamais fatal.
 */

mod auth;
mod config;
mod error;
mod http;
mod ingest;
mod models;
mod registry;
mod samples;
mod store;

use crate::config::{load_config, KernelConfig};
use crate::http::AppState;
use crate::store::Store;

use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hostwatch_kernel=info,tower_http=info")))
        .init();

    let cfg = load_config().await;
    let (store, app_state) = bootstrap(&cfg).await?;

    let app = http::build_router(app_state);

    let listener = TcpListener::bind(&cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!("[kernel] listening on http://{}", cfg.listen);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    store.close().await;
    info!("[kernel] stopped");
    Ok(())
}

/// Stockage + compte admin + état Axum ; idempotent entre redémarrages
async fn bootstrap(cfg: &KernelConfig) -> anyhow::Result<(Store, AppState)> {
    let store = Store::open(&cfg.database)
        .await
        .with_context(|| format!("failed to open database {}", cfg.database.display()))?;

    let app_state = AppState::new(store.clone(), &cfg.auth.token_secret);
    let created = app_state
        .auth
        .credentials()
        .ensure_admin(&cfg.auth.admin_username, &cfg.auth.admin_password)
        .await
        .context("failed to seed admin account")?;

    if created {
        info!("[kernel] admin account '{}' created", cfg.auth.admin_username);
    } else {
        info!("[kernel] admin account '{}' already present", cfg.auth.admin_username);
    }

    let users = app_state
        .auth
        .credentials()
        .count_users()
        .await
        .context("failed to count user accounts")?;
    info!("[kernel] {users} user account(s) registered");

    Ok((store, app_state))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[kernel] ctrl-c handler failed: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("[kernel] SIGTERM handler failed: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("[kernel] shutdown requested");
}
