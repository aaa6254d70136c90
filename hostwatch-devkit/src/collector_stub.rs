/*!
Collecteur HTTP bouchon pour tester l'agent sans kernel

Démarre un vrai serveur axum sur un port local éphémère, enregistre chaque
POST reçu sur `/api/metrics` (headers + corps JSON) et répond avec un code
configurable pour simuler un kernel en panne.
*/

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RecordedPush {
    pub node_name: Option<String>,
    pub user_agent: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct StubState {
    pushes: Arc<Mutex<Vec<RecordedPush>>>,
    status: Arc<Mutex<StatusCode>>,
    probes: Arc<Mutex<usize>>,
}

/// Serveur bouchon ; arrêté quand la valeur est droppée
pub struct StubCollector {
    addr: SocketAddr,
    state: StubState,
    handle: JoinHandle<()>,
}

impl StubCollector {
    pub async fn start() -> Result<Self> {
        let state = StubState {
            pushes: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(StatusCode::OK)),
            probes: Arc::new(Mutex::new(0)),
        };

        let app = Router::new()
            .route("/api/metrics", get(probe).post(record_push))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind stub collector")?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[STUB] collector stopped: {}", e);
            }
        });

        log::info!("[STUB] collector listening on {}", addr);
        Ok(Self { addr, state, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL d'ingestion, à mettre dans la config de l'agent
    pub fn url(&self) -> String {
        format!("http://{}/api/metrics", self.addr)
    }

    /// Code renvoyé aux prochains pushes (200 par défaut)
    pub fn respond_with(&self, status: StatusCode) {
        *lock(&self.state.status) = status;
    }

    pub fn pushes(&self) -> Vec<RecordedPush> {
        lock(&self.state.pushes).clone()
    }

    pub fn push_count(&self) -> usize {
        lock(&self.state.pushes).len()
    }

    pub fn probe_count(&self) -> usize {
        *lock(&self.state.probes)
    }

    pub fn find_pushes_by_node(&self, node_name: &str) -> Vec<RecordedPush> {
        lock(&self.state.pushes)
            .iter()
            .filter(|p| p.node_name.as_deref() == Some(node_name))
            .cloned()
            .collect()
    }

    pub fn last_body(&self) -> Option<Value> {
        lock(&self.state.pushes).last().map(|p| p.body.clone())
    }

    pub fn clear(&self) {
        lock(&self.state.pushes).clear();
        *lock(&self.state.probes) = 0;
    }
}

impl Drop for StubCollector {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn probe(State(state): State<StubState>) -> StatusCode {
    *lock(&state.probes) += 1;
    StatusCode::OK
}

async fn record_push(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let push = RecordedPush {
        node_name: header("node-name"),
        user_agent: header("user-agent"),
        body,
    };
    log::info!("[STUB] push from {:?}", push.node_name);
    lock(&state.pushes).push(push);

    let status = *lock(&state.status);
    let success = status.is_success();
    (status, Json(serde_json::json!({ "success": success, "message": "recorded" })))
}
