/**
 * API REST HOSTWATCH - Serveur HTTP du kernel
 *
 * RÔLE :
 * Expose l'ingestion (agents) et les lectures authentifiées (dashboard, CLI).
 *
 * ROUTES :
 * - GET  /health                   -> "ok" (libre)
 * - POST /api/login                -> {success, data:{token, user}}
 * - POST /api/metrics              -> {success, message} (libre, headers Node-Name / X-Real-IP / X-Forwarded-For)
 * - GET  /api/nodes                -> {success, data:[Node]}            (bearer)
 * - GET  /api/metrics/realtime     -> {success, data:MetricsSample}     (bearer, ?node_id=)
 * - GET  /api/metrics/history      -> {success, list:[MetricsSample]}   (bearer, ?node_id=&days=)
 *
 * SÉCURITÉ :
 * - `require_bearer` en route_layer sur les lectures : 401 avant tout handler
 * - Erreurs JSON {success:false, message} génériques, détail en logs uniquement
 */

use crate::auth::{require_bearer, AuthService};
use crate::error::ApiError;
use crate::ingest::{resolve_client_ip, resolve_node_name, Ingestor, NODE_NAME_HEADER};
use crate::models::{
    DataEnvelope, IngestSample, ListEnvelope, LoginRequest, LoginResponse, MessageEnvelope, MetricsSample, Node,
    NodeId,
};
use crate::registry::NodeRegistry;
use crate::samples::{window_days, SampleStore};
use crate::store::Store;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, HeaderName, Method};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub registry: NodeRegistry,
    pub samples: SampleStore,
    pub ingestor: Ingestor,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(store: Store, token_secret: &str) -> Self {
        Self {
            registry: NodeRegistry::new(store.clone()),
            samples: SampleStore::new(store.clone()),
            ingestor: Ingestor::new(store.clone()),
            auth: AuthService::new(store, token_secret),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeQuery {
    node_id: Option<String>,
    days: Option<String>,
}

pub fn build_router(app_state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/nodes", get(list_nodes))
        .route("/api/metrics/realtime", get(get_realtime))
        .route("/api/metrics/history", get(get_history))
        .route_layer(middleware::from_fn_with_state(app_state.auth.clone(), require_bearer));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/login", post(login))
        .route("/api/metrics", post(ingest))
        .merge(protected)
        .with_state(app_state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(NODE_NAME_HEADER),
        ])
}

/// Corps JSON : uniquement un objet, jamais un tableau lu par position
fn object_body<T: DeserializeOwned>(payload: Result<Json<Value>, JsonRejection>) -> Result<T, ApiError> {
    let Json(value) = payload?;
    if !value.is_object() {
        return Err(ApiError::Validation("Invalid request body: expected a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| ApiError::Validation(format!("Invalid request body: {e}")))
}

// POST /api/login
async fn login(
    State(app): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DataEnvelope<LoginResponse>>, ApiError> {
    let req: LoginRequest = object_body(payload)?;
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("username and password are required".into()));
    }

    let (token, user) = app.auth.login(&req.username, &req.password).await?;
    Ok(Json(DataEnvelope::ok(LoginResponse { token, user })))
}

// POST /api/metrics (agents, non authentifié)
async fn ingest(
    State(app): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageEnvelope>, ApiError> {
    let sample: IngestSample = object_body(payload)?;
    sample.validate().map_err(ApiError::Validation)?;

    let ip = resolve_client_ip(&headers, peer);
    let node_name = resolve_node_name(&headers, &ip);

    app.ingestor.ingest(&node_name, &ip, sample).await?;
    Ok(Json(MessageEnvelope::ok("Metrics received")))
}

// GET /api/nodes
async fn list_nodes(State(app): State<AppState>) -> Result<Json<DataEnvelope<Vec<Node>>>, ApiError> {
    let nodes = app.registry.list_nodes().await?;
    Ok(Json(DataEnvelope::ok(nodes)))
}

// GET /api/metrics/realtime?node_id=
async fn get_realtime(
    State(app): State<AppState>,
    query: Result<Query<NodeQuery>, QueryRejection>,
) -> Result<Json<DataEnvelope<MetricsSample>>, ApiError> {
    let Query(params) = query?;
    let node_id = parse_node_id(params.node_id.as_deref())?;

    match app.samples.latest(node_id).await? {
        Some(sample) => Ok(Json(DataEnvelope::ok(sample))),
        None => Err(ApiError::NotFound("No metrics data for this node".into())),
    }
}

// GET /api/metrics/history?node_id=&days=
async fn get_history(
    State(app): State<AppState>,
    query: Result<Query<NodeQuery>, QueryRejection>,
) -> Result<Json<ListEnvelope<MetricsSample>>, ApiError> {
    let Query(params) = query?;
    let node_id = parse_node_id(params.node_id.as_deref())?;
    let days = parse_days(params.days.as_deref())?;

    let list = app.samples.range(node_id, days).await?;
    debug!("[http] history node={node_id} days={days} -> {} samples", list.len());
    Ok(Json(ListEnvelope::ok(list)))
}

fn parse_node_id(raw: Option<&str>) -> Result<NodeId, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation("node_id is required".into()))?;

    match raw.parse::<NodeId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::Validation("Invalid node_id".into())),
    }
}

/// Absent -> 1 jour ; non entier -> 400 ; <= 0 -> 1 jour
fn parse_days(raw: Option<&str>) -> Result<u32, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(1);
    };
    let requested = raw
        .parse::<i64>()
        .map_err(|_| ApiError::Validation("Invalid days".into()))?;
    Ok(window_days(requested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use hostwatch_devkit::payloads::{login_body, SampleBuilder};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    const AGENT_ADDR: &str = "203.0.113.7:40000";

    async fn test_app() -> Router {
        let store = Store::open_in_memory().await.unwrap();
        let state = AppState::new(store, "test-secret");
        state.auth.credentials().ensure_admin("admin", "admin123").await.unwrap();
        build_router(state)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response: Response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn post_json(uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .extension(ConnectInfo(AGENT_ADDR.parse::<SocketAddr>().unwrap()))
    }

    fn push(node_name: &str, body: Value) -> Request<Body> {
        post_json("/api/metrics")
            .header("Node-Name", node_name)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_authed(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn login_token(app: &Router) -> String {
        let body = login_body("admin", "admin123");
        let (status, json) = send(app, post_json("/api/login").body(Body::from(body.to_string())).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        json["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_success_and_failure() {
        let app = test_app().await;

        let ok = login_body("admin", "admin123");
        let (status, json) = send(&app, post_json("/api/login").body(Body::from(ok.to_string())).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert!(!json["data"]["token"].as_str().unwrap().is_empty());
        assert_eq!(json["data"]["user"]["username"], "admin");
        assert!(json["data"]["user"].get("password_hash").is_none());

        let wrong = login_body("admin", "wrong");
        let (status, wrong_json) =
            send(&app, post_json("/api/login").body(Body::from(wrong.to_string())).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_json["success"], false);

        let unknown = login_body("root", "admin123");
        let (status, unknown_json) =
            send(&app, post_json("/api/login").body(Body::from(unknown.to_string())).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_json["message"], unknown_json["message"]);
    }

    #[tokio::test]
    async fn test_login_malformed_body_is_400() {
        let app = test_app().await;
        let (status, json) = send(
            &app,
            post_json("/api/login").body(Body::from("{not json")).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let (status, json) = send(
            &app,
            post_json("/api/login").body(Body::from(r#"["admin", "admin123"]"#)).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_ingest_creates_then_updates_node() {
        let app = test_app().await;
        let token = login_token(&app).await;
        let body = SampleBuilder::new().cpu_percent(12.5).build();

        let (status, json) = send(&app, push("web1", body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (_, nodes) = send(&app, get_authed("/api/nodes", &token)).await;
        let list = nodes["data"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "web1");
        assert_eq!(list[0]["ip"], "203.0.113.7");
        assert_eq!(list[0]["status"], "online");

        let (status, _) = send(&app, push("web1", body)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, nodes) = send(&app, get_authed("/api/nodes", &token)).await;
        assert_eq!(nodes["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_honors_proxy_headers() {
        let app = test_app().await;
        let token = login_token(&app).await;
        let body = SampleBuilder::new().build();

        let req = post_json("/api/metrics")
            .header("X-Forwarded-For", "10.0.0.21, 172.16.0.1")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);

        let (_, nodes) = send(&app, get_authed("/api/nodes", &token)).await;
        assert_eq!(nodes["data"][0]["ip"], "10.0.0.21");
        assert_eq!(nodes["data"][0]["name"], "10.0.0.21");
    }

    #[tokio::test]
    async fn test_ingest_rejects_invalid_payloads() {
        let app = test_app().await;
        let token = login_token(&app).await;

        let out_of_range = SampleBuilder::new().cpu_percent(150.0).build();
        let (status, json) = send(&app, push("web1", out_of_range)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        for raw in ["[1, 2, 3]", "42", "\"cpu\"", "null"] {
            let req = post_json("/api/metrics").body(Body::from(raw)).unwrap();
            let (status, json) = send(&app, req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
            assert_eq!(json["success"], false, "{raw}");
        }

        let oversized = json!({"memory_total": u64::MAX, "memory_used": 1});
        let (status, json) = send(&app, push("web1", oversized)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("memory_total"));

        let (_, nodes) = send(&app, get_authed("/api/nodes", &token)).await;
        assert!(nodes["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_rejects_unrepresentable_timestamps() {
        let app = test_app().await;
        let token = login_token(&app).await;

        for raw in ["0000-01-01T00:00:00+01:00", "9999-12-31T23:30:00-01:00"] {
            let body = json!({"cpu_percent": 5.0, "timestamp": raw});
            let (status, json) = send(&app, push("web1", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
            assert_eq!(json["success"], false);
        }

        let (_, nodes) = send(&app, get_authed("/api/nodes", &token)).await;
        assert!(nodes["data"].as_array().unwrap().is_empty());
        let (status, json) = send(&app, get_authed("/api/metrics/realtime?node_id=1", &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_realtime_returns_ingested_sample() {
        let app = test_app().await;
        let token = login_token(&app).await;

        let body = SampleBuilder::new()
            .cpu_percent(33.0)
            .memory(16_000_000_000, 4_000_000_000)
            .cpu_temp(55.5)
            .build();
        send(&app, push("web1", body)).await;

        let (status, json) = send(&app, get_authed("/api/metrics/realtime?node_id=1", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["node_id"], 1);
        assert_eq!(json["data"]["cpu_percent"], 33.0);
        assert_eq!(json["data"]["memory_total"], 16_000_000_000u64);
        assert_eq!(json["data"]["memory_used"], 4_000_000_000u64);
        assert_eq!(json["data"]["cpu_temp"], 55.5);
    }

    #[tokio::test]
    async fn test_query_routes_require_token() {
        let app = test_app().await;

        for uri in ["/api/nodes", "/api/metrics/realtime?node_id=1", "/api/metrics/history?node_id=1&days=7"] {
            let (status, json) = send(&app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(json["message"], "Invalid or missing token");

            let (status, _) = send(&app, get_authed(uri, "not.a.token")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_realtime_validation_and_not_found() {
        let app = test_app().await;
        let token = login_token(&app).await;

        let (status, _) = send(&app, get_authed("/api/metrics/realtime", &token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get_authed("/api/metrics/realtime?node_id=abc", &token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(&app, get_authed("/api/metrics/realtime?node_id=42", &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_history_window_newest_first() {
        let app = test_app().await;
        let token = login_token(&app).await;

        for (cpu, days_ago) in [(1.0, 8), (2.0, 6), (3.0, 0), (4.0, 3)] {
            let body = SampleBuilder::new().cpu_percent(cpu).days_ago(days_ago).build();
            let (status, _) = send(&app, push("web1", body)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, json) = send(&app, get_authed("/api/metrics/history?node_id=1&days=7", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        let cpus: Vec<f64> = json["list"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["cpu_percent"].as_f64().unwrap())
            .collect();
        assert_eq!(cpus, vec![3.0, 4.0, 2.0]);
    }

    #[tokio::test]
    async fn test_history_days_parameter() {
        let app = test_app().await;
        let token = login_token(&app).await;

        send(&app, push("web1", SampleBuilder::new().cpu_percent(1.0).days_ago(2).build())).await;
        send(&app, push("web1", SampleBuilder::new().cpu_percent(2.0).build())).await;

        for uri in ["/api/metrics/history?node_id=1", "/api/metrics/history?node_id=1&days=0"] {
            let (status, json) = send(&app, get_authed(uri, &token)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["list"].as_array().unwrap().len(), 1, "{uri}");
        }

        let (status, _) = send(&app, get_authed("/api/metrics/history?node_id=1&days=week", &token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(&app, get_authed("/api/metrics/history?node_id=99&days=7", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"success": true, "list": []}));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_node_id(Some(" 7 ")).unwrap(), 7);
        assert!(parse_node_id(Some("0")).is_err());
        assert!(parse_node_id(Some("")).is_err());
        assert!(parse_node_id(None).is_err());

        assert_eq!(parse_days(None).unwrap(), 1);
        assert_eq!(parse_days(Some("-5")).unwrap(), 1);
        assert_eq!(parse_days(Some("30")).unwrap(), 30);
        assert!(parse_days(Some("1.5")).is_err());
    }
}
