//! HTTP API for sample ingestion and usage queries
//!
//! A thin dispatch shim: each handler maps one URL path to one store
//! operation and serializes the result. The store owns all semantics; this
//! layer only translates errors into status codes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use monitor_lib::{
    DeploymentSample, MetricsStore, MonitorMetrics, NamespaceSample, NodeSample, PodSample,
    StoreError,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Shared application state, injected into every handler
pub struct AppState {
    pub store: MetricsStore,
    pub metrics: MonitorMetrics,
}

impl AppState {
    pub fn new(store: MetricsStore, metrics: MonitorMetrics) -> Self {
        Self { store, metrics }
    }
}

/// Store error translated to an HTTP response
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Validation(_) | StoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

/// Time-window query parameter; `window = 0` (the default) requests the
/// full retained series
#[derive(Debug, Deserialize)]
struct WindowQuery {
    #[serde(default)]
    window: u64,
}

fn ok_status() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ----- node endpoints -----

async fn post_node(
    State(state): State<Arc<AppState>>,
    Path(node): Path<String>,
    Json(sample): Json<NodeSample>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.store.add_node(&node, sample) {
        Ok(()) => {
            state.metrics.inc_samples_ingested("node");
            Ok(ok_status())
        }
        Err(e) => {
            state.metrics.inc_ingest_rejection();
            Err(e.into())
        }
    }
}

async fn get_nodes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.latest_nodes())
}

async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(node): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<NodeSample>>, ApiError> {
    let samples = if query.window > 0 {
        state.store.query_node(&node, query.window)?
    } else {
        state.store.node_series(&node)?
    };
    Ok(Json(samples))
}

async fn get_node_pods(
    State(state): State<Arc<AppState>>,
    Path(node): Path<String>,
) -> impl IntoResponse {
    Json(state.store.pods_by_node(&node))
}

// ----- pod endpoints -----

async fn post_pod(
    State(state): State<Arc<AppState>>,
    Path(pod): Path<String>,
    Json(sample): Json<PodSample>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.store.add_pod(&pod, sample) {
        Ok(()) => {
            state.metrics.inc_samples_ingested("pod");
            Ok(ok_status())
        }
        Err(e) => {
            state.metrics.inc_ingest_rejection();
            Err(e.into())
        }
    }
}

async fn get_pods(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.latest_pods())
}

async fn get_pod(
    State(state): State<Arc<AppState>>,
    Path(pod): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<PodSample>>, ApiError> {
    let samples = if query.window > 0 {
        state.store.query_pod(&pod, query.window)?
    } else {
        state.store.pod_series(&pod)?
    };
    Ok(Json(samples))
}

// ----- namespace endpoints -----

async fn post_namespace(
    State(state): State<Arc<AppState>>,
    Path(ns): Path<String>,
    Json(sample): Json<NamespaceSample>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.store.add_namespace(&ns, sample) {
        Ok(()) => {
            state.metrics.inc_samples_ingested("namespace");
            Ok(ok_status())
        }
        Err(e) => {
            state.metrics.inc_ingest_rejection();
            Err(e.into())
        }
    }
}

async fn get_namespaces(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.latest_namespaces())
}

async fn get_namespace(
    State(state): State<Arc<AppState>>,
    Path(ns): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<NamespaceSample>>, ApiError> {
    let samples = if query.window > 0 {
        state.store.query_namespace(&ns, query.window)?
    } else {
        state.store.namespace_series(&ns)?
    };
    Ok(Json(samples))
}

async fn get_namespace_pods(
    State(state): State<Arc<AppState>>,
    Path(ns): Path<String>,
) -> impl IntoResponse {
    Json(state.store.pods_by_namespace(&ns))
}

async fn get_namespace_deployments(
    State(state): State<Arc<AppState>>,
    Path(ns): Path<String>,
) -> impl IntoResponse {
    Json(state.store.deployments_by_namespace(&ns))
}

// ----- deployment endpoints -----

async fn post_deployment(
    State(state): State<Arc<AppState>>,
    Path((ns, dp)): Path<(String, String)>,
    Json(sample): Json<DeploymentSample>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.store.add_deployment(&ns, &dp, sample) {
        Ok(()) => {
            state.metrics.inc_samples_ingested("deployment");
            Ok(ok_status())
        }
        Err(e) => {
            state.metrics.inc_ingest_rejection();
            Err(e.into())
        }
    }
}

async fn get_deployment(
    State(state): State<Arc<AppState>>,
    Path((ns, dp)): Path<(String, String)>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<DeploymentSample>>, ApiError> {
    let samples = if query.window > 0 {
        state.store.query_deployment(&ns, &dp, query.window)?
    } else {
        state.store.deployment_series(&ns, &dp)?
    };
    Ok(Json(samples))
}

async fn get_deployment_pods(
    State(state): State<Arc<AppState>>,
    Path((ns, dp)): Path<(String, String)>,
) -> impl IntoResponse {
    Json(state.store.pods_by_deployment(&ns, &dp))
}

// ----- service endpoints -----

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Cluster Usage Monitor API", "status": "running" }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "timestamp": chrono::Utc::now() }))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/nodes", get(get_nodes))
        .route("/api/nodes/:node", get(get_node).post(post_node))
        .route("/api/nodes/:node/pods", get(get_node_pods))
        .route("/api/pods", get(get_pods))
        .route("/api/pods/:pod", get(get_pod).post(post_pod))
        .route("/api/namespaces", get(get_namespaces))
        .route("/api/namespaces/:ns", get(get_namespace).post(post_namespace))
        .route("/api/namespaces/:ns/pods", get(get_namespace_pods))
        .route(
            "/api/namespaces/:ns/deployments",
            get(get_namespace_deployments),
        )
        .route(
            "/api/namespaces/:ns/deployments/:dp",
            get(get_deployment).post(post_deployment),
        )
        .route(
            "/api/namespaces/:ns/deployments/:dp/pods",
            get(get_deployment_pods),
        )
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
