// src/runtime.rs

//! Loopback HTTP bridge.
//!
//! Lets another front-end (a desktop shell, a script) ask this process to
//! run the roster tool and get the `{success, message}` result back, plus
//! the execution's event trail.

use crate::{
    auth::api_key_auth,
    config::Config,
    deployment::{build_request, DeploymentMode},
    engine::{events::ExecutionEvent, run_execution, validate_setup, ValidationResult},
    execution_id::ExecutionId,
    metrics::InvocationMetrics,
    process::{ExecutionResult, ProcessRunner},
};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::Span;

/// Everything a request handler needs; shared read-only.
pub struct ServerState {
    pub config: Config,
    pub mode: DeploymentMode,
    pub runner: ProcessRunner,
    pub api_key: Option<String>,
    /// Fired on shutdown so in-flight tool processes are killed.
    pub shutdown: CancellationToken,
}

/* ---------------- server ---------------- */

pub fn build_router(state: Arc<ServerState>) -> Router {
    let protected = Router::new()
        .route("/run", post(run))
        .route("/validate", post(validate))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                    )
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        "request completed"
                    );
                }),
        )
}

pub async fn serve(addr: &str, state: Arc<ServerState>) -> anyhow::Result<()> {
    let socket: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(socket).await?;

    if state.api_key.is_none() {
        tracing::warn!(
            "{} is not set; /run and /validate will refuse requests",
            crate::auth::API_KEY_ENV
        );
    }
    tracing::info!(mode = %state.mode, "dutyrun bridge listening on http://{}", socket);

    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/* ---------------- request models ---------------- */

#[derive(Debug, Serialize, Deserialize)]
pub struct RunRequest {
    pub file_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub execution_id: ExecutionId,
    pub result: ExecutionResult,
    pub metrics: Option<InvocationMetrics>,
    pub events: Vec<ExecutionEvent>,
}

/* ---------------- endpoints ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn run(State(state): State<Arc<ServerState>>, Json(req): Json<RunRequest>) -> Response {
    let request = match build_request(state.mode, &state.config.tool, &req.file_path) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "ok": false,
                    "error": e.to_string(),
                })),
            )
                .into_response();
        }
    };

    let cancel = state.shutdown.child_token();
    let (execution, sink) = run_execution(&state.runner, &request, &cancel).await;

    let body = RunResponse {
        execution_id: execution.id.clone(),
        result: execution.result(),
        metrics: execution.metrics.clone(),
        events: sink.into_events(),
    };

    (StatusCode::OK, Json(body)).into_response()
}

async fn validate(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ValidateRequest>,
) -> Json<ValidationResult> {
    Json(validate_setup(&state.config, state.mode, req.file_path.as_deref()))
}
