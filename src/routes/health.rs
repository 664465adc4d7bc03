use axum::{extract::State, response::Json as ResponseJson, routing::get, Json, Router};
use serde_json::{json, Value};
use crate::config::StreamBackend;
use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(liveness))
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn liveness() -> ResponseJson<Value> {
    Json(json!({ "status": "ok" }))
}

async fn health_check(State(state): State<AppState>) -> ResponseJson<HealthResponse> {
    let stream = state.producer.as_ref().map(|producer| {
        let backend = match state.config.stream.backend {
            StreamBackend::Redis => "redis",
            StreamBackend::Memory => "memory",
        };
        format!("{}:{}", backend, producer.stream_name())
    });

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        stream,
        agent_backend: state.agents.service().backend_name().to_string(),
    })
}
