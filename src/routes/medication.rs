use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json as ResponseJson,
    },
    routing::post,
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use validator::Validate;
use crate::agents::{AgentContext, MedicationAgent, MedicationAnalysis};
use crate::models::{AppState, MedicationRequest};
use crate::routes::extract::ApiJson;
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/medication/analyze", post(analyze))
        .route("/api/medication/analyze", post(analyze))
        .route("/api/medication/analyze_stream", post(analyze_stream))
        .with_state(state)
}

async fn analyze(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MedicationRequest>,
) -> AppResult<ResponseJson<MedicationAnalysis>> {
    request.validate()?;
    Ok(Json(MedicationAgent::analyze(&state.agents, &request).await?))
}

/// Server-sent events: `{"type":"message"}` progress events while the agent
/// answers, then `{"type":"final","done":true,"content":...}` or
/// `{"type":"error"}`.
async fn analyze_stream(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MedicationRequest>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    request.validate()?;
    let (tx, rx) = mpsc::channel::<Value>(32);
    let ctx = state.agents.clone();

    tokio::spawn(async move {
        if let Err(e) = stream_analysis(&ctx, &request, &tx).await {
            error!(medication = %request.name, error = %e, "Streaming medication analysis failed");
            let _ = tx.send(json!({ "type": "error", "error": e.to_string() })).await;
        }
    });

    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|payload| (payload, rx))
    })
    .map(|payload| Ok::<_, Infallible>(Event::default().data(payload.to_string())));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn stream_analysis(ctx: &AgentContext, request: &MedicationRequest, tx: &mpsc::Sender<Value>) -> AppResult<()> {
    let agent = MedicationAgent::agent(ctx).await?;
    if !emit(tx, json!({ "type": "message", "content": format!("Analyzing {}...", request.name) })).await {
        return Ok(());
    }

    let mut chunks = ctx
        .service()
        .stream_message(&agent, &MedicationAgent::create_prompt(request))
        .await?;
    let mut text = String::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        text.push_str(&chunk);
        if !emit(tx, json!({ "type": "message", "content": chunk })).await {
            return Ok(());
        }
    }

    let result = MedicationAgent::build(ctx, request, text, agent.id.clone());
    info!(medication = %request.name, source = ?result.source, "Streamed medication analysis complete");
    emit(tx, json!({ "type": "final", "done": true, "content": result })).await;
    Ok(())
}

/// Returns false once the client has gone away.
async fn emit(tx: &mpsc::Sender<Value>, payload: Value) -> bool {
    if tx.send(payload).await.is_err() {
        debug!("SSE client disconnected");
        return false;
    }
    true
}
