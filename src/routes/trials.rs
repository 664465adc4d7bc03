use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;
use tracing::info;
use crate::analysis_registry::AnalysisRecord;
use crate::agents::{EligibilityAgent, EligibilityAssessment};
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::models::{AnalysesQuery, AppState, EligibilityRequest, SimulateParams, SimulateResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/simulate", post(simulate))
        .route("/api/trials/simulate", post(simulate))
        .route("/check-eligibility", post(check_eligibility))
        .route("/api/trials/check-eligibility", post(check_eligibility))
        .route("/api/trials/analyses", get(list_analyses))
        .route("/api/trials/analyses/{trial_id}", get(trial_analyses))
        .with_state(state)
}

/// Generates `num_events` synthetic events and publishes them as one batch.
pub async fn simulate(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SimulateParams>,
) -> AppResult<ResponseJson<SimulateResponse>> {
    params.validate()?;
    let producer = state.producer.as_ref().ok_or_else(|| {
        AppError::Configuration(
            "event stream is not configured (EVENT_STREAM_CONNECTION_STRING / EVENT_STREAM_NAME)".to_string(),
        )
    })?;

    let events = producer.simulate(params.num_events as usize).await?;
    info!(count = events.len(), stream = %producer.stream_name(), "Simulated trial events");

    Ok(Json(SimulateResponse {
        status: "success".to_string(),
        message: format!("Successfully simulated {} trial events", events.len()),
        count: events.len(),
        events,
    }))
}

/// Trials with recorded analyses are the ones a screened patient can match.
async fn check_eligibility(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EligibilityRequest>,
) -> AppResult<ResponseJson<EligibilityAssessment>> {
    request.validate()?;
    let monitored = state.analyses.trial_ids().await;
    Ok(Json(EligibilityAgent::check(&state.agents, &request, monitored).await?))
}

async fn list_analyses(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalysesQuery>,
) -> ResponseJson<Vec<AnalysisRecord>> {
    Json(state.analyses.recent(query.limit).await)
}

async fn trial_analyses(
    State(state): State<AppState>,
    Path(trial_id): Path<String>,
) -> AppResult<ResponseJson<Vec<AnalysisRecord>>> {
    let records = state.analyses.for_trial(&trial_id).await;
    if records.is_empty() {
        return Err(AppError::NotFound(format!("no analyses recorded for trial {}", trial_id)));
    }
    Ok(Json(records))
}
