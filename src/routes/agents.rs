use std::convert::Infallible;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json as ResponseJson,
    },
    routing::post,
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use validator::Validate;
use crate::agents::{
    DigitalTwinAgent, DigitalTwinSimulation, DrugRepurposingAgent, DrugRepurposingReport, LiteratureAgent,
    LiteratureSummary, ManufacturingAgent, ManufacturingOptimization, MoleculeAgent, MoleculeAnalysis,
    PrecisionMedicineAgent, PrecisionMedicinePlan, TrialDataAgent, TrialDataAnalysis,
};
use crate::models::{
    AppState, DigitalTwinRequest, DrugRepurposingRequest, LiteratureSearchRequest,
    ManufacturingOptimizationRequest, MoleculeAnalysisRequest, PrecisionMedicineRequest,
};
use crate::routes::extract::ApiJson;
use crate::types::{AppError, AppResult};

/// Multipart field carrying the CSV upload.
const UPLOAD_FIELD: &str = "file";

/// Domain agent endpoints, mounted both at the root and under `/api/agents`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/molecule-analysis", post(molecule_analysis))
        .route("/manufacturing-opt", post(manufacturing_optimization))
        .route("/precision-med", post(precision_medicine))
        .route("/digital-twin", post(digital_twin))
        .route("/drug-repurpose", post(drug_repurposing))
        .route("/literature-search", post(literature_search))
        .route("/data-analysis", post(data_analysis))
        .with_state(state)
}

/// Streaming endpoints, mounted under `/api/agents` only.
pub fn streaming_router(state: AppState) -> Router {
    Router::new()
        .route("/literature-chat", post(literature_chat))
        .with_state(state)
}

async fn molecule_analysis(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MoleculeAnalysisRequest>,
) -> AppResult<ResponseJson<MoleculeAnalysis>> {
    request.validate()?;
    Ok(Json(MoleculeAgent::analyze(&state.agents, &request).await?))
}

async fn manufacturing_optimization(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ManufacturingOptimizationRequest>,
) -> AppResult<ResponseJson<ManufacturingOptimization>> {
    request.validate()?;
    Ok(Json(ManufacturingAgent::optimize(&state.agents, &request).await?))
}

async fn precision_medicine(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PrecisionMedicineRequest>,
) -> AppResult<ResponseJson<PrecisionMedicinePlan>> {
    request.validate()?;
    Ok(Json(PrecisionMedicineAgent::plan(&state.agents, &request).await?))
}

async fn digital_twin(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DigitalTwinRequest>,
) -> AppResult<ResponseJson<DigitalTwinSimulation>> {
    request.validate()?;
    Ok(Json(DigitalTwinAgent::simulate(&state.agents, &request).await?))
}

async fn drug_repurposing(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DrugRepurposingRequest>,
) -> AppResult<ResponseJson<DrugRepurposingReport>> {
    request.validate()?;
    Ok(Json(DrugRepurposingAgent::assess(&state.agents, &request).await?))
}

async fn literature_search(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LiteratureSearchRequest>,
) -> AppResult<ResponseJson<LiteratureSummary>> {
    request.validate()?;
    Ok(Json(LiteratureAgent::search(&state.agents, &request).await?))
}

async fn data_analysis(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<ResponseJson<TrialDataAnalysis>> {
    let (filename, csv) = read_upload(multipart?).await?;
    Ok(Json(TrialDataAgent::analyze(&state.agents, &filename, &csv).await?))
}

/// First `file` field as (filename, text); other fields are skipped.
async fn read_upload(mut multipart: Multipart) -> AppResult<(String, String)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.csv").to_string();
        let text = field.text().await?;
        return Ok((filename, text));
    }
    Err(AppError::InvalidRequest(format!(
        "multipart field '{}' with the CSV file is required",
        UPLOAD_FIELD
    )))
}

/// Server-sent events: one `{"content"}` event per text chunk, `{"error"}`
/// if the agent stream fails, then `{"done": true}`.
async fn literature_chat(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LiteratureSearchRequest>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    request.validate()?;
    let chunks = LiteratureAgent::stream(&state.agents, &request).await?;

    let events = chunks
        .map(|chunk| match chunk {
            Ok(text) => json!({ "content": text }),
            Err(e) => json!({ "error": e.to_string() }),
        })
        .chain(stream::once(async { json!({ "done": true }) }))
        .map(|payload| Ok::<_, Infallible>(Event::default().data(payload.to_string())));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
