//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/health`, `/api/health` - Health checks
//! - `/simulate`, `/api/trials/*` - Trial event simulation and recorded analyses
//! - `/molecule-analysis` etc., also under `/api/agents/` - Domain agents
//! - `/api/agents/literature-chat` - Streaming literature chat
//! - `/medication/analyze`, `/api/medication/*` - Medication information

pub mod agents;
pub mod extract;
pub mod health;
pub mod medication;
pub mod trials;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;
use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
///
/// Domain agent routes are served both at the root and under `/api/agents`;
/// the streaming chat route exists only under `/api/agents`.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");
    let origins = state.config.server.cors_allowed_origins.clone();

    let router = Router::new()
        .merge(health::router(state.clone()))
        .merge(trials::router(state.clone()))
        .merge(agents::router(state.clone()))
        .nest(
            "/api/agents",
            agents::router(state.clone()).merge(agents::streaming_router(state.clone())),
        )
        .merge(medication::router(state))
        .layer(TraceLayer::new_for_http());

    apply_cors(router, &origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_state, test_state_without_stream, ScriptedAgentService};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_simulate_publishes_one_batch() {
        let (state, stream) = test_state(Arc::new(ScriptedAgentService::echo()));
        let (status, body) = call(create_router(state), post("/api/trials/simulate?num_events=3")).await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["count"], 3);

        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 3);
        for event in events {
            let trial_id = event["trial_id"].as_str().unwrap();
            assert_eq!(trial_id.len(), 6);
            assert!(trial_id.starts_with("CTO"));
            assert!(trial_id[3..].chars().all(|c| c.is_ascii_digit()));
            let timestamp = event["timestamp"].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
        }

        let batches = stream.batches().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[tokio::test]
    async fn test_simulate_defaults_to_one_event() {
        let (state, stream) = test_state(Arc::new(ScriptedAgentService::echo()));
        let (status, _) = call(create_router(state), post("/simulate")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stream.len().await, 1);
    }

    #[tokio::test]
    async fn test_simulate_rejects_out_of_range_counts() {
        for uri in ["/api/trials/simulate?num_events=0", "/api/trials/simulate?num_events=101"] {
            let (state, stream) = test_state(Arc::new(ScriptedAgentService::echo()));
            let (status, body) = call(create_router(state), post(uri)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert!(body.contains("detail"));
            assert!(stream.batches().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_simulate_without_stream_is_server_error() {
        let state = test_state_without_stream(Arc::new(ScriptedAgentService::echo()));
        let (status, body) = call(create_router(state), post("/api/trials/simulate?num_events=2")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("event stream is not configured"));
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::echo()));
        let router = create_router(state);

        let (status, body) = call(router.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), serde_json::json!({"status": "ok"}));

        let (status, body) = call(router, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["agent_backend"], "scripted");
        assert_eq!(body["stream"], "memory:in-memory");
    }

    #[tokio::test]
    async fn test_molecule_route_mounted_twice() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::new(|_, _| Ok("No JSON here".to_string()))));
        let router = create_router(state);
        let body = r#"{"smiles": "CC(=O)OC1=CC=CC=C1C(=O)O", "target_proteins": ["COX-1"]}"#;

        for uri in ["/molecule-analysis", "/api/agents/molecule-analysis"] {
            let (status, body) = call(router.clone(), post_json(uri, body)).await;
            assert_eq!(status, StatusCode::OK);
            let body: Value = serde_json::from_str(&body).unwrap();
            assert_eq!(body["source"], "local_model");
            assert_eq!(body["molecular_weight"], 180.16);
        }
    }

    #[tokio::test]
    async fn test_empty_smiles_is_unprocessable() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::echo()));
        let (status, _) = call(create_router(state), post_json("/molecule-analysis", r#"{"smiles": ""}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_required_field_is_json_422() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::echo()));
        let router = create_router(state);

        for uri in ["/molecule-analysis", "/api/agents/precision-med", "/api/medication/analyze"] {
            let (status, body) = call(router.clone(), post_json(uri, "{}")).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            let body: Value = serde_json::from_str(&body).unwrap();
            assert!(body["detail"].as_str().unwrap().contains("missing field"), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_malformed_query_is_json_422() {
        let (state, stream) = test_state(Arc::new(ScriptedAgentService::echo()));
        let (status, body) = call(create_router(state), post("/api/trials/simulate?num_events=many")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert!(body["detail"].is_string());
        assert!(stream.batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_agent_failure_is_server_error() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::echo().failing_creation()));
        let (status, body) = call(
            create_router(state),
            post_json("/api/agents/literature-search", r#"{"query": "statins"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("detail"));
    }

    #[tokio::test]
    async fn test_medication_routes() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::new(|_, _| {
            Ok("Lowers blood sugar.\n\nActivates AMPK.".to_string())
        })));
        let router = create_router(state);

        let (status, body) = call(router.clone(), post_json("/medication/analyze", r#"{"name": "Metformin"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["medication"], "Metformin");
        assert_eq!(body["structured_info"]["mechanism"], "Activates AMPK.");

        let (status, body) = call(
            router,
            post_json("/api/medication/analyze_stream", r#"{"name": "Metformin"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""type":"message""#));
        assert!(body.contains(r#""type":"final""#));
        assert!(body.contains(r#""done":true"#));
    }

    #[tokio::test]
    async fn test_literature_chat_streams_then_finishes() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::new(|_, _| Ok("Two RCTs found.".to_string()))));
        let (status, body) = call(
            create_router(state),
            post_json("/api/agents/literature-chat", r#"{"query": "SGLT2 inhibitors"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"data: {"content":"Two RCTs found."}"#));
        assert!(body.contains(r#"data: {"done":true}"#));
    }

    #[tokio::test]
    async fn test_unknown_trial_analyses_not_found() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::echo()));
        let (status, _) = call(create_router(state), get("/api/trials/analyses/CTO999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    fn post_csv(uri: &str, filename: &str, csv: &str) -> Request<Body> {
        let body = format!(
            "--BOUNDARY\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {csv}\r\n\
             --BOUNDARY--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_check_eligibility_matches_monitored_trials() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::new(|_, _| {
            Ok("Likely a good candidate.".to_string())
        })));
        state
            .analyses
            .upsert(crate::trials::AnalysisResult {
                event_id: None,
                trial_id: Some("CTO042".to_string()),
                timestamp: Some("2024-01-01T00:00:00Z".to_string()),
                analysis: Default::default(),
                recommendations: Vec::new(),
            })
            .await;
        let router = create_router(state);

        let (status, body) = call(
            router.clone(),
            post_json("/check-eligibility", r#"{"age": "45", "gender": "female", "conditions": "Hypertension"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["classification"]["status"], "Likely Eligible");
        assert_eq!(body["classification"]["confidence"], 0.85);
        assert_eq!(body["classification"]["matched_trials"], serde_json::json!(["CTO042"]));
        assert_eq!(body["ai_explanation"], "Likely a good candidate.");
        assert!(body["disclaimer"].as_str().unwrap().contains("educational purposes"));

        let (status, body) = call(
            router,
            post_json("/api/trials/check-eligibility", r#"{"age": 16, "gender": "male"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["classification"]["status"], "Ineligible");
        assert_eq!(body["classification"]["matched_trials"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_check_eligibility_rejects_bad_age() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::echo()));
        let router = create_router(state);

        for body in [r#"{"age": "adult", "gender": "female"}"#, r#"{"age": 200, "gender": "female"}"#, "{}"] {
            let (status, response) = call(router.clone(), post_json("/check-eligibility", body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
            let response: Value = serde_json::from_str(&response).unwrap();
            assert!(response["detail"].is_string(), "{body}");
        }
    }

    #[tokio::test]
    async fn test_data_analysis_profiles_upload() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::new(|_, _| Ok("No JSON here".to_string()))));
        let router = create_router(state);
        let csv = "age,dose_mg,response\r\n34,0,0.10\r\n45,10,0.35\r\n52,20,0.55\r\n61,30,0.80";

        for uri in ["/data-analysis", "/api/agents/data-analysis"] {
            let (status, body) = call(router.clone(), post_csv(uri, "trial.csv", csv)).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            let body: Value = serde_json::from_str(&body).unwrap();
            assert_eq!(body["filename"], "trial.csv");
            assert_eq!(body["source"], "local_model");
            assert_eq!(body["profile"]["row_count"], 4);
            assert!(body["analysis"]["correlations"]["dose_mg_response"].as_f64().unwrap() > 0.99);
            assert!(body["analysis"]["recommendations"].as_array().unwrap().len() >= 2);
        }
    }

    #[tokio::test]
    async fn test_data_analysis_requires_csv_file() {
        let (state, _) = test_state(Arc::new(ScriptedAgentService::echo()));
        let router = create_router(state);

        let (status, body) = call(router.clone(), post_csv("/data-analysis", "empty.csv", "")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(serde_json::from_str::<Value>(&body).unwrap()["detail"].is_string());

        let (status, body) = call(router, post_json("/data-analysis", "{}")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(serde_json::from_str::<Value>(&body).unwrap()["detail"].is_string());
    }
}
