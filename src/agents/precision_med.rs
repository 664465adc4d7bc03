//! Precision Medicine Agent
//!
//! Pharmacogenomic dosing: the patient's metabolizer status scales the base
//! dose and drives the follow-up plan.

use super::{list_or_none, source_of, structured_reply, AgentContext, ResultSource};
use crate::analysis::{GenomicProfile, MetabolizerStatus};
use crate::llm::{AgentSpec, ToolSet};
use crate::models::PrecisionMedicineRequest;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

pub const TAG: &str = "precision-med";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecisionMedicinePlan {
    pub patient_id: String,
    pub custom_dosage: String,
    pub predicted_outcome: f64,
    pub drug_compatibility_score: f64,
    pub metabolizer_status: MetabolizerStatus,
    pub genetic_risk_factors: Vec<String>,
    pub recommended_followups: Vec<String>,
    pub analysis: String,
    pub agent_id: String,
    pub source: ResultSource,
}

#[derive(Debug, Deserialize)]
struct GenomicsReply {
    drug_compatibility_score: Option<f64>,
    predicted_response: Option<f64>,
    genetic_risk_factors: Option<Vec<String>>,
    metabolizer_status: Option<String>,
    summary: Option<String>,
}

pub struct PrecisionMedicineAgent;

impl PrecisionMedicineAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a clinical pharmacogenomics specialist. Interpret genetic markers, \
             history and current medications to assess drug compatibility and metabolizer \
             status. Use the analyze_genetic_profile function and cite guidance found by web \
             search. Always answer with the JSON object the user asks for.",
        )
        .with_tools(
            ToolSet::default()
                .with_web_search(ctx.search_connection_id.clone())
                .with_function(ctx.scoring.genomics_tool()),
        )
    }

    fn create_prompt(request: &PrecisionMedicineRequest) -> String {
        format!(
            r#"Create a pharmacogenomic dosing assessment for patient {patient}.

Genetic markers: {markers}
Medical history: {history}
Current medications: {medications}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "drug_compatibility_score": 0.0,
  "predicted_response": 0.0,
  "genetic_risk_factors": ["..."],
  "metabolizer_status": "Poor | Intermediate | Normal | Rapid | Ultra-rapid",
  "summary": "Short clinical rationale"
}}"#,
            patient = request.patient_id,
            markers = serde_json::to_string(&request.genetic_markers).unwrap_or_default(),
            history = serde_json::to_string(&request.medical_history).unwrap_or_default(),
            medications = list_or_none(&request.current_medications),
        )
    }

    fn merge(local: GenomicProfile, reply: &GenomicsReply) -> GenomicProfile {
        let metabolizer_status = match reply.metabolizer_status.as_deref() {
            Some(label) => MetabolizerStatus::from_label(label).unwrap_or_else(|| {
                warn!(label = %label, "Unknown metabolizer status in agent reply");
                local.metabolizer_status
            }),
            None => local.metabolizer_status,
        };
        GenomicProfile {
            drug_compatibility_score: reply
                .drug_compatibility_score
                .unwrap_or(local.drug_compatibility_score),
            predicted_response: reply.predicted_response.unwrap_or(local.predicted_response),
            genetic_risk_factors: reply
                .genetic_risk_factors
                .clone()
                .unwrap_or(local.genetic_risk_factors),
            metabolizer_status,
        }
    }

    pub async fn plan(ctx: &AgentContext, request: &PrecisionMedicineRequest) -> AppResult<PrecisionMedicinePlan> {
        let span = info_span!("precision_medicine", patient_id = %request.patient_id);
        async {
            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(request))
                .await?;
            let local = ctx.scoring.genomics.evaluate(request);
            let parsed: Option<GenomicsReply> = structured_reply(TAG, &message.text);
            let source = source_of(&parsed);

            let (profile, analysis) = match parsed {
                Some(reply) => {
                    let profile = Self::merge(local, &reply);
                    (profile, reply.summary.unwrap_or_else(|| message.text.clone()))
                }
                None => (local, message.text.clone()),
            };

            info!(
                source = ?source,
                metabolizer_status = profile.metabolizer_status.label(),
                "Precision medicine plan complete"
            );
            Ok(PrecisionMedicinePlan {
                patient_id: request.patient_id.clone(),
                custom_dosage: profile.metabolizer_status.daily_dose(),
                predicted_outcome: profile.predicted_response,
                drug_compatibility_score: profile.drug_compatibility_score,
                metabolizer_status: profile.metabolizer_status,
                recommended_followups: profile.recommended_followups(),
                genetic_risk_factors: profile.genetic_risk_factors,
                analysis,
                agent_id: message.agent_id,
                source,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_scoring_suite, ScriptedAgentService};
    use std::sync::Arc;

    fn request() -> PrecisionMedicineRequest {
        PrecisionMedicineRequest {
            patient_id: "P-001".to_string(),
            genetic_markers: serde_json::from_str(r#"{"CYP2D6": "*4/*4"}"#).unwrap(),
            medical_history: Default::default(),
            current_medications: vec!["codeine".to_string()],
        }
    }

    fn context(reply: &'static str) -> AgentContext {
        let service = Arc::new(ScriptedAgentService::new(move |_, _| Ok(reply.to_string())));
        AgentContext::new(service, "gpt-4o").with_scoring(fixed_scoring_suite())
    }

    #[tokio::test]
    async fn test_agent_status_drives_dose() {
        let ctx = context(r#"{"metabolizer_status": "poor", "genetic_risk_factors": ["CYP2D6*4"]}"#);
        let plan = PrecisionMedicineAgent::plan(&ctx, &request()).await.unwrap();

        assert_eq!(plan.source, ResultSource::Agent);
        assert_eq!(plan.metabolizer_status, MetabolizerStatus::Poor);
        assert_eq!(plan.custom_dosage, "60 mg daily");
        assert_eq!(plan.genetic_risk_factors, vec!["CYP2D6*4"]);
        assert!(plan.recommended_followups.contains(&"Monitor CYP2D6*4".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_status_keeps_local_value() {
        let ctx = context(r#"{"metabolizer_status": "extensive"}"#);
        let plan = PrecisionMedicineAgent::plan(&ctx, &request()).await.unwrap();

        assert_eq!(plan.metabolizer_status, MetabolizerStatus::Normal);
        assert_eq!(plan.custom_dosage, "120 mg daily");
    }

    #[tokio::test]
    async fn test_text_reply_uses_local_profile() {
        let ctx = context("Consider an alternative analgesic.");
        let plan = PrecisionMedicineAgent::plan(&ctx, &request()).await.unwrap();

        assert_eq!(plan.source, ResultSource::LocalModel);
        assert_eq!(plan.predicted_outcome, 0.8);
        assert_eq!(plan.analysis, "Consider an alternative analgesic.");
    }
}
