//! Medication Agent
//!
//! Patient-facing medication information. The agent is asked for a JSON
//! object with interactions, warnings and recommendations; its prose is also
//! split into the six standard sections for display.

use super::{source_of, structured_reply, AgentContext, ResultSource};
use crate::llm::{AgentHandle, AgentSpec, ToolSet};
use crate::models::MedicationRequest;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

pub const TAG: &str = "medication-analysis";

pub const DISCLAIMER: &str = "This medication information is for educational purposes only. \
Always consult healthcare professionals for medical advice.";

/// Agent prose split on blank lines, in prompt order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredInfo {
    pub common_uses: String,
    pub mechanism: String,
    pub side_effects: String,
    pub interactions: String,
    pub contraindications: String,
    pub special_populations: String,
}

impl StructuredInfo {
    /// Missing sections are left empty.
    pub fn from_text(text: &str) -> Self {
        let mut sections = text
            .split("\n\n")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let mut next = || sections.next().unwrap_or_default();
        Self {
            common_uses: next(),
            mechanism: next(),
            side_effects: next(),
            interactions: next(),
            contraindications: next(),
            special_populations: next(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationAnalysis {
    pub medication: String,
    pub structured_info: StructuredInfo,
    pub analysis: String,
    pub interactions: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub ai_explanation: String,
    pub disclaimer: String,
    pub agent_id: String,
    pub source: ResultSource,
}

#[derive(Debug, Deserialize)]
struct MedicationReply {
    analysis: Option<String>,
    interactions: Option<Vec<String>>,
    warnings: Option<Vec<String>>,
    recommendations: Option<Vec<String>>,
    explanation: Option<String>,
}

pub struct MedicationAgent;

impl MedicationAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a clinical pharmacist explaining medications to patients in plain \
             language. Cover common uses, mechanism of action, side effects, drug \
             interactions, contraindications and special populations. Use web search for \
             current labeling and the analyze_medication_info function for structure. Never \
             replace professional medical advice.",
        )
        .with_tools(
            ToolSet::default()
                .with_web_search(ctx.search_connection_id.clone())
                .with_function(ctx.scoring.medication_tool()),
        )
    }

    pub(crate) fn create_prompt(request: &MedicationRequest) -> String {
        let notes = request
            .notes
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| format!("\nPatient notes: {}\n", n))
            .unwrap_or_default();
        format!(
            r#"Provide information about the medication {name}.
{notes}
OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "analysis": "One paragraph overview",
  "interactions": ["..."],
  "warnings": ["..."],
  "recommendations": ["..."],
  "explanation": "Six paragraphs separated by blank lines: common uses, mechanism of action, side effects, drug interactions, contraindications, special populations"
}}"#,
            name = request.name,
        )
    }

    /// Merges an agent reply with the template model. Shared by the
    /// blocking and streaming endpoints.
    pub(crate) fn build(
        ctx: &AgentContext,
        request: &MedicationRequest,
        reply_text: String,
        agent_id: String,
    ) -> MedicationAnalysis {
        let local = ctx.scoring.medication.evaluate(request);
        let parsed: Option<MedicationReply> = structured_reply(TAG, &reply_text);
        let source = source_of(&parsed);

        let (analysis, interactions, warnings, recommendations, ai_explanation) = match parsed {
            Some(reply) => (
                reply.analysis.unwrap_or(local.analysis),
                reply.interactions.unwrap_or(local.interactions),
                reply.warnings.unwrap_or(local.warnings),
                reply.recommendations.unwrap_or(local.recommendations),
                reply.explanation.unwrap_or_else(|| reply_text.clone()),
            ),
            None => (
                local.analysis,
                local.interactions,
                local.warnings,
                local.recommendations,
                reply_text.clone(),
            ),
        };

        MedicationAnalysis {
            medication: request.name.clone(),
            structured_info: StructuredInfo::from_text(&ai_explanation),
            analysis,
            interactions,
            warnings,
            recommendations,
            ai_explanation,
            disclaimer: DISCLAIMER.to_string(),
            agent_id,
            source,
        }
    }

    pub async fn analyze(ctx: &AgentContext, request: &MedicationRequest) -> AppResult<MedicationAnalysis> {
        let span = info_span!("medication_analysis", medication = %request.name);
        async {
            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(request))
                .await?;
            let result = Self::build(ctx, request, message.text, message.agent_id);
            info!(source = ?result.source, "Medication analysis complete");
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// The cached medication agent, created on first use.
    pub(crate) async fn agent(ctx: &AgentContext) -> AppResult<AgentHandle> {
        ctx.factory.get_or_create(TAG, || Self::spec(ctx)).await
    }
}
