//! Drug Repurposing Agent
//!
//! Scores an existing molecule against a new indication and lists the
//! literature supporting each opportunity.

use super::{list_or_none, source_of, structured_reply, AgentContext, ResultSource};
use crate::analysis::RepurposingOpportunity;
use crate::llm::{AgentSpec, ToolSet};
use crate::models::DrugRepurposingRequest;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

pub const TAG: &str = "drug-repurpose";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugRepurposingReport {
    pub molecule_id: String,
    pub repurposing_opportunities: Vec<RepurposingOpportunity>,
    pub analysis: String,
    pub agent_id: String,
    pub source: ResultSource,
}

#[derive(Debug, Deserialize)]
struct RepurposingReply {
    #[serde(default)]
    repurposing_opportunities: Vec<RepurposingOpportunity>,
    summary: Option<String>,
}

pub struct DrugRepurposingAgent;

impl DrugRepurposingAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a drug repurposing researcher. Evaluate whether an existing molecule can \
             treat a new indication based on its mechanism, targets and published evidence. \
             Search the literature, use the score_repurposing_candidate function for a \
             baseline, and always answer with the JSON object the user asks for.",
        )
        .with_tools(
            ToolSet::default()
                .with_web_search(ctx.search_connection_id.clone())
                .with_function(ctx.scoring.repurposing_tool()),
        )
    }

    fn create_prompt(request: &DrugRepurposingRequest) -> String {
        format!(
            r#"Assess molecule {molecule} for repurposing to {indication}.

Current indications: {current}
Mechanism of action: {mechanism}
Target proteins: {targets}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "repurposing_opportunities": [
    {{"disease": "...", "confidence": 0.0, "supporting_sources": ["DOI:..."]}}
  ],
  "summary": "Short assessment of the repurposing case"
}}"#,
            molecule = request.molecule_id,
            indication = request.new_indication,
            current = list_or_none(&request.current_indications),
            mechanism = request.mechanism_of_action.as_deref().unwrap_or("unknown"),
            targets = list_or_none(&request.target_proteins),
        )
    }

    pub async fn assess(ctx: &AgentContext, request: &DrugRepurposingRequest) -> AppResult<DrugRepurposingReport> {
        let span = info_span!(
            "drug_repurposing",
            molecule_id = %request.molecule_id,
            indication = %request.new_indication
        );
        async {
            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(request))
                .await?;
            let parsed: Option<RepurposingReply> = structured_reply(TAG, &message.text);

            // An empty opportunity list is treated the same as no structured reply.
            let parsed = parsed.filter(|reply| !reply.repurposing_opportunities.is_empty());
            let source = source_of(&parsed);

            let (repurposing_opportunities, analysis) = match parsed {
                Some(reply) => (
                    reply.repurposing_opportunities,
                    reply.summary.unwrap_or_else(|| message.text.clone()),
                ),
                None => (ctx.scoring.repurposing.evaluate(request), message.text.clone()),
            };

            info!(
                source = ?source,
                opportunities = repurposing_opportunities.len(),
                "Drug repurposing assessment complete"
            );
            Ok(DrugRepurposingReport {
                molecule_id: request.molecule_id.clone(),
                repurposing_opportunities,
                analysis,
                agent_id: message.agent_id,
                source,
            })
        }
        .instrument(span)
        .await
    }
}
