//! Molecule Agent
//!
//! Predicts physicochemical properties and target binding for a SMILES
//! string. The hosted agent can call the local property model as a tool and
//! search published data; its JSON answer is merged over the local model.

use super::{list_or_none, source_of, structured_reply, AgentContext, ResultSource};
use crate::analysis::MoleculeProperties;
use crate::llm::{AgentSpec, ToolSet};
use crate::models::MoleculeAnalysisRequest;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, info_span, Instrument};

pub const TAG: &str = "molecule-analysis";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoleculeAnalysis {
    pub molecule: String,
    #[serde(flatten)]
    pub properties: MoleculeProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_assessment: Option<String>,
    pub analysis: String,
    pub agent_id: String,
    pub source: ResultSource,
}

#[derive(Debug, Deserialize)]
struct MoleculeReply {
    molecular_weight: Option<f64>,
    #[serde(rename = "logP", alias = "log_p")]
    log_p: Option<f64>,
    h_bond_donors: Option<u32>,
    h_bond_acceptors: Option<u32>,
    tpsa: Option<f64>,
    #[serde(default)]
    binding_affinities: BTreeMap<String, f64>,
    drug_likeness: Option<f64>,
    safety_assessment: Option<String>,
    summary: Option<String>,
}

pub struct MoleculeAgent;

impl MoleculeAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a medicinal chemist specializing in molecular property prediction and \
             target binding. Use the analyze_molecule_properties function for computed \
             properties and web search for published data on the molecule and its targets. \
             Always answer with the JSON object the user asks for.",
        )
        .with_tools(
            ToolSet::default()
                .with_web_search(ctx.search_connection_id.clone())
                .with_function(ctx.scoring.molecule_tool()),
        )
    }

    fn create_prompt(request: &MoleculeAnalysisRequest) -> String {
        format!(
            r#"Analyze the following molecule for drug discovery.

SMILES: {smiles}
Target proteins: {targets}
Therapeutic area: {area}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "molecular_weight": 0.0,
  "logP": 0.0,
  "h_bond_donors": 0,
  "h_bond_acceptors": 0,
  "tpsa": 0.0,
  "binding_affinities": {{"<protein>": 0.0}},
  "drug_likeness": 0.0,
  "safety_assessment": "Key safety considerations",
  "summary": "Short narrative of the molecule's drug potential"
}}"#,
            smiles = request.smiles,
            targets = list_or_none(&request.target_proteins),
            area = request.therapeutic_area.as_deref().unwrap_or("unspecified"),
        )
    }

    pub async fn analyze(ctx: &AgentContext, request: &MoleculeAnalysisRequest) -> AppResult<MoleculeAnalysis> {
        let span = info_span!("molecule_analysis", smiles = %request.smiles);
        async {
            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(request))
                .await?;
            let local = ctx.scoring.molecule.evaluate(request);
            let parsed: Option<MoleculeReply> = structured_reply(TAG, &message.text);
            let source = source_of(&parsed);

            let result = match parsed {
                Some(reply) => {
                    let mut binding_affinities = local.binding_affinities;
                    binding_affinities.extend(reply.binding_affinities);
                    MoleculeAnalysis {
                        molecule: request.smiles.clone(),
                        properties: MoleculeProperties {
                            molecular_weight: reply.molecular_weight.unwrap_or(local.molecular_weight),
                            log_p: reply.log_p.unwrap_or(local.log_p),
                            h_bond_donors: reply.h_bond_donors.unwrap_or(local.h_bond_donors),
                            h_bond_acceptors: reply.h_bond_acceptors.unwrap_or(local.h_bond_acceptors),
                            tpsa: reply.tpsa.unwrap_or(local.tpsa),
                            binding_affinities,
                            drug_likeness: reply.drug_likeness.unwrap_or(local.drug_likeness),
                        },
                        safety_assessment: reply.safety_assessment,
                        analysis: reply.summary.unwrap_or_else(|| message.text.clone()),
                        agent_id: message.agent_id,
                        source,
                    }
                }
                None => MoleculeAnalysis {
                    molecule: request.smiles.clone(),
                    properties: local,
                    safety_assessment: None,
                    analysis: message.text,
                    agent_id: message.agent_id,
                    source,
                },
            };

            info!(source = ?result.source, "Molecule analysis complete");
            Ok(result)
        }
        .instrument(span)
        .await
    }
}
