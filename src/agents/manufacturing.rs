//! Manufacturing Agent
//!
//! Proposes a production schedule for a drug candidate: batch size within the
//! requested range, a production line and the estimated unit cost.

use super::{source_of, structured_reply, AgentContext, ResultSource};
use crate::llm::{AgentSpec, ToolSet};
use crate::models::ManufacturingOptimizationRequest;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, info_span, Instrument};

pub const TAG: &str = "manufacturing-opt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSchedule {
    pub batch_size: u32,
    pub line_allocation: String,
    pub estimated_unit_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturingOptimization {
    pub drug_candidate: String,
    pub optimized_schedule: ProductionSchedule,
    pub production_efficiency: f64,
    pub material_utilization: BTreeMap<String, f64>,
    pub analysis: String,
    pub agent_id: String,
    pub source: ResultSource,
}

#[derive(Debug, Deserialize)]
struct ScheduleReply {
    batch_size: Option<u32>,
    line_allocation: Option<String>,
    estimated_unit_cost: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ManufacturingReply {
    optimized_schedule: Option<ScheduleReply>,
    production_efficiency: Option<f64>,
    #[serde(default)]
    material_utilization: BTreeMap<String, f64>,
    summary: Option<String>,
}

pub struct ManufacturingAgent;

impl ManufacturingAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a pharmaceutical manufacturing engineer. Optimize batch sizing, line \
             allocation and unit cost under the stated constraints. Use the code interpreter \
             for calculations and the optimize_production function for a baseline plan. \
             Always answer with the JSON object the user asks for.",
        )
        .with_tools(
            ToolSet::default()
                .with_code_interpreter()
                .with_function(ctx.scoring.manufacturing_tool()),
        )
    }

    fn create_prompt(request: &ManufacturingOptimizationRequest) -> String {
        let (low, high) = request.batch_bounds();
        let materials = if request.raw_materials.is_empty() {
            "none specified".to_string()
        } else {
            request
                .raw_materials
                .iter()
                .map(|(name, quantity)| format!("{} ({})", name, quantity))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let constraints = serde_json::to_string(&request.production_constraints).unwrap_or_default();

        format!(
            r#"Optimize the production of drug candidate {candidate}.

Batch size range: {low} to {high}
Raw materials: {materials}
Production constraints: {constraints}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "optimized_schedule": {{
    "batch_size": 0,
    "line_allocation": "Line-1",
    "estimated_unit_cost": 0.0
  }},
  "production_efficiency": 0.0,
  "material_utilization": {{"<material>": 0.0}},
  "summary": "Short rationale for the schedule"
}}"#,
            candidate = request.drug_candidate,
        )
    }

    pub async fn optimize(
        ctx: &AgentContext,
        request: &ManufacturingOptimizationRequest,
    ) -> AppResult<ManufacturingOptimization> {
        let span = info_span!("manufacturing_optimization", drug_candidate = %request.drug_candidate);
        async {
            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(request))
                .await?;
            let local = ctx.scoring.manufacturing.evaluate(request);
            let parsed: Option<ManufacturingReply> = structured_reply(TAG, &message.text);
            let source = source_of(&parsed);

            let result = match parsed {
                Some(reply) => {
                    let schedule = reply.optimized_schedule;
                    let mut material_utilization = local.material_utilization;
                    material_utilization.extend(reply.material_utilization);
                    ManufacturingOptimization {
                        drug_candidate: request.drug_candidate.clone(),
                        optimized_schedule: ProductionSchedule {
                            batch_size: schedule
                                .as_ref()
                                .and_then(|s| s.batch_size)
                                .unwrap_or(local.batch_size),
                            line_allocation: schedule
                                .as_ref()
                                .and_then(|s| s.line_allocation.clone())
                                .unwrap_or(local.line_allocation),
                            estimated_unit_cost: schedule
                                .as_ref()
                                .and_then(|s| s.estimated_unit_cost)
                                .unwrap_or(local.estimated_unit_cost),
                        },
                        production_efficiency: reply
                            .production_efficiency
                            .unwrap_or(local.production_efficiency),
                        material_utilization,
                        analysis: reply.summary.unwrap_or_else(|| message.text.clone()),
                        agent_id: message.agent_id,
                        source,
                    }
                }
                None => ManufacturingOptimization {
                    drug_candidate: request.drug_candidate.clone(),
                    optimized_schedule: ProductionSchedule {
                        batch_size: local.batch_size,
                        line_allocation: local.line_allocation,
                        estimated_unit_cost: local.estimated_unit_cost,
                    },
                    production_efficiency: local.production_efficiency,
                    material_utilization: local.material_utilization,
                    analysis: message.text,
                    agent_id: message.agent_id,
                    source,
                },
            };

            info!(
                source = ?result.source,
                batch_size = result.optimized_schedule.batch_size,
                "Manufacturing optimization complete"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }
}
