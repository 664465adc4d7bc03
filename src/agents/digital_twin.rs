//! Digital Twin Agent
//!
//! Runs a virtual clinical trial over a synthetic patient population and
//! reports toxicity, efficacy and adverse-event rates.

use super::{source_of, structured_reply, AgentContext, ResultSource};
use crate::analysis::{AdverseEventRates, EfficacyOutcome, SimulationOutcome, ToxicityStats};
use crate::llm::{AgentSpec, ToolSet};
use crate::models::DigitalTwinRequest;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

pub const TAG: &str = "digital-twin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResults {
    pub toxicity: ToxicityStats,
    pub efficacy: EfficacyOutcome,
    pub adverse_events: AdverseEventRates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalTwinSimulation {
    pub simulated_population_size: u32,
    pub mean_toxicity_score: f64,
    pub average_survival_gain: String,
    pub simulation_results: SimulationResults,
    pub analysis: String,
    pub agent_id: String,
    pub source: ResultSource,
}

impl DigitalTwinSimulation {
    fn from_outcome(outcome: SimulationOutcome, analysis: String, agent_id: String, source: ResultSource) -> Self {
        Self {
            simulated_population_size: outcome.population_size,
            mean_toxicity_score: outcome.toxicity.mean,
            average_survival_gain: outcome.efficacy.survival_gain.clone(),
            simulation_results: SimulationResults {
                toxicity: outcome.toxicity,
                efficacy: outcome.efficacy,
                adverse_events: outcome.adverse_events,
            },
            analysis,
            agent_id,
            source,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SimulationReply {
    population_size: Option<u32>,
    toxicity_mean: Option<f64>,
    toxicity_std: Option<f64>,
    response_rate: Option<f64>,
    survival_gain: Option<String>,
    adverse_events: Option<AdverseEventsReply>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdverseEventsReply {
    mild: Option<f64>,
    moderate: Option<f64>,
    severe: Option<f64>,
}

pub struct DigitalTwinAgent;

impl DigitalTwinAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a clinical trial simulation scientist. Model virtual patient populations \
             to estimate toxicity, efficacy and adverse events. Use the code interpreter for \
             statistics and the simulate_virtual_trial function for a baseline run. Always \
             answer with the JSON object the user asks for.",
        )
        .with_tools(
            ToolSet::default()
                .with_code_interpreter()
                .with_function(ctx.scoring.simulation_tool()),
        )
    }

    fn create_prompt(request: &DigitalTwinRequest) -> String {
        format!(
            r#"Simulate a virtual clinical trial.

Molecule parameters: {molecule}
Target population: {population}
Simulation config: {config}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "population_size": 0,
  "toxicity_mean": 0.0,
  "toxicity_std": 0.0,
  "response_rate": 0.0,
  "survival_gain": "N months",
  "adverse_events": {{"mild": 0.0, "moderate": 0.0, "severe": 0.0}},
  "summary": "Short interpretation of the simulated trial"
}}"#,
            molecule = serde_json::to_string(&request.molecule_parameters).unwrap_or_default(),
            population = serde_json::to_string(&request.target_population).unwrap_or_default(),
            config = serde_json::to_string(&request.simulation_config).unwrap_or_default(),
        )
    }

    fn merge(local: SimulationOutcome, reply: SimulationReply) -> SimulationOutcome {
        let events = reply.adverse_events;
        SimulationOutcome {
            population_size: reply.population_size.unwrap_or(local.population_size),
            toxicity: ToxicityStats {
                mean: reply.toxicity_mean.unwrap_or(local.toxicity.mean),
                std: reply.toxicity_std.unwrap_or(local.toxicity.std),
            },
            efficacy: EfficacyOutcome {
                response_rate: reply.response_rate.unwrap_or(local.efficacy.response_rate),
                survival_gain: reply.survival_gain.unwrap_or(local.efficacy.survival_gain),
            },
            adverse_events: AdverseEventRates {
                mild: events.as_ref().and_then(|e| e.mild).unwrap_or(local.adverse_events.mild),
                moderate: events
                    .as_ref()
                    .and_then(|e| e.moderate)
                    .unwrap_or(local.adverse_events.moderate),
                severe: events.as_ref().and_then(|e| e.severe).unwrap_or(local.adverse_events.severe),
            },
        }
    }

    pub async fn simulate(ctx: &AgentContext, request: &DigitalTwinRequest) -> AppResult<DigitalTwinSimulation> {
        let span = info_span!("digital_twin");
        async {
            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(request))
                .await?;
            let local = ctx.scoring.simulation.evaluate(request);
            let parsed: Option<SimulationReply> = structured_reply(TAG, &message.text);
            let source = source_of(&parsed);

            let result = match parsed {
                Some(mut reply) => {
                    let analysis = reply.summary.take().unwrap_or_else(|| message.text.clone());
                    DigitalTwinSimulation::from_outcome(Self::merge(local, reply), analysis, message.agent_id, source)
                }
                None => DigitalTwinSimulation::from_outcome(local, message.text, message.agent_id, source),
            };

            info!(
                source = ?result.source,
                population = result.simulated_population_size,
                "Digital twin simulation complete"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }
}
