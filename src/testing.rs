// Shared fakes for unit tests

use crate::agents::AgentContext;
use crate::analysis::{
    AdverseEventRates, EfficacyOutcome, GenomicProfile, ManufacturingPlan, MetabolizerStatus, MinimumAgeRule,
    MoleculeProperties, RepurposingOpportunity, ScoringFunction, ScoringSuite, SimulationOutcome,
    TemplateMedicationModel, ToxicityStats,
};
use crate::analysis_registry::AnalysisRegistry;
use crate::config::Config;
use crate::llm::{AgentHandle, AgentMessage, AgentService, AgentSpec};
use crate::models::{
    AppState, DigitalTwinRequest, DrugRepurposingRequest, ManufacturingOptimizationRequest,
    MoleculeAnalysisRequest, PrecisionMedicineRequest,
};
use crate::queue::InMemoryEventStream;
use crate::trials::EventProducer;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A complete chat completion response body with one assistant choice.
pub(crate) fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop",
            "logprobs": null
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13 }
    })
    .to_string()
}

type Responder = dyn Fn(&AgentHandle, &str) -> AppResult<String> + Send + Sync;

/// Agent service whose replies come from a closure. Records every agent
/// created and every message sent.
pub(crate) struct ScriptedAgentService {
    respond: Box<Responder>,
    fail_creation: bool,
    created: AtomicUsize,
    sent: Mutex<Vec<(String, String)>>,
}

impl ScriptedAgentService {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&AgentHandle, &str) -> AppResult<String> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            fail_creation: false,
            created: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the prompt text verbatim.
    pub(crate) fn echo() -> Self {
        Self::new(|_, text| Ok(text.to_string()))
    }

    pub(crate) fn failing_creation(mut self) -> Self {
        self.fail_creation = true;
        self
    }

    pub(crate) fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Messages sent to agents with the given name, in send order.
    pub(crate) fn sent_to(&self, agent_name: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == agent_name)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl AgentService for ScriptedAgentService {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    async fn create_agent(&self, spec: AgentSpec) -> AppResult<AgentHandle> {
        if self.fail_creation {
            return Err(AppError::AgentInitialization {
                agent: spec.name,
                reason: "creation disabled".to_string(),
            });
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AgentHandle::new(format!("scripted-{}", n), spec))
    }

    async fn send_message(&self, agent: &AgentHandle, text: &str) -> AppResult<AgentMessage> {
        self.sent
            .lock()
            .unwrap()
            .push((agent.name.clone(), text.to_string()));
        let reply = (self.respond)(agent, text)?;
        Ok(AgentMessage {
            text: reply,
            agent_id: agent.id.clone(),
            thread_id: None,
            usage: None,
        })
    }
}

struct FixedMoleculeModel;

impl ScoringFunction<MoleculeAnalysisRequest, MoleculeProperties> for FixedMoleculeModel {
    fn evaluate(&self, input: &MoleculeAnalysisRequest) -> MoleculeProperties {
        MoleculeProperties {
            molecular_weight: 180.16,
            log_p: 1.19,
            h_bond_donors: 1,
            h_bond_acceptors: 4,
            tpsa: 63.6,
            binding_affinities: input
                .target_proteins
                .iter()
                .map(|p| (p.clone(), 0.8))
                .collect(),
            drug_likeness: 0.55,
        }
    }
}

struct FixedManufacturingModel;

impl ScoringFunction<ManufacturingOptimizationRequest, ManufacturingPlan> for FixedManufacturingModel {
    fn evaluate(&self, input: &ManufacturingOptimizationRequest) -> ManufacturingPlan {
        ManufacturingPlan {
            batch_size: input.batch_bounds().0,
            line_allocation: "Line-2".to_string(),
            estimated_unit_cost: 2.5,
            production_efficiency: 0.85,
            material_utilization: input.raw_materials.keys().map(|m| (m.clone(), 0.9)).collect(),
        }
    }
}

struct FixedGenomicsModel;

impl ScoringFunction<PrecisionMedicineRequest, GenomicProfile> for FixedGenomicsModel {
    fn evaluate(&self, _input: &PrecisionMedicineRequest) -> GenomicProfile {
        GenomicProfile {
            drug_compatibility_score: 0.9,
            predicted_response: 0.8,
            genetic_risk_factors: Vec::new(),
            metabolizer_status: MetabolizerStatus::Normal,
        }
    }
}

struct FixedTrialSimulator;

impl ScoringFunction<DigitalTwinRequest, SimulationOutcome> for FixedTrialSimulator {
    fn evaluate(&self, _input: &DigitalTwinRequest) -> SimulationOutcome {
        SimulationOutcome {
            population_size: 10_000,
            toxicity: ToxicityStats { mean: 0.1, std: 0.02 },
            efficacy: EfficacyOutcome {
                response_rate: 0.6,
                survival_gain: "6 months".to_string(),
            },
            adverse_events: AdverseEventRates {
                mild: 0.2,
                moderate: 0.1,
                severe: 0.03,
            },
        }
    }
}

struct FixedRepurposingModel;

impl ScoringFunction<DrugRepurposingRequest, Vec<RepurposingOpportunity>> for FixedRepurposingModel {
    fn evaluate(&self, input: &DrugRepurposingRequest) -> Vec<RepurposingOpportunity> {
        vec![RepurposingOpportunity {
            disease: input.new_indication.clone(),
            confidence: 0.75,
            supporting_sources: vec!["DOI:10.1000/fixed".to_string()],
        }]
    }
}

/// Deterministic scoring functions for assertions on merged results.
pub(crate) fn fixed_scoring_suite() -> ScoringSuite {
    ScoringSuite {
        molecule: Arc::new(FixedMoleculeModel),
        manufacturing: Arc::new(FixedManufacturingModel),
        genomics: Arc::new(FixedGenomicsModel),
        simulation: Arc::new(FixedTrialSimulator),
        repurposing: Arc::new(FixedRepurposingModel),
        medication: Arc::new(TemplateMedicationModel),
        eligibility: Arc::new(MinimumAgeRule::default()),
    }
}

fn memory_config() -> Config {
    Config::from_lookup(|key| match key {
        "STREAM_BACKEND" => Some("memory".to_string()),
        "STREAM_BLOCK_MS" => Some("50".to_string()),
        _ => None,
    })
    .unwrap()
}

/// Application state backed by an in-memory stream.
pub(crate) fn test_state(service: Arc<dyn AgentService>) -> (AppState, Arc<InMemoryEventStream>) {
    let stream = Arc::new(InMemoryEventStream::new(Duration::from_millis(50)));
    let mut state = test_state_without_stream(service);
    state.producer = Some(EventProducer::new(stream.clone()));
    (state, stream)
}

/// Application state with no event stream configured.
pub(crate) fn test_state_without_stream(service: Arc<dyn AgentService>) -> AppState {
    AppState {
        config: memory_config(),
        agents: AgentContext::new(service, "gpt-4o").with_scoring(fixed_scoring_suite()),
        producer: None,
        analyses: AnalysisRegistry::default(),
    }
}
