//! Local scoring models
//!
//! Each domain agent pairs the hosted model with a local scoring function.
//! The local result is the fallback when the agent reply cannot be parsed
//! and supplies any field the agent left out. The shipped implementations
//! are randomized placeholders; tests inject deterministic ones.
//!
//! The same functions are offered to hosted agents as callable tools through
//! [`ScoringTool`].

pub mod chemistry;
pub mod clinical;
pub mod production;
pub mod trial_data;

pub use chemistry::{MoleculeProperties, RandomMoleculeModel, RandomRepurposingModel, RepurposingOpportunity};
pub use clinical::{
    AdverseEventRates, EfficacyOutcome, EligibilityStatus, GenomicProfile, MedicationInfo, MetabolizerStatus,
    MinimumAgeRule, RandomGenomicsModel, RandomTrialSimulator, SimulationOutcome, TemplateMedicationModel,
    ToxicityStats,
};
pub use production::{ManufacturingPlan, RandomManufacturingModel};
pub use trial_data::{DescriptiveStat, TrialDataProfile};

use crate::llm::FunctionTool;
use crate::models::{
    DigitalTwinRequest, DrugRepurposingRequest, EligibilityRequest, ManufacturingOptimizationRequest,
    MedicationRequest, MoleculeAnalysisRequest, PrecisionMedicineRequest,
};
use crate::types::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// Strategy for computing a domain result locally from a request.
pub trait ScoringFunction<I, O>: Send + Sync {
    fn evaluate(&self, input: &I) -> O;
}

/// One scoring function per domain, injected into the agent context.
#[derive(Clone)]
pub struct ScoringSuite {
    pub molecule: Arc<dyn ScoringFunction<MoleculeAnalysisRequest, MoleculeProperties>>,
    pub manufacturing: Arc<dyn ScoringFunction<ManufacturingOptimizationRequest, ManufacturingPlan>>,
    pub genomics: Arc<dyn ScoringFunction<PrecisionMedicineRequest, GenomicProfile>>,
    pub simulation: Arc<dyn ScoringFunction<DigitalTwinRequest, SimulationOutcome>>,
    pub repurposing: Arc<dyn ScoringFunction<DrugRepurposingRequest, Vec<RepurposingOpportunity>>>,
    pub medication: Arc<dyn ScoringFunction<MedicationRequest, MedicationInfo>>,
    pub eligibility: Arc<dyn ScoringFunction<EligibilityRequest, EligibilityStatus>>,
}

impl Default for ScoringSuite {
    fn default() -> Self {
        Self {
            molecule: Arc::new(RandomMoleculeModel),
            manufacturing: Arc::new(RandomManufacturingModel),
            genomics: Arc::new(RandomGenomicsModel),
            simulation: Arc::new(RandomTrialSimulator),
            repurposing: Arc::new(RandomRepurposingModel),
            medication: Arc::new(TemplateMedicationModel),
            eligibility: Arc::new(MinimumAgeRule::default()),
        }
    }
}

impl ScoringSuite {
    pub fn molecule_tool(&self) -> Arc<dyn FunctionTool> {
        Arc::new(ScoringTool::new(
            "analyze_molecule_properties",
            "Compute physicochemical properties and target binding predictions for a SMILES string",
            json!({
                "type": "object",
                "properties": {
                    "smiles": {"type": "string"},
                    "target_proteins": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["smiles"]
            }),
            self.molecule.clone(),
        ))
    }

    pub fn manufacturing_tool(&self) -> Arc<dyn FunctionTool> {
        Arc::new(ScoringTool::new(
            "optimize_production",
            "Propose a batch size, production line and unit cost for a drug candidate",
            json!({
                "type": "object",
                "properties": {
                    "drug_candidate": {"type": "string"},
                    "batch_size_range": {"type": "array", "items": {"type": "integer"}},
                    "raw_materials": {"type": "object", "additionalProperties": {"type": "number"}}
                },
                "required": ["drug_candidate", "batch_size_range"]
            }),
            self.manufacturing.clone(),
        ))
    }

    pub fn genomics_tool(&self) -> Arc<dyn FunctionTool> {
        Arc::new(ScoringTool::new(
            "analyze_genetic_profile",
            "Estimate drug compatibility, predicted response and metabolizer status from genetic markers",
            json!({
                "type": "object",
                "properties": {
                    "patient_id": {"type": "string"},
                    "genetic_markers": {"type": "object"},
                    "current_medications": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["patient_id"]
            }),
            self.genomics.clone(),
        ))
    }

    pub fn simulation_tool(&self) -> Arc<dyn FunctionTool> {
        Arc::new(ScoringTool::new(
            "simulate_virtual_trial",
            "Run a virtual patient population simulation for a molecule",
            json!({
                "type": "object",
                "properties": {
                    "molecule_parameters": {"type": "object"},
                    "target_population": {"type": "object"},
                    "simulation_config": {"type": "object"}
                },
                "required": ["molecule_parameters", "target_population"]
            }),
            self.simulation.clone(),
        ))
    }

    pub fn repurposing_tool(&self) -> Arc<dyn FunctionTool> {
        Arc::new(ScoringTool::new(
            "score_repurposing_candidate",
            "Score a molecule for a new indication and list supporting sources",
            json!({
                "type": "object",
                "properties": {
                    "molecule_id": {"type": "string"},
                    "new_indication": {"type": "string"}
                },
                "required": ["molecule_id", "new_indication"]
            }),
            self.repurposing.clone(),
        ))
    }

    pub fn medication_tool(&self) -> Arc<dyn FunctionTool> {
        Arc::new(ScoringTool::new(
            "analyze_medication_info",
            "Structure medication information into analysis, interactions, warnings and recommendations",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "notes": {"type": "string"}
                },
                "required": ["name"]
            }),
            self.medication.clone(),
        ))
    }
}

/// Exposes a scoring function as a hosted-agent function tool. Arguments are
/// decoded into the request type and the result is returned as JSON.
pub struct ScoringTool<I, O> {
    name: &'static str,
    description: &'static str,
    parameters: Value,
    scorer: Arc<dyn ScoringFunction<I, O>>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> ScoringTool<I, O> {
    pub fn new(
        name: &'static str,
        description: &'static str,
        parameters: Value,
        scorer: Arc<dyn ScoringFunction<I, O>>,
    ) -> Self {
        Self {
            name,
            description,
            parameters,
            scorer,
            _types: PhantomData,
        }
    }
}

impl<I, O> FunctionTool for ScoringTool<I, O>
where
    I: DeserializeOwned + 'static,
    O: Serialize + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    fn call(&self, arguments: &Value) -> AppResult<Value> {
        let input: I = serde_json::from_value(arguments.clone())
            .map_err(|e| AppError::InvalidRequest(format!("{}: {}", self.name, e)))?;
        Ok(serde_json::to_value(self.scorer.evaluate(&input))?)
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
