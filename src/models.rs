use crate::agents::AgentContext;
use crate::analysis_registry::AnalysisRegistry;
use crate::config::Config;
use crate::trials::{EventProducer, TrialEvent};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use validator::Validate;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub agents: AgentContext,
    /// Absent when the event stream is not configured.
    pub producer: Option<EventProducer>,
    pub analyses: AnalysisRegistry,
}

// API Request/Response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub stream: Option<String>,
    pub agent_backend: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SimulateParams {
    #[serde(default = "default_num_events")]
    #[validate(range(min = 1, max = 100, message = "num_events must be between 1 and 100"))]
    pub num_events: u32,
}

fn default_num_events() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateResponse {
    pub status: String,
    pub message: String,
    pub count: usize,
    pub events: Vec<TrialEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysesQuery {
    #[serde(default = "default_analyses_limit")]
    pub limit: usize,
}

fn default_analyses_limit() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MoleculeAnalysisRequest {
    #[validate(length(min = 1, message = "smiles must not be empty"))]
    pub smiles: String,
    #[serde(default)]
    pub target_proteins: Vec<String>,
    #[serde(default)]
    pub therapeutic_area: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ManufacturingOptimizationRequest {
    #[validate(length(min = 1, message = "drug_candidate must not be empty"))]
    pub drug_candidate: String,
    #[validate(length(min = 1, max = 2, message = "batch_size_range must be [min, max]"))]
    pub batch_size_range: Vec<u32>,
    #[serde(default)]
    pub raw_materials: BTreeMap<String, f64>,
    #[serde(default)]
    pub production_constraints: Map<String, Value>,
}

impl ManufacturingOptimizationRequest {
    /// Inclusive (low, high) batch bounds, tolerating a reversed or single-value range.
    pub fn batch_bounds(&self) -> (u32, u32) {
        let first = self.batch_size_range.first().copied().unwrap_or(1);
        let last = self.batch_size_range.last().copied().unwrap_or(first);
        (first.min(last), first.max(last))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrecisionMedicineRequest {
    #[validate(length(min = 1, message = "patient_id must not be empty"))]
    pub patient_id: String,
    #[serde(default)]
    pub genetic_markers: Map<String, Value>,
    #[serde(default)]
    pub medical_history: Map<String, Value>,
    #[serde(default)]
    pub current_medications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DigitalTwinRequest {
    pub molecule_parameters: Map<String, Value>,
    pub target_population: Map<String, Value>,
    #[serde(default)]
    pub simulation_config: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DrugRepurposingRequest {
    #[validate(length(min = 1, message = "molecule_id must not be empty"))]
    pub molecule_id: String,
    #[validate(length(min = 1, message = "new_indication must not be empty"))]
    pub new_indication: String,
    #[serde(default)]
    pub current_indications: Vec<String>,
    #[serde(default)]
    pub mechanism_of_action: Option<String>,
    #[serde(default)]
    pub target_proteins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LiteratureSearchRequest {
    #[validate(length(min = 1, message = "query must not be empty"))]
    pub query: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MedicationRequest {
    #[validate(length(min = 1, message = "medication name must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Patient details for a trial eligibility check. `age` may be sent as a
/// number or as numeric text.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EligibilityRequest {
    #[serde(deserialize_with = "age_from_number_or_text")]
    #[validate(range(max = 130, message = "age must be at most 130"))]
    pub age: u32,
    #[validate(length(min = 1, message = "gender must not be empty"))]
    pub gender: String,
    #[serde(default = "default_not_reported")]
    pub conditions: String,
    #[serde(default = "default_not_reported")]
    pub medications: String,
}

fn default_not_reported() -> String {
    "None".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u32),
    Text(String),
}

fn age_from_number_or_text<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(age) => Ok(age),
        NumberOrText::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("age must be a whole number, got {:?}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_params_bounds() {
        assert!(SimulateParams { num_events: 1 }.validate().is_ok());
        assert!(SimulateParams { num_events: 100 }.validate().is_ok());
        assert!(SimulateParams { num_events: 0 }.validate().is_err());
        assert!(SimulateParams { num_events: 101 }.validate().is_err());
    }

    #[test]
    fn test_batch_bounds() {
        let mut request = ManufacturingOptimizationRequest {
            drug_candidate: "DC".to_string(),
            batch_size_range: vec![500],
            raw_materials: BTreeMap::new(),
            production_constraints: Map::new(),
        };
        assert_eq!(request.batch_bounds(), (500, 500));
        request.batch_size_range = vec![800, 200];
        assert_eq!(request.batch_bounds(), (200, 800));
    }

    #[test]
    fn test_empty_smiles_rejected() {
        let request: MoleculeAnalysisRequest = serde_json::from_str(r#"{"smiles": ""}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_eligibility_age_accepts_number_or_text() {
        let request: EligibilityRequest = serde_json::from_str(r#"{"age": "45", "gender": "female"}"#).unwrap();
        assert_eq!(request.age, 45);
        assert_eq!(request.conditions, "None");
        assert_eq!(request.medications, "None");

        let request: EligibilityRequest = serde_json::from_str(r#"{"age": 17, "gender": "male"}"#).unwrap();
        assert_eq!(request.age, 17);

        let err = serde_json::from_str::<EligibilityRequest>(r#"{"age": "forty", "gender": "male"}"#).unwrap_err();
        assert!(err.to_string().contains("whole number"));
    }
}
