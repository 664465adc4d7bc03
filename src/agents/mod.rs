//! Domain Agents
//!
//! Request-driven agents for pharmaceutical R&D tasks:
//!
//! - **Molecule Agent**: physicochemical properties and target binding
//! - **Manufacturing Agent**: batch sizing, line allocation and unit cost
//! - **Precision Medicine Agent**: pharmacogenomic dosing
//! - **Digital Twin Agent**: virtual patient population trials
//! - **Drug Repurposing Agent**: new-indication opportunities
//! - **Literature Agent**: grounded literature summaries
//! - **Medication Agent**: patient-facing medication information
//! - **Eligibility Agent**: trial eligibility explanations for patients
//! - **Trial Data Agent**: code-interpreter analysis of uploaded trial CSVs
//!
//! ## Request Flow
//!
//! ```text
//! HTTP request (validated)
//!      │
//!      ▼
//! ┌─────────────┐
//! │ AgentFactory│  → one cached hosted agent per domain tag
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Hosted agent│  → prompt asks for a JSON object
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │    Merge    │  → agent JSON fields win, the local scoring
//! │             │    function fills the rest (or everything
//! └─────────────┘    when the reply is not JSON)
//!      │
//!      ▼
//!  Response
//! ```

pub mod data_analysis;
pub mod digital_twin;
pub mod eligibility;
pub mod factory;
pub mod literature;
pub mod manufacturing;
pub mod medication;
pub mod molecule;
pub mod precision_med;
pub mod repurposing;

pub use data_analysis::{TrialDataAgent, TrialDataAnalysis};
pub use digital_twin::{DigitalTwinAgent, DigitalTwinSimulation};
pub use eligibility::{EligibilityAgent, EligibilityAssessment};
pub use factory::{AgentContext, AgentFactory};
pub use literature::{LiteratureAgent, LiteratureSummary};
pub use manufacturing::{ManufacturingAgent, ManufacturingOptimization};
pub use medication::{MedicationAgent, MedicationAnalysis};
pub use molecule::{MoleculeAgent, MoleculeAnalysis};
pub use precision_med::{PrecisionMedicineAgent, PrecisionMedicinePlan};
pub use repurposing::{DrugRepurposingAgent, DrugRepurposingReport};

use crate::utils::parse_agent_json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where a domain result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Agent,
    LocalModel,
}

/// Parses the structured part of an agent reply. A reply that is not the
/// expected JSON is logged and yields `None` so the caller falls back to the
/// local scoring function.
pub(crate) fn structured_reply<T: DeserializeOwned>(domain: &str, reply: &str) -> Option<T> {
    match parse_agent_json::<T>(reply) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(domain = %domain, error = %e, "Falling back to local model");
            None
        }
    }
}

pub(crate) fn source_of<T>(parsed: &Option<T>) -> ResultSource {
    if parsed.is_some() {
        ResultSource::Agent
    } else {
        ResultSource::LocalModel
    }
}

pub(crate) fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none specified".to_string()
    } else {
        items.join(", ")
    }
}
