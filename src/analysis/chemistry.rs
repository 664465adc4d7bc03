// Molecule property and drug repurposing placeholder models

use super::{round_to, ScoringFunction};
use crate::models::{DrugRepurposingRequest, MoleculeAnalysisRequest};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeProperties {
    pub molecular_weight: f64,
    #[serde(rename = "logP")]
    pub log_p: f64,
    pub h_bond_donors: u32,
    pub h_bond_acceptors: u32,
    pub tpsa: f64,
    /// Predicted binding affinity per target protein, 0 to 1.
    pub binding_affinities: BTreeMap<String, f64>,
    pub drug_likeness: f64,
}

pub struct RandomMoleculeModel;

impl ScoringFunction<MoleculeAnalysisRequest, MoleculeProperties> for RandomMoleculeModel {
    fn evaluate(&self, input: &MoleculeAnalysisRequest) -> MoleculeProperties {
        let mut rng = rand::thread_rng();
        MoleculeProperties {
            molecular_weight: round_to(rng.gen_range(150.0..600.0), 1),
            log_p: round_to(rng.gen_range(-1.0..5.0), 2),
            h_bond_donors: rng.gen_range(0..=5),
            h_bond_acceptors: rng.gen_range(0..=10),
            tpsa: round_to(rng.gen_range(20.0..140.0), 1),
            binding_affinities: input
                .target_proteins
                .iter()
                .map(|protein| (protein.clone(), round_to(rng.gen_range(0.5..0.95), 2)))
                .collect(),
            drug_likeness: round_to(rng.gen_range(0.3..0.95), 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepurposingOpportunity {
    pub disease: String,
    pub confidence: f64,
    #[serde(default)]
    pub supporting_sources: Vec<String>,
}

pub struct RandomRepurposingModel;

impl ScoringFunction<DrugRepurposingRequest, Vec<RepurposingOpportunity>> for RandomRepurposingModel {
    fn evaluate(&self, input: &DrugRepurposingRequest) -> Vec<RepurposingOpportunity> {
        let confidence = round_to(rand::thread_rng().gen_range(0.5..=1.0), 2);
        vec![RepurposingOpportunity {
            disease: input.new_indication.clone(),
            confidence,
            supporting_sources: vec![
                format!("DOI:10.1234/repurpose-{}", input.molecule_id),
                format!("DOI:10.5678/mechanism-{:.2}", confidence),
            ],
        }]
    }
}
