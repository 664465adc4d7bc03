// Pharmacogenomic, virtual trial and medication placeholder models

use super::{round_to, ScoringFunction};
use crate::models::{DigitalTwinRequest, EligibilityRequest, MedicationRequest, PrecisionMedicineRequest};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const BASE_DOSE_MG: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetabolizerStatus {
    Poor,
    Intermediate,
    Normal,
    Rapid,
    #[serde(rename = "Ultra-rapid")]
    UltraRapid,
}

impl MetabolizerStatus {
    pub const ALL: [MetabolizerStatus; 5] = [
        MetabolizerStatus::Poor,
        MetabolizerStatus::Intermediate,
        MetabolizerStatus::Normal,
        MetabolizerStatus::Rapid,
        MetabolizerStatus::UltraRapid,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetabolizerStatus::Poor => "Poor",
            MetabolizerStatus::Intermediate => "Intermediate",
            MetabolizerStatus::Normal => "Normal",
            MetabolizerStatus::Rapid => "Rapid",
            MetabolizerStatus::UltraRapid => "Ultra-rapid",
        }
    }

    /// Case-insensitive lookup that also accepts "ultra rapid" and "ultrarapid".
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        let normalized = normalized.strip_suffix("metabolizer").unwrap_or(&normalized);
        Self::ALL.into_iter().find(|status| {
            status
                .label()
                .to_ascii_lowercase()
                .replace('-', "")
                == normalized
        })
    }

    pub fn dose_multiplier(&self) -> f64 {
        match self {
            MetabolizerStatus::Poor => 0.5,
            MetabolizerStatus::Intermediate => 0.75,
            MetabolizerStatus::Normal => 1.0,
            MetabolizerStatus::Rapid => 1.25,
            MetabolizerStatus::UltraRapid => 1.5,
        }
    }

    /// Daily dose adjusted from the base dose, e.g. "90 mg daily".
    pub fn daily_dose(&self) -> String {
        format!("{} mg daily", (BASE_DOSE_MG * self.dose_multiplier()).round() as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomicProfile {
    pub drug_compatibility_score: f64,
    pub predicted_response: f64,
    pub genetic_risk_factors: Vec<String>,
    pub metabolizer_status: MetabolizerStatus,
}

impl GenomicProfile {
    pub fn recommended_followups(&self) -> Vec<String> {
        let mut followups = vec!["Monthly biomarker profiling".to_string()];
        if !self.genetic_risk_factors.is_empty() {
            followups.push(format!("Monitor {}", self.genetic_risk_factors.join(", ")));
        }
        followups.push(format!(
            "Adjust dose based on {} metabolizer status",
            self.metabolizer_status.label()
        ));
        followups
    }
}

pub struct RandomGenomicsModel;

impl ScoringFunction<PrecisionMedicineRequest, GenomicProfile> for RandomGenomicsModel {
    fn evaluate(&self, _input: &PrecisionMedicineRequest) -> GenomicProfile {
        let mut rng = rand::thread_rng();
        let risk_factors = rng.gen_range(0..=2);
        GenomicProfile {
            drug_compatibility_score: round_to(rng.gen_range(0.7..0.99), 2),
            predicted_response: round_to(rng.gen_range(0.6..0.95), 2),
            genetic_risk_factors: (1..=risk_factors).map(|i| format!("Variant-{}", i)).collect(),
            metabolizer_status: *MetabolizerStatus::ALL
                .choose(&mut rng)
                .unwrap_or(&MetabolizerStatus::Normal),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToxicityStats {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficacyOutcome {
    pub response_rate: f64,
    pub survival_gain: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdverseEventRates {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub population_size: u32,
    pub toxicity: ToxicityStats,
    pub efficacy: EfficacyOutcome,
    pub adverse_events: AdverseEventRates,
}

pub struct RandomTrialSimulator;

impl ScoringFunction<DigitalTwinRequest, SimulationOutcome> for RandomTrialSimulator {
    fn evaluate(&self, _input: &DigitalTwinRequest) -> SimulationOutcome {
        let mut rng = rand::thread_rng();
        SimulationOutcome {
            population_size: rng.gen_range(5_000..=15_000),
            toxicity: ToxicityStats {
                mean: round_to(rng.gen_range(0.05..0.2), 3),
                std: round_to(rng.gen_range(0.01..0.05), 3),
            },
            efficacy: EfficacyOutcome {
                response_rate: round_to(rng.gen_range(0.4..0.8), 2),
                survival_gain: format!("{} months", rng.gen_range(3..=11)),
            },
            adverse_events: AdverseEventRates {
                mild: round_to(rng.gen_range(0.1..0.3), 3),
                moderate: round_to(rng.gen_range(0.05..0.15), 3),
                severe: round_to(rng.gen_range(0.01..0.05), 3),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationInfo {
    pub analysis: String,
    #[serde(default)]
    pub interactions: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Generic guidance used when no structured agent output is available.
pub struct TemplateMedicationModel;

impl ScoringFunction<MedicationRequest, MedicationInfo> for TemplateMedicationModel {
    fn evaluate(&self, input: &MedicationRequest) -> MedicationInfo {
        let to_strings = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        MedicationInfo {
            analysis: format!("Analysis of {}", input.name),
            interactions: to_strings(&[
                "May interact with other medications",
                "Consult your healthcare provider about potential interactions",
            ]),
            warnings: to_strings(&[
                "Use with caution",
                "Follow prescribed dosage",
                "Store in a cool, dry place",
            ]),
            recommendations: to_strings(&[
                "Take as prescribed",
                "Do not stop taking without consulting your doctor",
                "Report any unusual side effects",
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EligibilityStatus {
    #[serde(rename = "Likely Eligible")]
    LikelyEligible,
    Ineligible,
}

/// Rule-based screen applied before any trial matching.
pub struct MinimumAgeRule {
    pub min_age: u32,
}

impl Default for MinimumAgeRule {
    fn default() -> Self {
        Self { min_age: 18 }
    }
}

impl ScoringFunction<EligibilityRequest, EligibilityStatus> for MinimumAgeRule {
    fn evaluate(&self, input: &EligibilityRequest) -> EligibilityStatus {
        if input.age < self.min_age {
            EligibilityStatus::Ineligible
        } else {
            EligibilityStatus::LikelyEligible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dose_table() {
        let doses: Vec<String> = MetabolizerStatus::ALL.iter().map(|s| s.daily_dose()).collect();
        assert_eq!(
            doses,
            vec!["60 mg daily", "90 mg daily", "120 mg daily", "150 mg daily", "180 mg daily"]
        );
    }

    #[test]
    fn test_status_from_label() {
        assert_eq!(MetabolizerStatus::from_label("poor"), Some(MetabolizerStatus::Poor));
        assert_eq!(MetabolizerStatus::from_label("Ultra-rapid"), Some(MetabolizerStatus::UltraRapid));
        assert_eq!(MetabolizerStatus::from_label("ultra rapid"), Some(MetabolizerStatus::UltraRapid));
        assert_eq!(
            MetabolizerStatus::from_label("Intermediate metabolizer"),
            Some(MetabolizerStatus::Intermediate)
        );
        assert_eq!(MetabolizerStatus::from_label("extensive"), None);
    }

    #[test]
    fn test_followups_mention_risk_factors_and_status() {
        let profile = GenomicProfile {
            drug_compatibility_score: 0.9,
            predicted_response: 0.8,
            genetic_risk_factors: vec!["Variant-1".to_string(), "Variant-2".to_string()],
            metabolizer_status: MetabolizerStatus::UltraRapid,
        };
        assert_eq!(
            profile.recommended_followups(),
            vec![
                "Monthly biomarker profiling",
                "Monitor Variant-1, Variant-2",
                "Adjust dose based on Ultra-rapid metabolizer status",
            ]
        );
    }

    #[test]
    fn test_simulation_ranges() {
        let request = DigitalTwinRequest {
            molecule_parameters: Default::default(),
            target_population: Default::default(),
            simulation_config: Default::default(),
        };
        for _ in 0..200 {
            let outcome = RandomTrialSimulator.evaluate(&request);
            assert!((5_000..=15_000).contains(&outcome.population_size));
            assert!((0.05..=0.2).contains(&outcome.toxicity.mean));
            assert!((0.4..=0.8).contains(&outcome.efficacy.response_rate));
            assert!(outcome.efficacy.survival_gain.ends_with(" months"));
            assert!(outcome.adverse_events.severe <= 0.05);
        }
    }

    #[test]
    fn test_medication_template_names_drug() {
        let info = TemplateMedicationModel.evaluate(&MedicationRequest {
            name: "Metformin".to_string(),
            notes: None,
        });
        assert_eq!(info.analysis, "Analysis of Metformin");
        assert_eq!(info.warnings.len(), 3);
    }

    #[test]
    fn test_minors_are_ineligible() {
        let patient = |age| EligibilityRequest {
            age,
            gender: "female".to_string(),
            conditions: "None".to_string(),
            medications: "None".to_string(),
        };
        let rule = MinimumAgeRule::default();
        assert_eq!(rule.evaluate(&patient(17)), EligibilityStatus::Ineligible);
        assert_eq!(rule.evaluate(&patient(18)), EligibilityStatus::LikelyEligible);
        assert_eq!(
            serde_json::to_value(EligibilityStatus::LikelyEligible).unwrap(),
            "Likely Eligible"
        );
    }
}
