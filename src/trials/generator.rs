// Synthetic trial event generation

use super::{AdverseEvent, Severity, StudyArm, TrialEvent, Vitals};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;

const ADVERSE_EVENT_PROBABILITY: f64 = 0.3;

const STUDY_ARMS: [StudyArm; 3] = [StudyArm::DrugA, StudyArm::DrugB, StudyArm::Placebo];
const SEVERITIES: [Severity; 3] = [Severity::Mild, Severity::Moderate, Severity::Severe];

// None is weighted three times so most adverse events carry no description.
const DESCRIPTIONS: [Option<&str>; 7] = [
    Some("Headache"),
    Some("Nausea"),
    Some("Fatigue"),
    Some("Dizziness"),
    None,
    None,
    None,
];

/// Generates a random trial event stamped with the current UTC time.
pub fn generate_event() -> TrialEvent {
    generate_event_with(&mut rand::thread_rng())
}

pub fn generate_event_with<R: Rng + ?Sized>(rng: &mut R) -> TrialEvent {
    let adverse_events = if rng.gen_bool(ADVERSE_EVENT_PROBABILITY) {
        vec![AdverseEvent {
            severity: *SEVERITIES.choose(rng).unwrap_or(&Severity::Mild),
            description: DESCRIPTIONS
                .choose(rng)
                .copied()
                .flatten()
                .map(str::to_string),
        }]
    } else {
        Vec::new()
    };

    TrialEvent {
        trial_id: format!("CTO{:03}", rng.gen_range(1..=999)),
        patient_id: format!("P{:03}", rng.gen_range(1..=999)),
        study_arm: *STUDY_ARMS.choose(rng).unwrap_or(&StudyArm::Placebo),
        timestamp: Utc::now(),
        vitals: Vitals {
            heart_rate: rng.gen_range(60..=100),
            blood_pressure: format!("{}/{}", rng.gen_range(110..=140), rng.gen_range(60..=90)),
            temperature: (rng.gen_range(36.1..=37.2_f64) * 10.0).round() / 10.0,
            respiratory_rate: rng.gen_range(12..=20),
            oxygen_saturation: rng.gen_range(95..=100),
        },
        adverse_events,
    }
}
