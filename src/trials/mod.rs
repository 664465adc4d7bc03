//! Clinical Trial Event Pipeline
//!
//! Synthetic trial events flow through a durable stream and are fanned out to
//! specialist agents whose partial analyses are aggregated per event:
//!
//! ```text
//! EventProducer ──publish(batch)──▶ EventStream ──receive──▶ EventConsumer
//!                                                                │
//!                                                                ▼
//!                                                        AgentCoordinator
//!                                                     ┌──────┼──────────┐
//!                                                     ▼      ▼          ▼
//!                                                  vitals  adverse   summary
//!                                                     └──────┼──────────┘
//!                                                            ▼
//!                                             AnalysisResult ─▶ AnalysisRegistry
//!                                                            │
//!                                                        checkpoint
//! ```

pub mod consumer;
pub mod coordinator;
pub mod generator;
pub mod producer;
pub mod specialist;

pub use consumer::EventConsumer;
pub use coordinator::{AgentCoordinator, AgentRole, TrialEventProcessor};
pub use generator::{generate_event, generate_event_with};
pub use producer::EventProducer;
pub use specialist::SpecializedAgent;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const VITALS_ANALYSIS: &str = "vitals_analysis";
pub const ADVERSE_EVENTS_ANALYSIS: &str = "adverse_events_analysis";
pub const SUMMARY: &str = "summary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialEvent {
    #[serde(alias = "trialId")]
    pub trial_id: String,
    #[serde(alias = "patientId")]
    pub patient_id: String,
    #[serde(alias = "studyArm")]
    pub study_arm: StudyArm,
    pub timestamp: DateTime<Utc>,
    pub vitals: Vitals,
    #[serde(default, alias = "adverseEvents")]
    pub adverse_events: Vec<AdverseEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudyArm {
    #[serde(rename = "Drug A")]
    DrugA,
    #[serde(rename = "Drug B")]
    DrugB,
    Placebo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(alias = "heartRate")]
    pub heart_rate: u32,
    #[serde(alias = "bloodPressure")]
    pub blood_pressure: String,
    pub temperature: f64,
    #[serde(alias = "respiratoryRate")]
    pub respiratory_rate: u32,
    #[serde(alias = "oxygenSaturation")]
    pub oxygen_saturation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdverseEvent {
    #[serde(alias = "type")]
    pub severity: Severity,
    pub description: Option<String>,
}

/// One specialist's reply for a trial event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub response: String,
    pub agent_kind: String,
}

/// Aggregated specialist output for a single trial event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub event_id: Option<String>,
    pub trial_id: Option<String>,
    pub timestamp: Option<String>,
    pub analysis: BTreeMap<String, AgentReply>,
    pub recommendations: Vec<String>,
}

impl AnalysisResult {
    pub fn analysis_keys(&self) -> Vec<&str> {
        self.analysis.keys().map(String::as_str).collect()
    }
}
