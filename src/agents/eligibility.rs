//! Trial Eligibility Agent
//!
//! Screens a patient against the trials currently being monitored. The
//! status comes from the local age rule; the hosted agent writes the
//! patient-facing explanation.

use super::AgentContext;
use crate::analysis::EligibilityStatus;
use crate::llm::AgentSpec;
use crate::models::EligibilityRequest;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

pub const TAG: &str = "check-eligibility";

/// Fixed confidence of the rule-based screen.
pub const SCREEN_CONFIDENCE: f64 = 0.85;

pub const DISCLAIMER: &str = "This eligibility check is for educational purposes only. \
Final eligibility determination must be made by healthcare professionals.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityClassification {
    pub status: EligibilityStatus,
    pub confidence: f64,
    pub matched_trials: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityAssessment {
    pub classification: EligibilityClassification,
    pub ai_explanation: String,
    pub disclaimer: String,
    pub agent_id: String,
}

pub struct EligibilityAgent;

impl EligibilityAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a medical eligibility assistant. Explain clinical trial eligibility to \
             patients in plain language. Always include appropriate medical disclaimers.",
        )
    }

    fn create_prompt(request: &EligibilityRequest) -> String {
        format!(
            r#"Analyze this patient's eligibility for clinical trials:

Patient Details:
- Age: {age}
- Gender: {gender}
- Medical Conditions: {conditions}
- Current Medications: {medications}

Please provide:
1. Eligibility assessment
2. Key considerations
3. Potential risks
4. Recommendations

Format the response as a clear summary with appropriate medical disclaimers."#,
            age = request.age,
            gender = request.gender,
            conditions = request.conditions,
            medications = request.medications,
        )
    }

    /// `monitored_trials` are matched when the patient passes the screen.
    pub async fn check(
        ctx: &AgentContext,
        request: &EligibilityRequest,
        monitored_trials: Vec<String>,
    ) -> AppResult<EligibilityAssessment> {
        let span = info_span!("eligibility_check", age = request.age);
        async {
            let status = ctx.scoring.eligibility.evaluate(request);
            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(request))
                .await?;

            let matched_trials = match status {
                EligibilityStatus::LikelyEligible => monitored_trials,
                EligibilityStatus::Ineligible => Vec::new(),
            };

            info!(status = ?status, matched = matched_trials.len(), "Eligibility check complete");
            Ok(EligibilityAssessment {
                classification: EligibilityClassification {
                    status,
                    confidence: SCREEN_CONFIDENCE,
                    matched_trials,
                },
                ai_explanation: message.text,
                disclaimer: DISCLAIMER.to_string(),
                agent_id: message.agent_id,
            })
        }
        .instrument(span)
        .await
    }
}
