use super::specialist::SpecializedAgent;
use super::{AgentReply, AnalysisResult, ADVERSE_EVENTS_ANALYSIS, SUMMARY, VITALS_ANALYSIS};
use crate::llm::{AgentService, AgentSpec};
use crate::types::{AppError, AppResult};
use crate::utils::parse_agent_json;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentRole {
    TeamLeader,
    Vitals,
    AdverseEvents,
    DataSummary,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::TeamLeader,
        AgentRole::Vitals,
        AgentRole::AdverseEvents,
        AgentRole::DataSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::TeamLeader => "team_leader",
            AgentRole::Vitals => "vitals",
            AgentRole::AdverseEvents => "adverse_events",
            AgentRole::DataSummary => "data_summary",
        }
    }

    pub fn agent_kind(&self) -> &'static str {
        match self {
            AgentRole::TeamLeader => "TeamLeaderAgent",
            AgentRole::Vitals => "VitalsAgent",
            AgentRole::AdverseEvents => "AdverseEventAgent",
            AgentRole::DataSummary => "DataSummaryAgent",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            AgentRole::TeamLeader => {
                "You are the Team Leader agent coordinating trial analysis. Analyze incoming \
                 trial events and delegate tasks to specialized agents."
            }
            AgentRole::Vitals => {
                "You are a medical expert specialized in analyzing patient vital signs. Analyze \
                 patient vital signs and identify anomalies, noting any values outside normal \
                 clinical ranges."
            }
            AgentRole::AdverseEvents => {
                "You are a clinical safety expert. Monitor and assess adverse events. Assess the \
                 severity and potential implications for the patient and the trial."
            }
            AgentRole::DataSummary => {
                "You are a clinical trial data analyst. Aggregate and summarize trial data trends \
                 and provide concise summaries of each event."
            }
        }
    }
}

/// Anything that can turn a loosely-typed trial event into an analysis.
#[async_trait]
pub trait TrialEventProcessor: Send + Sync {
    async fn process_trial_event(&self, event: &Value) -> AppResult<AnalysisResult>;
}

/// Routes each trial event to the specialists its fields call for and
/// aggregates their replies.
pub struct AgentCoordinator {
    agents: HashMap<AgentRole, SpecializedAgent>,
    leader_review: bool,
}

impl AgentCoordinator {
    pub fn new(service: Arc<dyn AgentService>, model: &str) -> Self {
        let agents = AgentRole::ALL
            .iter()
            .map(|role| {
                let spec = AgentSpec::new(
                    format!("trial-{}", role.as_str().replace('_', "-")),
                    model,
                    role.instructions(),
                );
                (*role, SpecializedAgent::new(service.clone(), role.agent_kind(), spec))
            })
            .collect();

        Self {
            agents,
            leader_review: false,
        }
    }

    /// Asks the team leader for recommendations after the specialists reply.
    pub fn with_leader_review(mut self, enabled: bool) -> Self {
        self.leader_review = enabled;
        self
    }

    fn agent(&self, role: AgentRole) -> AppResult<&SpecializedAgent> {
        self.agents
            .get(&role)
            .ok_or_else(|| AppError::Internal(format!("no agent registered for {}", role.as_str())))
    }

    /// Creates every role's remote agent. Already created agents are reused.
    pub async fn initialize_agents(&self) -> AppResult<()> {
        for role in AgentRole::ALL {
            self.agent(role)?.ensure_ready().await?;
        }
        info!(count = self.agents.len(), "Coordinator agents initialized");
        Ok(())
    }

    /// Field-presence routing: vitals when the event carries vitals, adverse
    /// events when the list is non-empty, and a summary always.
    fn plan(event: &Value) -> Vec<(&'static str, AgentRole, String)> {
        let mut tasks = Vec::with_capacity(3);

        if let Some(vitals) = field(event, "vitals", "vitals") {
            tasks.push((
                VITALS_ANALYSIS,
                AgentRole::Vitals,
                format!("Analyze these vital signs: {}", vitals),
            ));
        }

        if let Some(adverse) = field(event, "adverse_events", "adverseEvents").filter(|v| is_truthy(v)) {
            tasks.push((
                ADVERSE_EVENTS_ANALYSIS,
                AgentRole::AdverseEvents,
                format!("Assess these adverse events: {}", adverse),
            ));
        }

        tasks.push((
            SUMMARY,
            AgentRole::DataSummary,
            format!("Summarize this trial event data: {}", event),
        ));
        tasks
    }

    pub async fn delegate_tasks(&self, event: &Value) -> AppResult<BTreeMap<String, AgentReply>> {
        let tasks = Self::plan(event);
        let calls = tasks.into_iter().map(|(key, role, prompt)| async move {
            let reply = self
                .agent(role)?
                .process_message(&prompt)
                .await
                .map_err(|e| AppError::Delegation {
                    role: role.as_str().to_string(),
                    source: Box::new(e),
                })?;
            Ok::<_, AppError>((key.to_string(), reply))
        });

        Ok(try_join_all(calls).await?.into_iter().collect())
    }

    async fn review(&self, event: &Value, analysis: &BTreeMap<String, AgentReply>) -> AppResult<Vec<String>> {
        let findings: BTreeMap<&str, &str> = analysis
            .iter()
            .map(|(key, reply)| (key.as_str(), reply.response.as_str()))
            .collect();
        let prompt = format!(
            "Review the specialist analyses for this trial event and respond with ONLY a JSON \
             array of short recommendation strings.\n\nEVENT:\n{}\n\nANALYSES:\n{}",
            event,
            serde_json::to_string_pretty(&findings)?
        );

        let reply = self
            .agent(AgentRole::TeamLeader)?
            .process_message(&prompt)
            .await
            .map_err(|e| AppError::Delegation {
                role: AgentRole::TeamLeader.as_str().to_string(),
                source: Box::new(e),
            })?;

        match parse_agent_json::<Vec<String>>(&reply.response) {
            Ok(recommendations) => Ok(recommendations),
            Err(e) => {
                warn!(error = %e, "Team leader recommendations were not a JSON list");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl TrialEventProcessor for AgentCoordinator {
    async fn process_trial_event(&self, event: &Value) -> AppResult<AnalysisResult> {
        let trial_id = text_field(event, "trial_id", "trialId");
        let span = info_span!("delegate", trial_id = trial_id.as_deref().unwrap_or("unknown"));

        let analysis = self.delegate_tasks(event).instrument(span.clone()).await?;
        let recommendations = if self.leader_review {
            self.review(event, &analysis).instrument(span).await?
        } else {
            Vec::new()
        };

        Ok(AnalysisResult {
            event_id: text_field(event, "id", "id").or_else(|| trial_id.clone()),
            trial_id,
            timestamp: text_field(event, "timestamp", "timestamp"),
            analysis,
            recommendations,
        })
    }
}

fn field<'a>(event: &'a Value, key: &str, alias: &str) -> Option<&'a Value> {
    event.get(key).or_else(|| event.get(alias))
}

fn text_field(event: &Value, key: &str, alias: &str) -> Option<String> {
    match field(event, key, alias)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
