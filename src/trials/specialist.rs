use super::AgentReply;
use crate::llm::{AgentHandle, AgentService, AgentSpec};
use crate::types::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// A role-bound agent whose remote handle is created on first use.
///
/// Two callers racing through `ensure_ready` may both create a remote agent;
/// the first one stored wins and the other is dropped.
pub struct SpecializedAgent {
    service: Arc<dyn AgentService>,
    kind: String,
    spec: AgentSpec,
    handle: RwLock<Option<AgentHandle>>,
}

impl SpecializedAgent {
    pub fn new(service: Arc<dyn AgentService>, kind: impl Into<String>, spec: AgentSpec) -> Self {
        Self {
            service,
            kind: kind.into(),
            spec,
            handle: RwLock::new(None),
        }
    }

    #[cfg(test)]
    pub(crate) async fn is_ready(&self) -> bool {
        self.handle.read().await.is_some()
    }

    pub async fn ensure_ready(&self) -> AppResult<AgentHandle> {
        if let Some(handle) = self.handle.read().await.as_ref() {
            return Ok(handle.clone());
        }

        let created = self
            .service
            .create_agent(self.spec.clone())
            .await
            .map_err(|e| {
                error!(
                    agent_kind = %self.kind,
                    model = %self.spec.model,
                    error = %e,
                    "Failed to initialize agent"
                );
                match e {
                    AppError::AgentInitialization { .. } => e,
                    other => AppError::AgentInitialization {
                        agent: self.kind.clone(),
                        reason: other.to_string(),
                    },
                }
            })?;

        let mut slot = self.handle.write().await;
        let handle = slot.get_or_insert(created).clone();
        info!(agent_kind = %self.kind, agent_id = %handle.id, "Agent ready");
        Ok(handle)
    }

    pub async fn process_message(&self, text: &str) -> AppResult<AgentReply> {
        let handle = self.ensure_ready().await?;
        let message = self.service.send_message(&handle, text).await?;
        Ok(AgentReply {
            response: message.text,
            agent_kind: self.kind.clone(),
        })
    }
}
