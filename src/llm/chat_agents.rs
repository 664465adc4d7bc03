// Agents over plain chat completions
//
// The "agent" lives only in this process: creation records the spec and the
// instructions are sent as the system prompt on every message. Hosted tools
// are not available on this backend.

use crate::llm::agent_service::{AgentHandle, AgentMessage, AgentService, AgentSpec};
use crate::llm::provider::LLM;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};
use async_trait::async_trait;
use futures::stream::BoxStream;
use tracing::{debug, info};

pub struct ChatAgentService {
    llm: LLM,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl ChatAgentService {
    pub fn new(llm: LLM) -> Self {
        Self {
            llm,
            max_tokens: Some(2048),
            temperature: Some(0.3),
        }
    }

    fn request(agent: &AgentHandle, text: &str, max_tokens: Option<u32>, temperature: Option<f32>) -> LLMRequest {
        LLMRequest {
            model: agent.model.clone(),
            messages: vec![LLMMessage::user(text)],
            max_tokens,
            temperature,
            system_instruction: Some(agent.spec.instructions.clone()),
        }
    }
}

#[async_trait]
impl AgentService for ChatAgentService {
    fn backend_name(&self) -> &'static str {
        "chat"
    }

    async fn create_agent(&self, spec: AgentSpec) -> AppResult<AgentHandle> {
        if spec.model.trim().is_empty() {
            return Err(AppError::AgentInitialization {
                agent: spec.name,
                reason: "no model deployment configured".to_string(),
            });
        }
        if !spec.tools.definitions().is_empty() {
            debug!(agent = %spec.name, "Chat backend ignores hosted tools");
        }

        let handle = AgentHandle::new(format!("chat-{}", uuid::Uuid::new_v4()), spec);
        info!(
            agent = %handle.name,
            agent_id = %handle.id,
            provider = %self.llm.provider_name(),
            "Created chat agent"
        );
        Ok(handle)
    }

    async fn send_message(&self, agent: &AgentHandle, text: &str) -> AppResult<AgentMessage> {
        let request = Self::request(agent, text, self.max_tokens, self.temperature);
        let response = self.llm.create_chat_completion(&request).await?;
        Ok(AgentMessage {
            text: response.content,
            agent_id: agent.id.clone(),
            thread_id: None,
            usage: Some(response.usage),
        })
    }

    async fn stream_message(
        &self,
        agent: &AgentHandle,
        text: &str,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let request = Self::request(agent, text, self.max_tokens, self.temperature);
        self.llm.create_chat_completion_stream(&request).await
    }
}
