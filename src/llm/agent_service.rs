//! Hosted agent abstraction
//!
//! An agent is a remote resource bound to a model, instructions and a tool
//! set. Backends normalize every reply into [`AgentMessage`] so callers never
//! inspect provider-specific response shapes.

use crate::config::{AgentBackend, AgentServiceConfig};
use crate::llm::assistants::AssistantsAgentService;
use crate::llm::chat_agents::ChatAgentService;
use crate::llm::provider::{LLMProviderConfig, LLM};
use crate::types::{AppError, AppResult, TokenUsage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// A locally executed function the hosted agent may call during a run.
pub trait FunctionTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    fn call(&self, arguments: &Value) -> AppResult<Value>;
}

#[derive(Clone, Default)]
pub struct ToolSet {
    /// Connection id of a grounded web search tool.
    pub web_search_connection: Option<String>,
    pub code_interpreter: bool,
    pub functions: Vec<Arc<dyn FunctionTool>>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("web_search_connection", &self.web_search_connection)
            .field("code_interpreter", &self.code_interpreter)
            .field(
                "functions",
                &self.functions.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ToolSet {
    pub fn with_web_search(mut self, connection_id: Option<String>) -> Self {
        self.web_search_connection = connection_id;
        self
    }

    pub fn with_code_interpreter(mut self) -> Self {
        self.code_interpreter = true;
        self
    }

    pub fn with_function(mut self, tool: Arc<dyn FunctionTool>) -> Self {
        self.functions.push(tool);
        self
    }

    pub fn find_function(&self, name: &str) -> Option<&Arc<dyn FunctionTool>> {
        self.functions.iter().find(|t| t.name() == name)
    }

    /// Tool definitions in the hosted agents wire format.
    pub fn definitions(&self) -> Vec<Value> {
        let mut defs = Vec::new();
        if let Some(connection_id) = &self.web_search_connection {
            defs.push(json!({
                "type": "bing_grounding",
                "bing_grounding": { "connections": [{ "connection_id": connection_id }] }
            }));
        }
        if self.code_interpreter {
            defs.push(json!({ "type": "code_interpreter" }));
        }
        for tool in &self.functions {
            defs.push(json!({
                "type": "function",
                "function": {
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters(),
                }
            }));
        }
        defs
    }
}

#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub tools: ToolSet,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, model: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            instructions: instructions.into(),
            tools: ToolSet::default(),
        }
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }
}

/// A created agent. Cheap to clone and shared between callers.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    pub id: String,
    pub name: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub spec: Arc<AgentSpec>,
}

impl AgentHandle {
    pub fn new(id: impl Into<String>, spec: AgentSpec) -> Self {
        Self {
            id: id.into(),
            name: spec.name.clone(),
            model: spec.model.clone(),
            created_at: Utc::now(),
            spec: Arc::new(spec),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentMessage {
    pub text: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait AgentService: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn create_agent(&self, spec: AgentSpec) -> AppResult<AgentHandle>;

    async fn send_message(&self, agent: &AgentHandle, text: &str) -> AppResult<AgentMessage>;

    /// Streams the reply in chunks. Backends without native streaming yield
    /// the whole reply as a single chunk.
    async fn stream_message(
        &self,
        agent: &AgentHandle,
        text: &str,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let message = self.send_message(agent, text).await?;
        Ok(futures::stream::once(async move { Ok(message.text) }).boxed())
    }
}

pub fn agent_service_from_config(config: &AgentServiceConfig) -> AppResult<Arc<dyn AgentService>> {
    match config.backend {
        AgentBackend::Chat => {
            let llm = LLM::new(LLMProviderConfig {
                name: config.provider.clone(),
                api_key: config.api_key.clone(),
                api_base: config.api_base.clone(),
                api_version: config.api_version.clone(),
                deployment: config.model.clone(),
            })?;
            Ok(Arc::new(ChatAgentService::new(llm)))
        }
        AgentBackend::Assistants => {
            if config.api_version.is_some() {
                return Err(AppError::Configuration(
                    "AGENT_API_VERSION (Azure) is only supported with AGENT_BACKEND=chat".to_string(),
                ));
            }
            let api_base = config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            Ok(Arc::new(
                AssistantsAgentService::new(&api_base, &config.api_key)
                    .with_polling(Duration::from_millis(config.poll_interval_ms), config.max_polls),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    impl FunctionTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the arguments back"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        fn call(&self, arguments: &Value) -> AppResult<Value> {
            Ok(arguments.clone())
        }
    }

    #[test]
    fn test_tool_definitions() {
        let tools = ToolSet::default()
            .with_web_search(Some("conn-1".to_string()))
            .with_code_interpreter()
            .with_function(Arc::new(EchoTool));
        let defs = tools.definitions();

        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0]["bing_grounding"]["connections"][0]["connection_id"], "conn-1");
        assert_eq!(defs[1]["type"], "code_interpreter");
        assert_eq!(defs[2]["function"]["name"], "echo");
        assert!(tools.find_function("echo").is_some());
        assert!(tools.find_function("missing").is_none());
    }

    fn agents_config(vars: &[(&str, &str)]) -> AgentServiceConfig {
        let vars: std::collections::HashMap<&str, &str> = vars.iter().copied().collect();
        crate::config::Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap()
            .agents
    }

    #[test]
    fn test_service_from_config_selects_backend() {
        let chat = agent_service_from_config(&agents_config(&[("AGENT_API_KEY", "k")])).unwrap();
        assert_eq!(chat.backend_name(), "chat");

        let azure_chat = agent_service_from_config(&agents_config(&[
            ("AGENT_API_VERSION", "2024-06-01"),
            ("AGENT_API_BASE", "https://example.openai.azure.com"),
        ]))
        .unwrap();
        assert_eq!(azure_chat.backend_name(), "chat");

        let assistants =
            agent_service_from_config(&agents_config(&[("AGENT_BACKEND", "assistants")])).unwrap();
        assert_eq!(assistants.backend_name(), "assistants");
    }

    #[test]
    fn test_azure_version_rejected_for_assistants() {
        let config = agents_config(&[("AGENT_BACKEND", "assistants"), ("AGENT_API_VERSION", "2024-06-01")]);
        assert!(matches!(
            agent_service_from_config(&config),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_tool_set_has_no_definitions() {
        assert!(ToolSet::default().definitions().is_empty());
    }
}
