// Hosted assistants (agents) backend
//
// Flow per message: create a thread with the user message and start a run,
// poll the run until it settles, answer any `requires_action` function calls
// with locally executed tools, then read the newest assistant message.
// Every poll and every tool submission counts against `max_polls`.
//
// Requests go through async-openai's assistants and threads endpoints in
// bring-your-own-types form, so hosted tool definitions the typed API does
// not model (grounded web search) pass through unchanged.

use crate::llm::agent_service::{AgentHandle, AgentMessage, AgentService, AgentSpec};
use crate::types::{AppError, AppResult, TokenUsage};
use async_openai::config::OpenAIConfig;
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct AssistantsAgentService {
    client: Client<OpenAIConfig>,
    poll_interval: Duration,
    max_polls: u32,
}

#[derive(Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

#[derive(Debug, Deserialize)]
struct Run {
    id: String,
    thread_id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<RequiredAction>,
    #[serde(default)]
    last_error: Option<RunError>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct ToolOutput {
    tool_call_id: String,
    output: String,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Deserialize)]
struct MessageText {
    value: String,
}

impl AssistantsAgentService {
    pub fn new(api_base: &str, api_key: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));
        Self {
            client: Client::with_config(config),
            poll_interval: Duration::from_secs(1),
            max_polls: 60,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn start_run(&self, agent: &AgentHandle, text: &str) -> AppResult<Run> {
        let body = json!({
            "assistant_id": agent.id,
            "thread": { "messages": [{ "role": "user", "content": text }] }
        });
        Ok(self.client.threads().create_and_run_byot(body).await?)
    }

    async fn get_run(&self, run: &Run) -> AppResult<Run> {
        Ok(self
            .client
            .threads()
            .runs(&run.thread_id)
            .retrieve_byot(run.id.as_str())
            .await?)
    }

    async fn submit_tool_outputs(&self, agent: &AgentHandle, run: &Run) -> AppResult<Run> {
        let calls = run
            .required_action
            .as_ref()
            .map(|action| action.submit_tool_outputs.tool_calls.as_slice())
            .unwrap_or_default();

        let outputs: Vec<ToolOutput> = calls
            .iter()
            .map(|call| ToolOutput {
                tool_call_id: call.id.clone(),
                output: Self::execute_tool_call(agent, call),
            })
            .collect();

        info!(run_id = %run.id, count = outputs.len(), "Submitting tool outputs");
        Ok(self
            .client
            .threads()
            .runs(&run.thread_id)
            .submit_tool_outputs_byot(run.id.as_str(), json!({ "tool_outputs": outputs }))
            .await?)
    }

    fn execute_tool_call(agent: &AgentHandle, call: &ToolCall) -> String {
        let Some(tool) = agent.spec.tools.find_function(&call.function.name) else {
            warn!(function = %call.function.name, "Agent requested an unknown function");
            return json!({ "error": format!("unknown function {}", call.function.name) }).to_string();
        };

        let arguments: Value = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(&call.function.arguments) {
                Ok(args) => args,
                Err(e) => {
                    warn!(function = %call.function.name, error = %e, "Malformed tool arguments");
                    return json!({ "error": format!("invalid arguments: {}", e) }).to_string();
                }
            }
        };

        match tool.call(&arguments) {
            Ok(output) => output.to_string(),
            Err(e) => {
                warn!(function = %call.function.name, error = %e, "Tool execution failed");
                json!({ "error": e.to_string() }).to_string()
            }
        }
    }

    async fn latest_reply(&self, thread_id: &str) -> AppResult<String> {
        let list: MessageList = self
            .client
            .threads()
            .messages(thread_id)
            .list_byot(&[("order", "desc"), ("limit", "20")])
            .await?;

        list.data
            .into_iter()
            .find(|m| m.role == "assistant")
            .map(|m| {
                m.content
                    .into_iter()
                    .filter(|c| c.kind == "text")
                    .filter_map(|c| c.text.map(|t| t.value))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .ok_or_else(|| AppError::LLMApi("Run completed without an assistant reply".to_string()))
    }
}

#[async_trait]
impl AgentService for AssistantsAgentService {
    fn backend_name(&self) -> &'static str {
        "assistants"
    }

    async fn create_agent(&self, spec: AgentSpec) -> AppResult<AgentHandle> {
        let body = json!({
            "model": spec.model,
            "name": spec.name,
            "instructions": spec.instructions,
            "tools": spec.tools.definitions(),
        });

        let created: CreatedObject = self.client.assistants().create_byot(body).await.map_err(|e| {
            error!(agent = %spec.name, model = %spec.model, error = %e, "Assistant creation failed");
            AppError::AgentInitialization {
                agent: spec.name.clone(),
                reason: e.to_string(),
            }
        })?;

        info!(agent = %spec.name, agent_id = %created.id, "Created hosted agent");
        Ok(AgentHandle::new(created.id, spec))
    }

    async fn send_message(&self, agent: &AgentHandle, text: &str) -> AppResult<AgentMessage> {
        let mut run = self.start_run(agent, text).await?;
        let mut rounds = 0;

        loop {
            debug!(run_id = %run.id, status = ?run.status, "Run status");
            match run.status {
                RunStatus::Completed => break,
                RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete => {
                    let detail = run
                        .last_error
                        .as_ref()
                        .map(|e| {
                            format!(
                                "{}: {}",
                                e.code.as_deref().unwrap_or("error"),
                                e.message.as_deref().unwrap_or("no details")
                            )
                        })
                        .unwrap_or_else(|| "no details".to_string());
                    return Err(AppError::LLMApi(format!("Run {} {:?}: {}", run.id, run.status, detail)));
                }
                _ => {}
            }

            rounds += 1;
            if rounds > self.max_polls {
                return Err(AppError::LLMApi(format!(
                    "Run {} did not finish after {} polls",
                    run.id, self.max_polls
                )));
            }

            run = if run.status == RunStatus::RequiresAction {
                self.submit_tool_outputs(agent, &run).await?
            } else {
                tokio::time::sleep(self.poll_interval).await;
                self.get_run(&run).await?
            };
        }

        let text = self.latest_reply(&run.thread_id).await?;
        Ok(AgentMessage {
            text,
            agent_id: agent.id.clone(),
            thread_id: Some(run.thread_id),
            usage: run.usage,
        })
    }
}
