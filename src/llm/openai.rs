// OpenAI-compatible chat completions adapter
// OpenAI, Groq, OpenRouter and GLM share the /chat/completions contract and
// differ only in base URL. Azure OpenAI uses deployment-scoped URLs with an
// `api-version` query and `api-key` header, which `AzureConfig` provides.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse, TokenUsage};
use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, FinishReason,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

pub struct OpenAIAdapter<C: Config = OpenAIConfig> {
    client: Client<C>,
}

impl OpenAIAdapter<OpenAIConfig> {
    pub fn new(api_key: &str) -> Self {
        Self::with_api_base(api_key, "https://api.openai.com/v1")
    }

    pub fn with_api_base(api_key: &str, api_base: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));
        Self {
            client: Client::with_config(config),
        }
    }
}

impl OpenAIAdapter<AzureConfig> {
    pub fn azure(api_key: &str, api_base: &str, deployment: &str, api_version: &str) -> Self {
        let config = AzureConfig::new()
            .with_api_base(api_base.trim_end_matches('/'))
            .with_api_key(api_key)
            .with_deployment_id(deployment)
            .with_api_version(api_version);
        Self {
            client: Client::with_config(config),
        }
    }
}

fn to_chat_message(message: &LLMMessage) -> AppResult<ChatCompletionRequestMessage> {
    let content = message.content.as_str();
    let converted = match message.role.as_str() {
        "system" => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        "user" => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        "assistant" => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        other => return Err(AppError::LLMApi(format!("Unknown message role: {}", other))),
    };
    Ok(converted)
}

fn chat_request(request: &LLMRequest) -> AppResult<CreateChatCompletionRequest> {
    let system = request.system_instruction.as_ref().map(LLMMessage::system);
    let messages = system
        .iter()
        .chain(request.messages.iter())
        .map(to_chat_message)
        .collect::<AppResult<Vec<_>>>()?;

    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(request.model.as_str()).messages(messages);
    if let Some(max_tokens) = request.max_tokens {
        args.max_completion_tokens(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        args.temperature(temperature);
    }
    Ok(args.build()?)
}

/// `ContentFilter` -> `content_filter`
fn finish_reason_label(reason: FinishReason) -> String {
    let name = format!("{:?}", reason);
    let mut label = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                label.push('_');
            }
            label.extend(c.to_lowercase());
        } else {
            label.push(c);
        }
    }
    label
}

#[async_trait]
impl<C> LLMAdapter for OpenAIAdapter<C>
where
    C: Config + Send + Sync + 'static,
{
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let response = self.client.chat().create(chat_request(request)?).await?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("Chat completion returned no choices".to_string()))?;

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice
                .finish_reason
                .map(finish_reason_label)
                .unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }

    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let chunks = self.client.chat().create_stream(chat_request(request)?).await?;

        let deltas = chunks.filter_map(|chunk| async move {
            match chunk {
                Ok(chunk) => {
                    let text: String = chunk
                        .choices
                        .into_iter()
                        .filter_map(|c| c.delta.content)
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(e) => Some(Err(AppError::LLMApi(format!("Stream interrupted: {}", e)))),
            }
        });

        Ok(deltas.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::completion_body;
    use futures::TryStreamExt;

    fn request() -> LLMRequest {
        LLMRequest {
            model: "gpt-4o".to_string(),
            messages: vec![LLMMessage::user("Analyze these vital signs")],
            max_tokens: Some(256),
            temperature: Some(0.2),
            system_instruction: Some("You are a clinician".to_string()),
        }
    }

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 1700000000,
                "model": "gpt-4o",
                "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": null }]
            })
        )
    }

    #[test]
    fn test_finish_reason_label() {
        assert_eq!(finish_reason_label(FinishReason::Stop), "stop");
        assert_eq!(finish_reason_label(FinishReason::ContentFilter), "content_filter");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let err = to_chat_message(&LLMMessage::new("narrator", "hi")).unwrap_err();
        assert!(err.to_string().contains("narrator"));
    }

    #[tokio::test]
    async fn test_chat_completion_parses_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::Regex("You are a clinician".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Vitals normal"))
            .create_async()
            .await;

        let adapter = OpenAIAdapter::with_api_base("test-key", &server.url());
        let response = adapter.create_chat_completion(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "Vitals normal");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 13);
    }

    #[tokio::test]
    async fn test_azure_deployment_url_and_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/deployments/gpt-4o/chat/completions")
            .match_query(mockito::Matcher::UrlEncoded(
                "api-version".into(),
                "2024-06-01".into(),
            ))
            .match_header("api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("ok"))
            .create_async()
            .await;

        let adapter = OpenAIAdapter::azure("test-key", &server.url(), "gpt-4o", "2024-06-01");
        let response = adapter.create_chat_completion(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn test_error_status_maps_to_llm_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"message":"Unsupported model","type":"invalid_request_error","param":null,"code":null}}"#)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::with_api_base("test-key", &server.url());
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();
        match err {
            AppError::LLMApi(message) => assert!(message.contains("Unsupported model")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_collects_deltas() {
        let mut server = mockito::Server::new_async().await;
        let body = format!("{}{}data: [DONE]\n\n", chunk("Patient "), chunk("stable"));
        server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::Regex("\"stream\":true".to_string()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::with_api_base("test-key", &server.url());
        let chunks: Vec<String> = adapter
            .create_chat_completion_stream(&request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec!["Patient ", "stable"]);
    }
}
