use async_trait::async_trait;
use futures::stream::BoxStream;
use crate::llm::openai::OpenAIAdapter;
use crate::types::{AppError, AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Streams content deltas as they arrive.
    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>>;
}

/// Configuration for LLM provider (renamed to avoid conflict with LLMProvider enum in types.rs)
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    /// Overrides the provider's default endpoint (Azure resources, proxies, tests).
    pub api_base: Option<String>,
    /// Set for Azure OpenAI, together with the deployment to call.
    pub api_version: Option<String>,
    pub deployment: String,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let kind = LLMProvider::parse(&provider.name).ok_or_else(|| {
            AppError::Configuration(format!("Unsupported LLM provider: {}", provider.name))
        })?;
        let api_base = provider
            .api_base
            .unwrap_or_else(|| kind.default_api_base().to_string());

        let adapter: Box<dyn LLMAdapter> = match &provider.api_version {
            Some(api_version) => Box::new(OpenAIAdapter::azure(
                &provider.api_key,
                &api_base,
                &provider.deployment,
                api_version,
            )),
            None => Box::new(OpenAIAdapter::with_api_base(&provider.api_key, &api_base)),
        };

        Ok(Self {
            adapter,
            provider_name: kind.to_string(),
        })
    }

    pub fn with_adapter(adapter: Box<dyn LLMAdapter>, provider_name: impl Into<String>) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    pub async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        self.adapter.create_chat_completion_stream(request).await
    }
}
