//! Literature Agent
//!
//! Answers research questions with a grounded summary of the scientific
//! literature. There is no local model: the agent text is the result.
//! Also backs the streaming literature chat.

use super::AgentContext;
use crate::llm::{AgentSpec, ToolSet};
use crate::models::LiteratureSearchRequest;
use crate::types::AppResult;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

pub const TAG: &str = "literature-search";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureSummary {
    pub query: String,
    pub summary: String,
    pub agent_id: String,
}

pub struct LiteratureAgent;

impl LiteratureAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a biomedical literature analyst. Search PubMed, ClinicalTrials.gov and \
             other scientific sources, then summarize the key findings with citations (DOI or \
             URL). Say clearly when the evidence is weak or conflicting.",
        )
        .with_tools(ToolSet::default().with_web_search(ctx.search_connection_id.clone()))
    }

    fn create_prompt(request: &LiteratureSearchRequest) -> String {
        match request.context.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(context) => format!(
                "Research question: {}\n\nContext: {}\n\nSummarize the most relevant literature.",
                request.query, context
            ),
            None => format!(
                "Research question: {}\n\nSummarize the most relevant literature.",
                request.query
            ),
        }
    }

    pub async fn search(ctx: &AgentContext, request: &LiteratureSearchRequest) -> AppResult<LiteratureSummary> {
        let span = info_span!("literature_search", query = %request.query);
        async {
            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(request))
                .await?;
            info!(chars = message.text.len(), "Literature summary complete");
            Ok(LiteratureSummary {
                query: request.query.clone(),
                summary: message.text,
                agent_id: message.agent_id,
            })
        }
        .instrument(span)
        .await
    }

    /// Streams the summary text as it is produced.
    pub async fn stream(
        ctx: &AgentContext,
        request: &LiteratureSearchRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let agent = ctx.factory.get_or_create(TAG, || Self::spec(ctx)).await?;
        info!(agent_id = %agent.id, query = %request.query, "Streaming literature chat");
        ctx.service()
            .stream_message(&agent, &Self::create_prompt(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAgentService;
    use futures::StreamExt;
    use std::sync::Arc;

    fn request(context: Option<&str>) -> LiteratureSearchRequest {
        LiteratureSearchRequest {
            query: "GLP-1 agonists and cardiovascular outcomes".to_string(),
            context: context.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_summary_is_agent_text() {
        let service = Arc::new(ScriptedAgentService::echo());
        let ctx = AgentContext::new(service.clone(), "gpt-4o");
        let summary = LiteratureAgent::search(&ctx, &request(Some("type 2 diabetes"))).await.unwrap();

        assert!(summary.summary.contains("GLP-1 agonists"));
        assert!(summary.summary.contains("Context: type 2 diabetes"));
        assert_eq!(service.sent_to(TAG).len(), 1);
    }

    #[test]
    fn test_blank_context_is_omitted() {
        let prompt = LiteratureAgent::create_prompt(&request(Some("  ")));
        assert!(!prompt.contains("Context:"));
    }

    #[tokio::test]
    async fn test_stream_yields_reply() {
        let service = Arc::new(ScriptedAgentService::new(|_, _| Ok("Three trials found.".to_string())));
        let ctx = AgentContext::new(service, "gpt-4o");
        let chunks: Vec<String> = LiteratureAgent::stream(&ctx, &request(None))
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), "Three trials found.");
    }
}
