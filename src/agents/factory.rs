use crate::analysis::ScoringSuite;
use crate::llm::{AgentHandle, AgentMessage, AgentService, AgentSpec};
use crate::types::AppResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Process-wide cache of hosted agents keyed by domain tag.
pub struct AgentFactory {
    service: Arc<dyn AgentService>,
    cache: RwLock<HashMap<String, AgentHandle>>,
}

impl AgentFactory {
    pub fn new(service: Arc<dyn AgentService>) -> Self {
        Self {
            service,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &Arc<dyn AgentService> {
        &self.service
    }

    /// Returns the cached agent for `tag`, creating it from `spec` on first
    /// use. Concurrent first calls may both create an agent; the first one
    /// stored is kept.
    pub async fn get_or_create<F>(&self, tag: &str, spec: F) -> AppResult<AgentHandle>
    where
        F: FnOnce() -> AgentSpec,
    {
        if let Some(handle) = self.cache.read().await.get(tag) {
            return Ok(handle.clone());
        }

        let spec = spec();
        let model = spec.model.clone();
        let created = self.service.create_agent(spec).await.map_err(|e| {
            error!(tag = %tag, model = %model, error = %e, "Failed to create agent");
            e
        })?;

        let mut cache = self.cache.write().await;
        let handle = cache.entry(tag.to_string()).or_insert(created).clone();
        info!(tag = %tag, agent_id = %handle.id, "Agent cached");
        Ok(handle)
    }

    #[cfg(test)]
    pub(crate) async fn cached(&self, tag: &str) -> Option<AgentHandle> {
        self.cache.read().await.get(tag).cloned()
    }
}

/// Everything a domain agent needs, built once by the entry point and
/// shared through application state.
#[derive(Clone)]
pub struct AgentContext {
    pub factory: Arc<AgentFactory>,
    pub scoring: ScoringSuite,
    pub model: String,
    pub search_connection_id: Option<String>,
}

impl AgentContext {
    pub fn new(service: Arc<dyn AgentService>, model: impl Into<String>) -> Self {
        Self {
            factory: Arc::new(AgentFactory::new(service)),
            scoring: ScoringSuite::default(),
            model: model.into(),
            search_connection_id: None,
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringSuite) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_search_connection(mut self, connection_id: Option<String>) -> Self {
        self.search_connection_id = connection_id;
        self
    }

    pub fn service(&self) -> &Arc<dyn AgentService> {
        self.factory.service()
    }

    /// Sends `prompt` to the cached agent for `tag`.
    pub async fn ask<F>(&self, tag: &str, spec: F, prompt: &str) -> AppResult<AgentMessage>
    where
        F: FnOnce() -> AgentSpec,
    {
        let agent = self.factory.get_or_create(tag, spec).await?;
        self.service().send_message(&agent, prompt).await
    }
}
