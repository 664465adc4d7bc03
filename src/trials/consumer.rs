use super::coordinator::TrialEventProcessor;
use super::AnalysisResult;
use crate::analysis_registry::AnalysisRegistry;
use crate::queue::{Delivery, EventStream};
use crate::types::{AppError, AppResult};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

/// Reads trial events from a consumer group and hands each to the
/// coordinator. A message is checkpointed only after its analysis succeeds,
/// so failures are redelivered.
pub struct EventConsumer {
    stream: Arc<dyn EventStream>,
    processor: Arc<dyn TrialEventProcessor>,
    registry: AnalysisRegistry,
    group: String,
    consumer_name: String,
}

impl EventConsumer {
    pub fn new(
        stream: Arc<dyn EventStream>,
        processor: Arc<dyn TrialEventProcessor>,
        registry: AnalysisRegistry,
        group: impl Into<String>,
        consumer_name: impl Into<String>,
    ) -> Self {
        Self {
            stream,
            processor,
            registry,
            group: group.into(),
            consumer_name: consumer_name.into(),
        }
    }

    /// Joins the consumer group, creating it at the stream tail if needed.
    pub async fn prepare(&self) -> AppResult<()> {
        self.stream.ensure_group(&self.group).await
    }

    /// Consumes until an event fails or `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        self.prepare().await?;
        info!(
            stream = %self.stream.name(),
            group = %self.group,
            consumer = %self.consumer_name,
            "Listening for trial events"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(consumer = %self.consumer_name, "Consumer stopped");
                    return Ok(());
                }
                polled = self.poll_once() => {
                    polled?;
                }
            }
        }
    }

    /// Receives and fully handles at most one message.
    pub async fn poll_once(&self) -> AppResult<Option<AnalysisResult>> {
        let Some(delivery) = self.stream.receive(&self.group, &self.consumer_name).await? else {
            return Ok(None);
        };
        self.handle(delivery).await.map(Some)
    }

    async fn handle(&self, delivery: Delivery) -> AppResult<AnalysisResult> {
        let event = parse_event(&delivery.body).map_err(|e| {
            error!(message_id = %delivery.id, error = %e, "Malformed trial event");
            e
        })?;
        let trial_id = event
            .get("trial_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let result = match self.process_event(&event).await {
            Ok(result) => result,
            Err(e) => {
                error!(trial_id = %trial_id, message_id = %delivery.id, error = %e, "Error processing event");
                return Err(e);
            }
        };

        let deliveries = self.registry.upsert(result.clone()).await;
        self.stream.checkpoint(&self.group, &delivery).await?;
        info!(
            trial_id = %trial_id,
            message_id = %delivery.id,
            analyses = result.analysis.len(),
            deliveries,
            "Event processed"
        );
        Ok(result)
    }

    pub async fn process_event(&self, event: &Value) -> AppResult<AnalysisResult> {
        let trial_id = event.get("trial_id").and_then(Value::as_str).unwrap_or("unknown");
        let span = info_span!("process_trial_event", trial_id = %trial_id);
        self.processor.process_trial_event(event).instrument(span).await
    }
}

fn parse_event(body: &str) -> AppResult<Value> {
    let event: Value = serde_json::from_str(body)?;
    if !event.is_object() {
        return Err(AppError::InvalidRequest(
            "trial event payload must be a JSON object".to_string(),
        ));
    }
    Ok(event)
}
