use super::generator::generate_event;
use super::TrialEvent;
use crate::queue::EventStream;
use crate::types::AppResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Publishes synthetic trial events to the event stream.
#[derive(Clone)]
pub struct EventProducer {
    stream: Arc<dyn EventStream>,
}

impl EventProducer {
    pub fn new(stream: Arc<dyn EventStream>) -> Self {
        Self { stream }
    }

    pub fn stream_name(&self) -> &str {
        self.stream.name()
    }

    /// Sends all events as a single batch, in order. Nothing is sent for an
    /// empty slice.
    pub async fn publish(&self, events: &[TrialEvent]) -> AppResult<()> {
        if events.is_empty() {
            debug!("No events to publish");
            return Ok(());
        }

        let payloads = events
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        self.stream.send_batch(payloads).await.map_err(|e| {
            error!(stream = %self.stream.name(), count = events.len(), error = %e, "Failed to publish events");
            e
        })?;

        info!(stream = %self.stream.name(), count = events.len(), "Published trial events");
        Ok(())
    }

    /// Generates `count` events and publishes them as one batch.
    pub async fn simulate(&self, count: usize) -> AppResult<Vec<TrialEvent>> {
        let events: Vec<TrialEvent> = (0..count).map(|_| generate_event()).collect();
        self.publish(&events).await?;
        Ok(events)
    }

    /// Publishes one event per `interval` until `max_events` have been sent or
    /// `shutdown` resolves. Returns the number of events published.
    pub async fn run_continuous<F>(
        &self,
        interval: Duration,
        max_events: Option<u64>,
        shutdown: F,
    ) -> AppResult<u64>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut published = 0u64;

        info!(
            stream = %self.stream.name(),
            interval_ms = interval.as_millis() as u64,
            max_events = ?max_events,
            "Starting continuous event production"
        );

        loop {
            if max_events.is_some_and(|max| published >= max) {
                info!(published, "Reached event limit");
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(published, "Event production stopped");
                    break;
                }
                sent = self.publish_one() => {
                    sent?;
                    published += 1;
                }
            }

            if max_events.is_some_and(|max| published >= max) {
                continue;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(published, "Event production stopped");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        Ok(published)
    }

    async fn publish_one(&self) -> AppResult<()> {
        let event = generate_event();
        debug!(trial_id = %event.trial_id, patient_id = %event.patient_id, "Generated event");
        self.publish(std::slice::from_ref(&event)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryEventStream;
    use crate::types::AppError;

    fn memory_stream() -> Arc<InMemoryEventStream> {
        Arc::new(InMemoryEventStream::new(Duration::from_millis(10)))
    }

    #[tokio::test]
    async fn test_publish_sends_one_batch_in_order() {
        let stream = memory_stream();
        let producer = EventProducer::new(stream.clone());

        let events = producer.simulate(3).await.unwrap();
        let batches = stream.batches().await;

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        for (payload, event) in batches[0].iter().zip(&events) {
            let decoded: TrialEvent = serde_json::from_str(payload).unwrap();
            assert_eq!(&decoded, event);
        }
    }

    #[tokio::test]
    async fn test_publish_failure_propagates() {
        let stream = memory_stream();
        stream.fail_next_sends(1).await;
        let producer = EventProducer::new(stream.clone());

        let err = producer.simulate(2).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
        assert_eq!(stream.len().await, 0);
    }

    #[tokio::test]
    async fn test_run_continuous_stops_at_max_events() {
        let stream = memory_stream();
        let producer = EventProducer::new(stream.clone());

        let published = producer
            .run_continuous(Duration::from_millis(1), Some(3), std::future::pending())
            .await
            .unwrap();

        assert_eq!(published, 3);
        assert_eq!(stream.batches().await.len(), 3);
    }

    #[tokio::test]
    async fn test_run_continuous_honors_shutdown() {
        let stream = memory_stream();
        let producer = EventProducer::new(stream.clone());

        let published = producer
            .run_continuous(
                Duration::from_secs(60),
                None,
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await
            .unwrap();

        assert_eq!(published, 1);
    }

    #[tokio::test]
    async fn test_run_continuous_aborts_on_transport_error() {
        let stream = memory_stream();
        stream.fail_next_sends(1).await;
        let producer = EventProducer::new(stream);

        let result = producer
            .run_continuous(Duration::from_millis(1), Some(5), std::future::pending())
            .await;
        assert!(matches!(result, Err(AppError::Transport(_))));
    }
}
