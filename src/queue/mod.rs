//! Durable event stream transport
//!
//! Producers publish batches of UTF-8 JSON payloads; consumers read through a
//! named consumer group and checkpoint each message once it is handled.
//! Unacknowledged messages are redelivered to the group.

pub mod memory;
pub mod redis_stream;

pub use memory::InMemoryEventStream;
pub use redis_stream::RedisEventStream;

use crate::config::{StreamBackend, StreamConfig};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::Arc;

/// A message handed to a consumer, identified by its stream position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub body: String,
}

#[async_trait]
pub trait EventStream: Send + Sync {
    fn name(&self) -> &str;

    /// Sends all payloads as one atomic transmission, preserving order.
    async fn send_batch(&self, payloads: Vec<String>) -> AppResult<()>;

    /// Creates the consumer group at the stream tail if it does not exist.
    async fn ensure_group(&self, group: &str) -> AppResult<()>;

    /// Returns the next message for this consumer, or `None` when the block
    /// time elapses without one. Pending (unacknowledged) messages are
    /// returned before new ones, including those left behind by consumers
    /// that are no longer running.
    async fn receive(&self, group: &str, consumer: &str) -> AppResult<Option<Delivery>>;

    async fn checkpoint(&self, group: &str, delivery: &Delivery) -> AppResult<()>;
}

/// Connects the stream selected by configuration.
pub async fn connect(config: &StreamConfig) -> AppResult<Arc<dyn EventStream>> {
    config.validate()?;
    match config.backend {
        StreamBackend::Memory => Ok(Arc::new(InMemoryEventStream::new(config.block_duration()))),
        StreamBackend::Redis => {
            let url = config.connection_string.as_deref().ok_or_else(|| {
                AppError::Configuration("EVENT_STREAM_CONNECTION_STRING is missing".to_string())
            })?;
            let name = config.stream_name.as_deref().ok_or_else(|| {
                AppError::Configuration("EVENT_STREAM_NAME is missing".to_string())
            })?;
            let stream = RedisEventStream::connect(url, name, config.block_duration())
                .await?
                .with_claim_idle(config.claim_idle());
            Ok(Arc::new(stream))
        }
    }
}
