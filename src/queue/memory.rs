// In-process event stream
//
// Keeps every published message and one committed offset per consumer group.
// A receive returns the message at the group's committed offset until it is
// checkpointed, which gives the same redelivery behaviour as a durable stream
// across consumer restarts within one process.

use super::{Delivery, EventStream};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

#[derive(Default)]
struct StreamState {
    messages: Vec<String>,
    groups: HashMap<String, usize>,
    batches: Vec<Vec<String>>,
    failing_sends: usize,
}

pub struct InMemoryEventStream {
    state: Mutex<StreamState>,
    published: watch::Sender<usize>,
    block: Duration,
}

impl InMemoryEventStream {
    pub fn new(block: Duration) -> Self {
        let (published, _) = watch::channel(0);
        Self {
            state: Mutex::new(StreamState::default()),
            published,
            block,
        }
    }

    /// Every batch sent so far, in send order.
    pub async fn batches(&self) -> Vec<Vec<String>> {
        self.state.lock().await.batches.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    pub async fn committed_offset(&self, group: &str) -> Option<usize> {
        self.state.lock().await.groups.get(group).copied()
    }

    /// Makes the next `count` batch sends fail with a transport error.
    pub async fn fail_next_sends(&self, count: usize) {
        self.state.lock().await.failing_sends = count;
    }
}

#[async_trait]
impl EventStream for InMemoryEventStream {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn send_batch(&self, payloads: Vec<String>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(AppError::Transport("stream unavailable".to_string()));
        }
        state.messages.extend(payloads.iter().cloned());
        state.batches.push(payloads);
        self.published.send_replace(state.messages.len());
        Ok(())
    }

    async fn ensure_group(&self, group: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let tail = state.messages.len();
        state.groups.entry(group.to_string()).or_insert(tail);
        Ok(())
    }

    async fn receive(&self, group: &str, _consumer: &str) -> AppResult<Option<Delivery>> {
        let offset = {
            let state = self.state.lock().await;
            let offset = *state.groups.get(group).ok_or_else(|| {
                AppError::Transport(format!("consumer group '{}' does not exist", group))
            })?;
            if let Some(body) = state.messages.get(offset) {
                return Ok(Some(Delivery {
                    id: offset.to_string(),
                    body: body.clone(),
                }));
            }
            offset
        };

        let mut published = self.published.subscribe();
        let arrived = matches!(
            tokio::time::timeout(self.block, published.wait_for(|len| *len > offset)).await,
            Ok(Ok(_))
        );
        if !arrived {
            return Ok(None);
        }

        let state = self.state.lock().await;
        Ok(state.messages.get(offset).map(|body| Delivery {
            id: offset.to_string(),
            body: body.clone(),
        }))
    }

    async fn checkpoint(&self, group: &str, delivery: &Delivery) -> AppResult<()> {
        let position: usize = delivery
            .id
            .parse()
            .map_err(|_| AppError::Transport(format!("invalid message id '{}'", delivery.id)))?;
        let mut state = self.state.lock().await;
        let committed = state.groups.get_mut(group).ok_or_else(|| {
            AppError::Transport(format!("consumer group '{}' does not exist", group))
        })?;
        *committed = (*committed).max(position + 1);
        Ok(())
    }
}
