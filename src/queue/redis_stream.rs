// Redis Streams transport
//
// Batches are written with a MULTI/EXEC pipeline of XADDs so a publish either
// lands completely or not at all. Consumer groups map to XGROUP, checkpoints
// to XACK. Entries left pending by a consumer that went away are taken over
// with XAUTOCLAIM once they have been idle for the claim window.

use super::{Delivery, EventStream};
use crate::types::AppResult;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info, warn};

const PAYLOAD_FIELD: &str = "body";

pub struct RedisEventStream {
    conn: ConnectionManager,
    stream: String,
    block: Duration,
    claim_idle: Duration,
}

impl RedisEventStream {
    pub async fn connect(url: &str, stream: &str, block: Duration) -> AppResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(stream = %stream, "Connected to Redis event stream");
        Ok(Self {
            conn,
            stream: stream.to_string(),
            block,
            claim_idle: Duration::from_secs(30),
        })
    }

    pub fn with_claim_idle(mut self, claim_idle: Duration) -> Self {
        self.claim_idle = claim_idle;
        self
    }

    async fn read_one(
        &self,
        group: &str,
        consumer: &str,
        start: &str,
        block: Option<Duration>,
    ) -> AppResult<Option<StreamId>> {
        let mut options = StreamReadOptions::default().group(group, consumer).count(1);
        if let Some(block) = block {
            options = options.block(block.as_millis() as usize);
        }

        let mut conn = self.conn.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[self.stream.as_str()], &[start], &options)
            .await?;

        Ok(reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|key| key.ids.into_iter().next()))
    }

    /// Moves one idle pending entry of any consumer in the group to `consumer`.
    async fn claim_one(&self, group: &str, consumer: &str) -> AppResult<Option<StreamId>> {
        let mut conn = self.conn.clone();
        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(
                &self.stream,
                group,
                consumer,
                self.claim_idle.as_millis() as u64,
                "0-0",
                StreamAutoClaimOptions::default().count(1),
            )
            .await?;

        if !reply.deleted_ids.is_empty() {
            debug!(count = reply.deleted_ids.len(), "Dropped pending entries trimmed from the stream");
        }
        Ok(first_claimed(reply))
    }

    async fn pending_delivery(&self, group: &str, entry: StreamId) -> AppResult<Option<Delivery>> {
        let id = entry.id.clone();
        match to_delivery(entry) {
            Some(delivery) => Ok(Some(delivery)),
            None => {
                // Trimmed from the stream while pending; nothing left to process.
                warn!(id = %id, "Pending entry has no payload, acknowledging");
                let mut conn = self.conn.clone();
                let _: i64 = conn.xack(&self.stream, group, &[&id]).await?;
                Ok(None)
            }
        }
    }
}

fn first_claimed(reply: StreamAutoClaimReply) -> Option<StreamId> {
    reply.claimed.into_iter().next()
}

fn to_delivery(entry: StreamId) -> Option<Delivery> {
    let body = entry.get::<String>(PAYLOAD_FIELD)?;
    Some(Delivery { id: entry.id, body })
}

#[async_trait]
impl EventStream for RedisEventStream {
    fn name(&self) -> &str {
        &self.stream
    }

    async fn send_batch(&self, payloads: Vec<String>) -> AppResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for payload in &payloads {
            pipe.xadd(&self.stream, "*", &[(PAYLOAD_FIELD, payload.as_str())]);
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        debug!(stream = %self.stream, count = payloads.len(), "Batch appended");
        Ok(())
    }

    async fn ensure_group(&self, group: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<()> =
            conn.xgroup_create_mkstream(&self.stream, group, "$").await;
        match created {
            Ok(()) => {
                info!(stream = %self.stream, group = %group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn receive(&self, group: &str, consumer: &str) -> AppResult<Option<Delivery>> {
        // Messages delivered to this consumer but never acknowledged come first.
        if let Some(entry) = self.read_one(group, consumer, "0", None).await? {
            return self.pending_delivery(group, entry).await;
        }

        // Then messages stranded under another consumer name, e.g. before a restart.
        if let Some(entry) = self.claim_one(group, consumer).await? {
            info!(id = %entry.id, consumer = %consumer, "Reclaimed idle pending entry");
            return self.pending_delivery(group, entry).await;
        }

        let entry = self.read_one(group, consumer, ">", Some(self.block)).await?;
        Ok(entry.map(|entry| Delivery {
            body: entry.get::<String>(PAYLOAD_FIELD).unwrap_or_default(),
            id: entry.id,
        }))
    }

    async fn checkpoint(&self, group: &str, delivery: &Delivery) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.xack(&self.stream, group, &[&delivery.id]).await?;
        Ok(())
    }
}
