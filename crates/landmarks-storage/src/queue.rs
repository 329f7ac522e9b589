//! Durable queue — a Redis Streams consumer group carrying
//! [`ProcessingMessage`]s from the Submission Coordinator to the
//! Processing Worker with at-least-once delivery.
//!
//! Unlike a plain list-based queue, a stream entry a consumer claims via
//! `XREADGROUP` stays in that consumer's Pending Entries List until it is
//! explicitly `XACK`ed. A worker that crashes mid-job leaves its claimed
//! entries pending rather than losing them, at the cost of possible
//! redelivery — the pipeline is built to tolerate that.

use async_trait::async_trait;
use landmarks_common::{Error, ProcessingMessage, Result};
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use uuid::Uuid;

use crate::traits::Queue;

const FIELD_PAYLOAD: &str = "payload";

/// A message claimed off the stream, carrying the id needed to ack it.
#[derive(Debug, Clone)]
pub struct ClaimedMessage {
    pub entry_id: String,
    pub message: ProcessingMessage,
}

#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    stream_key: String,
    consumer_group: String,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str, stream_key: &str, consumer_group: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::QueueError(format!("invalid redis url: {e}")))?;
        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::QueueError(format!("connect failed: {e}")))?;

        let create_group: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream_key)
            .arg(consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        if let Err(e) = create_group {
            // BUSYGROUP means the group already exists; anything else is real.
            if !e.to_string().contains("BUSYGROUP") {
                return Err(Error::QueueError(format!("create group failed: {e}")));
            }
        }

        Ok(Self {
            conn,
            stream_key: stream_key.to_string(),
            consumer_group: consumer_group.to_string(),
        })
    }

    /// Approximate number of entries never delivered to any consumer.
    pub async fn queue_depth(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let info: redis::Value = redis::cmd("XLEN")
            .arg(&self.stream_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::QueueError(format!("xlen failed: {e}")))?;
        match info {
            redis::Value::Int(n) => Ok(n as u64),
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl Queue for RedisQueue {
    async fn enqueue(&self, message: &ProcessingMessage) -> Result<String> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.conn.clone();
        let entry_id: String = conn
            .xadd(&self.stream_key, "*", &[(FIELD_PAYLOAD, payload)])
            .await
            .map_err(|e| Error::QueueError(format!("xadd failed: {e}")))?;
        Ok(entry_id)
    }

    /// Claims up to one new message for `consumer_name`, blocking up to
    /// `block_ms` if the stream is empty.
    async fn claim_next(&self, consumer_name: &str, block_ms: u64) -> Result<Option<ClaimedMessage>> {
        let opts = StreamReadOptions::default()
            .group(&self.consumer_group, consumer_name)
            .count(1)
            .block(block_ms as usize);

        let mut conn = self.conn.clone();
        let reply: StreamReadReply = conn
            .xread_options(&[self.stream_key.as_str()], &[">"], &opts)
            .await
            .map_err(|e| Error::QueueError(format!("xreadgroup failed: {e}")))?;

        for stream_key in reply.keys {
            for stream_id in stream_key.ids {
                let payload: String = stream_id
                    .map
                    .get(FIELD_PAYLOAD)
                    .and_then(|v| redis::from_redis_value::<String>(v).ok())
                    .ok_or_else(|| Error::QueueError("missing payload field".into()))?;
                let message: ProcessingMessage = serde_json::from_str(&payload)?;
                return Ok(Some(ClaimedMessage {
                    entry_id: stream_id.id,
                    message,
                }));
            }
        }
        Ok(None)
    }

    /// Acknowledges successful processing, removing the entry from the
    /// consumer group's pending entries list.
    async fn ack(&self, entry_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.xack::<_, _, _, ()>(&self.stream_key, &self.consumer_group, &[entry_id])
            .await
            .map_err(|e| Error::QueueError(format!("xack failed: {e}")))?;
        Ok(())
    }
}

/// Derives a unique consumer name for one worker process.
pub fn consumer_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}
