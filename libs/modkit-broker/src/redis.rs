//! A [`Broker`] backed by Redis Streams consumer groups: `XADD`/`XGROUP
//! CREATE`/`XREADGROUP`/`XACK`, with a background reclaim loop that claims
//! messages idle longer than `processing_timeout` so a crashed consumer's
//! work is redelivered to another one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modkit_errors::ErrorValue;
use redis::aio::ConnectionManager;
use redis::streams::{StreamClaimOptions, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, Message, MessageId};
use crate::error::{ERR_ACK_FAILED, ERR_CONSUME_FAILED, ERR_PRODUCE_FAILED};

const PAYLOAD_FIELD: &str = "payload";

/// Configuration for a [`RedisBroker`].
///
/// `processing_timeout`, `claim_interval` and `block_timeout` accept any
/// [`humantime`](https://docs.rs/humantime)-formatted duration string
/// (`"30s"`, `"5m"`) when loaded through [`modkit::Config`].
#[derive(Debug, Clone, Deserialize)]
pub struct RedisBrokerConfig {
    pub url: String,
    #[serde(with = "modkit_utils::humantime_serde", default = "default_processing_timeout")]
    pub processing_timeout: Duration,
    #[serde(with = "modkit_utils::humantime_serde", default = "default_claim_interval")]
    pub claim_interval: Duration,
    #[serde(with = "modkit_utils::humantime_serde", default = "default_block_timeout")]
    pub block_timeout: Duration,
    #[serde(default = "default_max_stream_len")]
    pub max_stream_len: usize,
}

const fn default_processing_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_claim_interval() -> Duration {
    Duration::from_secs(10)
}

const fn default_block_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_max_stream_len() -> usize {
    100_000
}

/// Redis Streams [`Broker`] implementation.
pub struct RedisBroker {
    manager: ConnectionManager,
    config: RedisBrokerConfig,
}

impl RedisBroker {
    /// # Errors
    ///
    /// Returns [`RedisError`] wrapped as a plain `anyhow`-style cause if
    /// the client cannot be built or the initial connection fails.
    pub async fn connect(config: RedisBrokerConfig) -> Result<Self, RedisError> {
        let client = redis::Client::open(config.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager, config })
    }

    async fn ensure_group(&self, topic: &str, group: &str) -> Result<(), RedisError> {
        let mut conn = self.manager.clone();
        let result: Result<(), RedisError> = conn.xgroup_create_mkstream(topic, group, "$").await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Spawns a background task that periodically claims messages idle
    /// longer than `processing_timeout` for `consumer`.
    ///
    /// `XCLAIM` reassigns ownership of the stale entries to `consumer`,
    /// placing them in *its* pending-entries list; it does not by itself
    /// deliver them to a handler. The entries become deliverable the next
    /// time [`Broker::consume`] is called for this same `(topic, group,
    /// consumer)` triple, because `consume` always drains the calling
    /// consumer's own pending list (`XREADGROUP ... 0`) before asking for
    /// new entries (`XREADGROUP ... >`). Runs until `cancellation` is
    /// cancelled.
    pub fn spawn_reclaim_loop(self: &Arc<Self>, topic: String, group: String, consumer: String, cancellation: CancellationToken) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.config.claim_interval);
            loop {
                tokio::select! {
                    () = cancellation.cancelled() => break,
                    _ = interval.tick() => {
                        match this.reclaim_idle(&topic, &group, &consumer).await {
                            Ok(claimed) if claimed > 0 => {
                                tracing::info!(topic = %topic, group = %group, consumer = %consumer, claimed, "reclaimed idle pending messages");
                            }
                            Ok(_) => {}
                            Err(err) => {
                                tracing::warn!(topic = %topic, group = %group, error = %err, "failed to reclaim idle messages");
                            }
                        }
                    }
                }
            }
        });
    }

    /// Claims every entry idle longer than `processing_timeout` onto
    /// `consumer`'s own pending list. Returns the number of entries
    /// claimed. A claim racing an in-flight `XACK` is benign: the entry
    /// simply disappears from the pending set before `XCLAIM` reaches it.
    async fn reclaim_idle(&self, topic: &str, group: &str, consumer: &str) -> Result<usize, RedisError> {
        let mut conn = self.manager.clone();
        let min_idle_ms = u64::try_from(self.config.processing_timeout.as_millis()).unwrap_or(u64::MAX);

        let pending: redis::streams::StreamPendingCountReply =
            conn.xpending_count(topic, group, "-", "+", 100).await?;
        let stale_ids: Vec<String> = pending
            .ids
            .into_iter()
            .filter(|p| u64::try_from(p.idle).unwrap_or(0) >= min_idle_ms)
            .map(|p| p.id)
            .collect();
        if stale_ids.is_empty() {
            return Ok(0);
        }

        let options = StreamClaimOptions::default();
        let claimed: redis::streams::StreamClaimReply =
            conn.xclaim_options(topic, group, consumer, min_idle_ms, &stale_ids, options).await?;
        Ok(claimed.ids.len())
    }

    fn parse_payload(fields: &std::collections::HashMap<String, redis::Value>) -> Vec<u8> {
        match fields.get(PAYLOAD_FIELD) {
            Some(redis::Value::BulkString(bytes)) => bytes.clone(),
            Some(redis::Value::SimpleString(s)) => s.clone().into_bytes(),
            _ => Vec::new(),
        }
    }

    fn parse_reply(reply: StreamReadReply) -> Vec<Message> {
        let mut messages = Vec::new();
        for stream_key in reply.keys {
            for id_entry in stream_key.ids {
                let payload = Self::parse_payload(&id_entry.map);
                messages.push(Message { id: MessageId(id_entry.id), payload, delivery_count: 1 });
            }
        }
        messages
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn produce(&self, topic: &str, payload: &[u8]) -> Result<MessageId, ErrorValue> {
        let mut conn = self.manager.clone();
        let id: String = conn
            .xadd_maxlen(
                topic,
                redis::streams::StreamMaxlen::Approx(self.config.max_stream_len),
                "*",
                &[(PAYLOAD_FIELD, payload)],
            )
            .await
            .map_err(|e| ERR_PRODUCE_FAILED.value().with_detail("topic", topic).with_cause(e))?;
        Ok(MessageId(id))
    }

    async fn consume(&self, topic: &str, group: &str, consumer: &str, max_messages: usize) -> Result<Vec<Message>, ErrorValue> {
        self.ensure_group(topic, group)
            .await
            .map_err(|e| ERR_CONSUME_FAILED.value().with_detail("topic", topic).with_cause(e))?;

        let mut conn = self.manager.clone();

        // Drain this consumer's own pending-entries list first: entries the
        // reclaim loop claimed onto `consumer` land here, not among "new"
        // (`>`) entries, so skipping this would silently drop redelivery.
        let own_pending_opts = StreamReadOptions::default().group(group, consumer).count(max_messages);
        let own_pending_reply: StreamReadReply = conn
            .xread_options(&[topic], &["0"], &own_pending_opts)
            .await
            .map_err(|e| ERR_CONSUME_FAILED.value().with_detail("topic", topic).with_cause(e))?;
        let mut messages = Self::parse_reply(own_pending_reply);

        if messages.len() < max_messages {
            let remaining = max_messages - messages.len();
            let new_opts = StreamReadOptions::default()
                .group(group, consumer)
                .count(remaining)
                .block(usize::try_from(self.config.block_timeout.as_millis()).unwrap_or(usize::MAX));
            let new_reply: StreamReadReply = conn
                .xread_options(&[topic], &[">"], &new_opts)
                .await
                .map_err(|e| ERR_CONSUME_FAILED.value().with_detail("topic", topic).with_cause(e))?;
            messages.extend(Self::parse_reply(new_reply));
        }

        Ok(messages)
    }

    async fn ack(&self, topic: &str, group: &str, id: &MessageId) -> Result<(), ErrorValue> {
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .xack(topic, group, &[id.0.as_str()])
            .await
            .map_err(|e| ERR_ACK_FAILED.value().with_detail("topic", topic).with_detail("id", id.to_string()).with_cause(e))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ErrorValue> {
        Ok(())
    }
}
