//! An in-process [`Broker`] backed by bounded per-topic buffers, useful for
//! tests and single-process deployments. A consumer group only sees
//! messages produced after the group was first created, mirroring the
//! Redis Streams backend's `$` default start id.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use modkit_errors::ErrorValue;
use parking_lot::Mutex;

use crate::broker::{Broker, Message, MessageId};

/// Messages dropped once a topic's backlog exceeds this are lost to
/// consumer groups that haven't read them yet; groups that are keeping
/// up never notice.
const DEFAULT_TOPIC_CAPACITY: usize = 10_000;

struct Entry {
    id: u64,
    payload: Vec<u8>,
}

struct Group {
    /// Index into the topic log of the next message this group hasn't
    /// delivered yet.
    cursor: usize,
    /// Messages delivered but not yet acked, keyed by message id.
    pending: HashMap<u64, Entry>,
}

struct Topic {
    log: VecDeque<Entry>,
    /// How many entries have been evicted from the front of `log` since
    /// the topic was created; group cursors are offsets from this base.
    evicted: usize,
    groups: HashMap<String, Group>,
}

impl Topic {
    fn new() -> Self {
        Self { log: VecDeque::new(), evicted: 0, groups: HashMap::new() }
    }

    fn group_or_create(&mut self, name: &str) -> &mut Group {
        let cursor = self.log.len() + self.evicted;
        self.groups.entry(name.to_owned()).or_insert_with(|| Group { cursor, pending: HashMap::new() })
    }
}

/// In-memory [`Broker`] implementation.
pub struct MemoryBroker {
    topics: Mutex<HashMap<String, Topic>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl MemoryBroker {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { topics: Mutex::new(HashMap::new()), next_id: AtomicU64::new(0), capacity }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn produce(&self, topic: &str, payload: &[u8]) -> Result<MessageId, ErrorValue> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut topics = self.topics.lock();
        let t = topics.entry(topic.to_owned()).or_insert_with(Topic::new);
        t.log.push_back(Entry { id, payload: payload.to_vec() });
        while t.log.len() > self.capacity {
            t.log.pop_front();
            t.evicted += 1;
        }
        Ok(MessageId(id.to_string()))
    }

    async fn consume(&self, topic: &str, group: &str, _consumer: &str, max_messages: usize) -> Result<Vec<Message>, ErrorValue> {
        let mut topics = self.topics.lock();
        let t = topics.entry(topic.to_owned()).or_insert_with(Topic::new);
        let log_len = t.log.len();
        let evicted = t.evicted;
        let cursor = t.group_or_create(group).cursor;

        let start = cursor.saturating_sub(evicted);
        let end = log_len.min(start + max_messages);
        let mut delivered = Vec::new();
        for offset in start..end {
            let entry = &t.log[offset];
            delivered.push(Message { id: MessageId(entry.id.to_string()), payload: entry.payload.clone(), delivery_count: 1 });
        }

        let g = t.group_or_create(group);
        g.cursor += delivered.len();
        for m in &delivered {
            if let Ok(id) = m.id.0.parse::<u64>() {
                g.pending.insert(id, Entry { id, payload: m.payload.clone() });
            }
        }
        Ok(delivered)
    }

    async fn ack(&self, topic: &str, group: &str, id: &MessageId) -> Result<(), ErrorValue> {
        if let Ok(numeric_id) = id.0.parse::<u64>() {
            let mut topics = self.topics.lock();
            if let Some(t) = topics.get_mut(topic) {
                if let Some(g) = t.groups.get_mut(group) {
                    g.pending.remove(&numeric_id);
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ErrorValue> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consumer_group_only_sees_messages_produced_after_it_is_created() {
        let broker = MemoryBroker::default();
        broker.produce("orders", b"before").await.unwrap();

        let delivered = broker.consume("orders", "workers", "w1", 10).await.unwrap();
        assert!(delivered.is_empty());

        broker.produce("orders", b"after").await.unwrap();
        let delivered = broker.consume("orders", "workers", "w1", 10).await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].payload, b"after");
    }

    #[tokio::test]
    async fn two_groups_each_receive_their_own_copy() {
        let broker = Arc::new(MemoryBroker::default());
        broker.consume("orders", "group-a", "a1", 10).await.unwrap();
        broker.consume("orders", "group-b", "b1", 10).await.unwrap();
        broker.produce("orders", b"hello").await.unwrap();

        let a = broker.consume("orders", "group-a", "a1", 10).await.unwrap();
        let b = broker.consume("orders", "group-b", "b1", 10).await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[tokio::test]
    async fn messages_stay_pending_until_acked() {
        let broker = MemoryBroker::default();
        broker.consume("orders", "workers", "w1", 10).await.unwrap();
        broker.produce("orders", b"hello").await.unwrap();

        let delivered = broker.consume("orders", "workers", "w1", 10).await.unwrap();
        assert_eq!(delivered.len(), 1);

        {
            let topics = broker.topics.lock();
            let group = &topics.get("orders").unwrap().groups["workers"];
            assert_eq!(group.pending.len(), 1);
        }

        broker.ack("orders", "workers", &delivered[0].id).await.unwrap();
        let topics = broker.topics.lock();
        let group = &topics.get("orders").unwrap().groups["workers"];
        assert!(group.pending.is_empty());
    }

    #[tokio::test]
    async fn bounded_backlog_evicts_the_oldest_unread_messages() {
        let broker = MemoryBroker::new(2);
        broker.consume("orders", "workers", "w1", 10).await.unwrap();
        for i in 0..5 {
            broker.produce("orders", format!("msg-{i}").as_bytes()).await.unwrap();
        }
        let delivered = broker.consume("orders", "workers", "w1", 10).await.unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].payload, b"msg-3");
        assert_eq!(delivered[1].payload, b"msg-4");
    }
}
