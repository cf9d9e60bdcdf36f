//! Turns the pull-based [`Broker::consume`]/[`Broker::ack`] pair into the
//! push/handler contract callers actually want: register a handler once,
//! get a background reader loop that dispatches every delivered message to
//! it and acks on success.
//!
//! This is built once, generically, on top of [`Broker`] rather than inside
//! each backend: both `MemoryBroker` and `RedisBroker` get the same
//! at-least-once, ack-driven dispatch loop for free.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, Message};

/// How many messages a single `consume` call asks for.
const BATCH_SIZE: usize = 10;

/// Backoff applied after a `consume` call returns no messages, so an
/// unblocking backend (e.g. the in-memory one) doesn't spin a hot loop
/// waiting for a producer.
const IDLE_BACKOFF: Duration = Duration::from_millis(50);

/// Spawns a reader loop that repeatedly calls `broker.consume(topic, group,
/// consumer, ..)`, invokes `handler` for each delivered [`Message`], and
/// acks it on success. A message `handler` returns `Err` for is left
/// pending: the backend's own idle-reclaim policy (see
/// [`crate::RedisBroker::spawn_reclaim_loop`] for the Redis backend) is
/// responsible for redelivering it to another consumer in the group.
///
/// The loop exits once `cancellation` is cancelled or `consume` itself
/// returns an error (logged, not retried — a wedged connection should
/// surface through `Broker::close`/reconnection at the caller's level, not
/// an unbounded retry here).
pub fn subscribe<F, Fut>(
    broker: Arc<dyn Broker>,
    topic: impl Into<String>,
    group: impl Into<String>,
    consumer: impl Into<String>,
    cancellation: CancellationToken,
    handler: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), modkit_errors::ErrorValue>> + Send + 'static,
{
    let topic = topic.into();
    let group = group.into();
    let consumer = consumer.into();
    tokio::spawn(async move {
        loop {
            let batch = tokio::select! {
                () = cancellation.cancelled() => break,
                result = broker.consume(&topic, &group, &consumer, BATCH_SIZE) => result,
            };

            let messages = match batch {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::warn!(topic = %topic, group = %group, error = %err, "consume failed, retrying after backoff");
                    tokio::time::sleep(IDLE_BACKOFF).await;
                    continue;
                }
            };

            if messages.is_empty() {
                tokio::select! {
                    () = cancellation.cancelled() => break,
                    () = tokio::time::sleep(IDLE_BACKOFF) => {},
                }
                continue;
            }

            for message in messages {
                let id = message.id.clone();
                match handler(message).await {
                    Ok(()) => {
                        if let Err(err) = broker.ack(&topic, &group, &id).await {
                            tracing::warn!(topic = %topic, group = %group, id = %id, error = %err, "failed to ack message");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(topic = %topic, group = %group, id = %id, error = %err, "handler failed, leaving message pending for reclaim");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBroker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[tokio::test]
    async fn delivers_every_message_to_the_handler_and_acks_on_success() {
        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = Arc::clone(&received);
        let cancellation = CancellationToken::new();

        let handle = subscribe(Arc::clone(&broker), "orders", "workers", "w1", cancellation.clone(), move |message| {
            let received = Arc::clone(&received2);
            async move {
                received.lock().unwrap().push(message.payload);
                Ok(())
            }
        });

        broker.produce("orders", b"hello").await.unwrap();
        // Give the spawned loop a few ticks to pick the message up.
        for _ in 0..50 {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        cancellation.cancel();
        handle.await.unwrap();

        assert_eq!(*received.lock().unwrap(), vec![b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn failed_handler_leaves_the_message_pending() {
        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::default());
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = Arc::clone(&attempts);
        let cancellation = CancellationToken::new();

        let handle = subscribe(Arc::clone(&broker), "orders", "workers", "w1", cancellation.clone(), move |_message| {
            let attempts = Arc::clone(&attempts2);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(crate::error::ERR_CONSUME_FAILED.value())
            }
        });

        broker.produce("orders", b"hello").await.unwrap();
        for _ in 0..50 {
            if attempts.load(Ordering::SeqCst) >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancellation.cancel();
        handle.await.unwrap();

        assert!(attempts.load(Ordering::SeqCst) >= 1);
    }
}
