//! A module that reacts to inventory events over the message broker: it
//! subscribes to the `item-events` topic and logs every delivery, ack'ing
//! on success and leaving failed deliveries pending for reclaim.

use async_trait::async_trait;
use modkit::{AppContext, Container, Module};
use modkit_broker::{build_broker, subscribe};
use modkit_errors::ErrorValue;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TOPIC: &str = "item-events";
const GROUP: &str = "notifications";

pub struct NotificationsModule {
    cancellation: CancellationToken,
    worker: OnceCell<JoinHandle<()>>,
}

impl NotificationsModule {
    #[must_use]
    pub fn new() -> Self {
        Self { cancellation: CancellationToken::new(), worker: OnceCell::new() }
    }
}

impl Default for NotificationsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for NotificationsModule {
    fn name(&self) -> &str {
        "notifications"
    }

    async fn register(&self, _container: &Container) -> Result<(), ErrorValue> {
        Ok(())
    }

    async fn start(&self, ctx: &AppContext) -> Result<(), ErrorValue> {
        let broker = build_broker(ctx.config().as_ref(), "broker").await?;
        let handle = subscribe(
            broker,
            TOPIC,
            GROUP,
            format!("notifications-{}", ctx.id()),
            self.cancellation.clone(),
            |message| async move {
                tracing::info!(
                    id = %message.id,
                    deliveries = message.delivery_count,
                    payload = %String::from_utf8_lossy(&message.payload),
                    "item event delivered"
                );
                Ok(())
            },
        );
        self.worker
            .set(handle)
            .map_err(|_| modkit::ERR_MODULE_START_FAILED.value().with_detail("module", self.name()))
    }

    async fn stop(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
        self.cancellation.cancel();
        if let Some(handle) = self.worker.get() {
            let _ = handle.await;
        }
        Ok(())
    }
}
