//! [`AppContext`]: the handle every module's `Start`/`Stop` call receives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::container::Container;

/// Process-wide identity, cancellable lifetime and shared services of a
/// running application.
///
/// `AppContext` is cheap to clone (every field is `Arc`-backed or `Copy`);
/// the [`crate::controller::Controller`] owns the canonical instance and
/// hands clones to each module.
#[derive(Clone)]
pub struct AppContext {
    id: Uuid,
    container: Container,
    config: Arc<dyn Config>,
    cancellation: CancellationToken,
    started_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    stopped_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    running: Arc<AtomicBool>,
}

impl AppContext {
    #[must_use]
    pub fn new(container: Container, config: Arc<dyn Config>) -> Self {
        Self {
            id: Uuid::new_v4(),
            container,
            config,
            cancellation: CancellationToken::new(),
            started_at: Arc::new(RwLock::new(None)),
            stopped_at: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[must_use]
    pub fn config(&self) -> &Arc<dyn Config> {
        &self.config
    }

    /// Cancelled once the application begins its shutdown sequence.
    /// Modules should select on this token in any long-running loop.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.read()
    }

    #[must_use]
    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        *self.stopped_at.read()
    }

    pub(crate) fn mark_started(&self, at: DateTime<Utc>) {
        *self.started_at.write() = Some(at);
        self.running.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_stopped(&self, at: DateTime<Utc>) {
        *self.stopped_at.write() = Some(at);
        self.running.store(false, Ordering::SeqCst);
        self.cancellation.cancel();
    }
}
