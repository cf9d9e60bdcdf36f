//! The application controller: drives every registered [`Module`] through
//! `Register` → `Start` → (wait) → `Stop`, in the order documented on
//! [`crate::registry::ModuleRegistry`].
//!
//! A failure during `Start` rewinds every module that already started, in
//! reverse order, before the controller returns the original error. A slow
//! `Stop` sequence is raced against a configurable timeout so a wedged
//! module can never hang the process shutdown indefinitely.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use modkit_errors::ErrorValue;

use crate::context::AppContext;
use crate::contracts::Module;
use crate::errors::{
    ERR_APPLICATION_ALREADY_RUNNING, ERR_MODULE_REGISTER_FAILED, ERR_MODULE_START_FAILED, ERR_MODULE_STOP_FAILED,
    ERR_SHUTDOWN_TIMED_OUT,
};
use crate::registry::ModuleRegistry;
use crate::shutdown;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns a [`ModuleRegistry`] and an [`AppContext`] and runs the modules'
/// lifecycle to completion.
pub struct Controller {
    registry: ModuleRegistry,
    ctx: AppContext,
    shutdown_timeout: Duration,
}

impl Controller {
    #[must_use]
    pub fn new(registry: ModuleRegistry, ctx: AppContext) -> Self {
        Self { registry, ctx, shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT }
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Registers, starts, waits for a shutdown signal (or for the
    /// context's cancellation token to be cancelled directly, e.g. by a
    /// test or an embedding caller), then stops every module in reverse
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_APPLICATION_ALREADY_RUNNING`] if called on a context
    /// that is already running, [`ERR_MODULE_REGISTER_FAILED`] or
    /// [`ERR_MODULE_START_FAILED`] if a module fails its respective phase,
    /// or [`ERR_SHUTDOWN_TIMED_OUT`] if stopping every module takes longer
    /// than the configured shutdown timeout.
    pub async fn run(&self) -> Result<(), ErrorValue> {
        self.register_all().await?;
        self.start_all().await?;
        self.ctx.mark_started(Utc::now());

        let token = self.ctx.cancellation_token();
        let watcher_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown::wait_for_shutdown_signal() => watcher_token.cancel(),
                () = watcher_token.cancelled() => {},
            }
        });

        token.cancelled().await;
        self.stop_all_with_timeout().await
    }

    async fn register_all(&self) -> Result<(), ErrorValue> {
        if self.ctx.is_running() {
            return Err(ERR_APPLICATION_ALREADY_RUNNING.value());
        }
        for module in self.registry.iter_startup_order() {
            module.register(self.ctx.container()).await.map_err(|cause| {
                ERR_MODULE_REGISTER_FAILED
                    .value()
                    .with_detail("module", module.name())
                    .with_detail("reason", cause.to_string())
                    .with_cause(cause)
            })?;
        }
        Ok(())
    }

    async fn start_all(&self) -> Result<(), ErrorValue> {
        let mut started: Vec<&Arc<dyn Module>> = Vec::new();
        for module in self.registry.iter_startup_order() {
            if let Err(cause) = module.start(&self.ctx).await {
                tracing::error!(module = module.name(), error = %cause, "module failed to start, rewinding");
                for started_module in started.into_iter().rev() {
                    if let Err(stop_err) = started_module.stop(&self.ctx).await {
                        tracing::warn!(module = started_module.name(), error = %stop_err, "error stopping module during start rewind");
                    }
                }
                return Err(ERR_MODULE_START_FAILED
                    .value()
                    .with_detail("module", module.name())
                    .with_detail("reason", cause.to_string())
                    .with_cause(cause));
            }
            started.push(module);
        }
        Ok(())
    }

    /// Stops every module in reverse order, collecting (never swallowing)
    /// each failure. Every module is still offered its `Stop` call
    /// regardless of an earlier one's failure.
    async fn stop_all(&self) -> Result<(), ErrorValue> {
        let mut failures: Vec<(String, ErrorValue)> = Vec::new();
        for module in self.registry.iter_shutdown_order() {
            if let Err(cause) = module.stop(&self.ctx).await {
                tracing::warn!(module = module.name(), error = %cause, "module failed to stop, continuing shutdown");
                failures.push((module.name().to_owned(), cause));
            }
        }
        join_stop_failures(failures)
    }

    async fn stop_all_with_timeout(&self) -> Result<(), ErrorValue> {
        let outcome = tokio::time::timeout(self.shutdown_timeout, self.stop_all()).await;
        self.ctx.mark_stopped(Utc::now());
        match outcome {
            Ok(result) => result,
            Err(_) => Err(ERR_SHUTDOWN_TIMED_OUT
                .value()
                .with_detail("timeout", humantime::format_duration(self.shutdown_timeout).to_string())),
        }
    }
}

/// Folds every collected `Stop` failure into a single [`ERR_MODULE_STOP_FAILED`]
/// value: the first failure becomes the cause, every failing module name is
/// listed in the `modules` detail so none of them are silently dropped.
fn join_stop_failures(mut failures: Vec<(String, ErrorValue)>) -> Result<(), ErrorValue> {
    if failures.is_empty() {
        return Ok(());
    }
    let names = failures.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(", ");
    let count = failures.len();
    let (first_module, first_cause) = failures.remove(0);
    Err(ERR_MODULE_STOP_FAILED
        .value()
        .with_detail("module", first_module)
        .with_detail("modules", names)
        .with_detail("count", count)
        .with_cause(first_cause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::container::Container;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    }

    #[async_trait]
    impl Module for Recording {
        fn name(&self) -> &str {
            self.name
        }
        async fn register(&self, _container: &Container) -> Result<(), ErrorValue> {
            self.log.lock().unwrap().push(format!("register:{}", self.name));
            Ok(())
        }
        async fn start(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            if self.fail_start {
                return Err(crate::errors::ERR_MODULE_START_FAILED.value().with_detail("module", self.name));
            }
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            Ok(())
        }
        async fn stop(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
            Ok(())
        }
    }

    fn ctx() -> AppContext {
        AppContext::new(Container::new(), Arc::new(StaticConfig::default()))
    }

    #[tokio::test]
    async fn happy_path_registers_starts_then_stops_in_reverse_on_cancellation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.add(Arc::new(Recording { name: "a", log: Arc::clone(&log), fail_start: false }));
        registry.add(Arc::new(Recording { name: "b", log: Arc::clone(&log), fail_start: false }));

        let ctx = ctx();
        let controller = Controller::new(registry, ctx.clone());
        let token = ctx.cancellation_token();

        let run = tokio::spawn(async move { controller.run().await });
        token.cancel();
        run.await.unwrap().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["register:a", "register:b", "start:a", "start:b", "stop:b", "stop:a"]
        );
    }

    #[tokio::test]
    async fn start_failure_rewinds_already_started_modules() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.add(Arc::new(Recording { name: "a", log: Arc::clone(&log), fail_start: false }));
        registry.add(Arc::new(Recording { name: "b", log: Arc::clone(&log), fail_start: true }));

        let controller = Controller::new(registry, ctx());
        let err = controller.run().await.unwrap_err();

        assert!(err.is(&ERR_MODULE_START_FAILED));
        assert_eq!(*log.lock().unwrap(), vec!["register:a", "register:b", "start:a", "stop:a"]);
    }

    #[tokio::test]
    async fn application_already_running_is_rejected() {
        let ctx = ctx();
        ctx.mark_started(Utc::now());
        let controller = Controller::new(ModuleRegistry::new(), ctx);
        let err = controller.run().await.unwrap_err();
        assert!(err.is(&ERR_APPLICATION_ALREADY_RUNNING));
    }

    struct FailsToStop {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Module for FailsToStop {
        fn name(&self) -> &str {
            self.name
        }
        async fn register(&self, _container: &Container) -> Result<(), ErrorValue> {
            Ok(())
        }
        async fn start(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            Ok(())
        }
        async fn stop(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
            Err(ERR_MODULE_STOP_FAILED.value().with_detail("module", self.name))
        }
    }

    #[tokio::test]
    async fn stop_failures_are_joined_and_every_module_still_gets_stopped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.add(Arc::new(FailsToStop { name: "a", log: Arc::clone(&log) }));
        registry.add(Arc::new(FailsToStop { name: "b", log: Arc::clone(&log) }));

        let ctx = ctx();
        let controller = Controller::new(registry, ctx.clone());
        let token = ctx.cancellation_token();

        let run = tokio::spawn(async move { controller.run().await });
        token.cancel();
        let err = run.await.unwrap().unwrap_err();

        assert!(err.is(&ERR_MODULE_STOP_FAILED));
        assert_eq!(*log.lock().unwrap(), vec!["stop:b", "stop:a"]);
    }

    struct Wedged {
        stopped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Module for Wedged {
        fn name(&self) -> &str {
            "wedged"
        }
        async fn register(&self, _container: &Container) -> Result<(), ErrorValue> {
            Ok(())
        }
        async fn start(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            Ok(())
        }
        async fn stop(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_exceeding_timeout_is_reported() {
        let stopped = Arc::new(AtomicBool::new(false));
        let mut registry = ModuleRegistry::new();
        registry.add(Arc::new(Wedged { stopped: Arc::clone(&stopped) }));

        let ctx = ctx();
        let controller =
            Controller::new(registry, ctx.clone()).with_shutdown_timeout(Duration::from_millis(50));
        let token = ctx.cancellation_token();

        let run = tokio::spawn(async move { controller.run().await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        token.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(err.is(&ERR_SHUTDOWN_TIMED_OUT));
        assert!(!stopped.load(Ordering::SeqCst));
    }
}
