//! An ordered collection of [`Module`]s: the order modules are added in is
//! the order `Start` runs in, and [`ModuleRegistry::iter_shutdown_order`]
//! walks it backwards for `Stop`.

use std::sync::Arc;

use crate::contracts::{CliCommand, Module};

/// Holds every module the application controller will drive through its
/// lifecycle, in registration order.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { modules: Vec::new() }
    }

    pub fn add(&mut self, module: Arc<dyn Module>) -> &mut Self {
        self.modules.push(module);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in registration order, the order `Register` and `Start`
    /// run in.
    pub fn iter_startup_order(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter()
    }

    /// Modules in reverse registration order, the order `Stop` runs in.
    pub fn iter_shutdown_order(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter().rev()
    }

    /// Every migration contributed by a module that implements
    /// [`crate::contracts::MigrationsProvider`], in module registration
    /// order (the registry's own `id` ordering is what ultimately governs
    /// apply order within a batch).
    #[must_use]
    pub fn collect_migrations(&self) -> Vec<modkit_db::Migration> {
        self.modules
            .iter()
            .filter_map(|m| m.as_migrations_provider())
            .flat_map(crate::contracts::MigrationsProvider::migrations)
            .collect()
    }

    /// Every CLI command contributed by a module that implements
    /// [`crate::contracts::CliCommands`].
    #[must_use]
    pub fn collect_cli_commands(&self) -> Vec<CliCommand> {
        self.modules
            .iter()
            .filter_map(|m| m.as_cli_commands())
            .flat_map(crate::contracts::CliCommands::commands)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::context::AppContext;
    use async_trait::async_trait;
    use modkit_errors::ErrorValue;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Module for Recording {
        fn name(&self) -> &str {
            self.name
        }
        async fn register(&self, _container: &Container) -> Result<(), ErrorValue> {
            Ok(())
        }
        async fn start(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            Ok(())
        }
        async fn stop(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_order_is_the_reverse_of_startup_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.add(Arc::new(Recording { name: "a", log: Arc::clone(&log) }));
        registry.add(Arc::new(Recording { name: "b", log: Arc::clone(&log) }));

        let ctx = AppContext::new(Container::new(), Arc::new(crate::config::StaticConfig::default()));
        for m in registry.iter_startup_order() {
            m.start(&ctx).await.unwrap();
        }
        for m in registry.iter_shutdown_order() {
            m.stop(&ctx).await.unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec!["start:a", "start:b", "stop:b", "stop:a"]);
    }
}
