//! The [`Module`] contract every unit of functionality implements, plus the
//! optional capability traits a module can additionally expose.

use async_trait::async_trait;
use modkit_errors::ErrorValue;

use crate::container::Container;
use crate::context::AppContext;

/// A unit of functionality the [`crate::controller::Controller`] manages
/// through its lifecycle: `Register` (wire dependencies into the
/// container), `Start` (begin doing work), `Stop` (release resources).
///
/// Implementors that also need to contribute schema migrations or CLI
/// commands expose them through [`Module::as_migrations_provider`] /
/// [`Module::as_cli_commands`] rather than through separate registration
/// calls, so the controller can discover every capability from the single
/// list of registered modules.
#[async_trait]
pub trait Module: Send + Sync {
    /// A short, stable, human-readable name used in logs and error details.
    fn name(&self) -> &str;

    /// Wire this module's services into `container`. Called for every
    /// module, in registration order, before any module's `start` runs.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorValue`] (conventionally tagged with
    /// `LIFECYCLE_001`) describing why registration could not complete.
    async fn register(&self, container: &Container) -> Result<(), ErrorValue>;

    /// Begin doing work. Called for every module, in registration order,
    /// after every module has registered.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorValue`] describing why the module failed to
    /// start; the controller rewinds already-started modules in reverse
    /// order before propagating it.
    async fn start(&self, ctx: &AppContext) -> Result<(), ErrorValue>;

    /// Release resources and stop doing work. Called in reverse
    /// registration order during shutdown.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorValue`] describing why the module failed to stop
    /// cleanly; the controller still proceeds to stop the remaining
    /// modules.
    async fn stop(&self, ctx: &AppContext) -> Result<(), ErrorValue>;

    /// Schema migrations this module contributes, if any.
    fn as_migrations_provider(&self) -> Option<&dyn MigrationsProvider> {
        None
    }

    /// CLI subcommands this module contributes, if any.
    fn as_cli_commands(&self) -> Option<&dyn CliCommands> {
        None
    }
}

/// Optional [`Module`] capability: contributes migrations to the global
/// ledger the [`modkit_db::MigrationEngine`] applies at boot.
pub trait MigrationsProvider: Send + Sync {
    fn migrations(&self) -> Vec<modkit_db::Migration>;
}

/// A single CLI subcommand descriptor. Parsing and dispatch live outside
/// this crate; modules only describe what they offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCommand {
    pub name: String,
    pub description: String,
}

/// Optional [`Module`] capability: contributes CLI subcommands.
pub trait CliCommands: Send + Sync {
    fn commands(&self) -> Vec<CliCommand>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Module for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        async fn register(&self, _container: &Container) -> Result<(), ErrorValue> {
            Ok(())
        }
        async fn start(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            Ok(())
        }
        async fn stop(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
            Ok(())
        }
    }

    #[test]
    fn default_capability_accessors_return_none() {
        let m = Noop;
        assert!(m.as_migrations_provider().is_none());
        assert!(m.as_cli_commands().is_none());
    }
}
