//! Composition root that exercises the library crates end-to-end: a
//! migration-contributing `inventory` module and a broker-worker
//! `notifications` module, wired through a [`Container`] and driven by a
//! [`Controller`] until `Ctrl+C`/`SIGTERM`.
//!
//! Before the controller runs any module, this binary collects every
//! module's contributed migrations, partitions them by connection with a
//! [`MigrationRegistry`], and applies each connection's batch against its
//! own database before handing the live connection to the container under
//! that connection's name.

mod inventory;
mod notifications;

use std::sync::Arc;

use anyhow::Context;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use modkit::{AppContext, Config, Container, Controller, JsonConfig, ModuleRegistry};
use modkit_db::{connect_db, ConnectOpts, MigrationEngine, MigrationRegistry};
use sea_orm::DatabaseConnection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let figment = Figment::new()
        .merge(Yaml::file(concat!(env!("CARGO_MANIFEST_DIR"), "/config.yaml")))
        .merge(Env::prefixed("DEMO_SERVER__").split("__"));
    let config: Arc<dyn Config> =
        Arc::new(JsonConfig::from_figment(&figment).context("loading demo-server configuration")?);

    let mut registry = ModuleRegistry::new();
    registry.add(Arc::new(inventory::InventoryModule::new()));
    registry.add(Arc::new(notifications::NotificationsModule::new()));

    let container = Container::new();
    apply_migrations(&registry, &container, config.as_ref()).await?;

    let ctx = AppContext::new(container, config);
    let controller = Controller::new(registry, ctx);
    controller.run().await.map_err(|err| anyhow::anyhow!("{err}"))?;

    tracing::info!("demo-server stopped");
    Ok(())
}

/// Collects the migrations every registered module contributes, applies
/// each connection's batch, then hands the resulting connection to
/// `container` under that connection's name so modules can resolve it
/// with [`modkit::Container::resolve_named`].
async fn apply_migrations(
    registry: &ModuleRegistry,
    container: &Container,
    config: &dyn Config,
) -> anyhow::Result<()> {
    let migration_registry = MigrationRegistry::new();
    migration_registry
        .register(registry.collect_migrations())
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    for connection_name in migration_registry.connections() {
        let dsn = config
            .get_string(&format!("connections.{connection_name}.dsn"))
            .unwrap_or_else(|| "sqlite::memory:".to_owned());
        let (conn, engine) = connect_db(&dsn, &ConnectOpts::default())
            .await
            .with_context(|| format!("connecting to '{connection_name}' ({dsn})"))?;
        tracing::info!(connection = %connection_name, ?engine, "connected");

        MigrationEngine::ensure_ledger(&conn).await.map_err(|err| anyhow::anyhow!("{err}"))?;
        let pending = migration_registry.for_connection(&connection_name);
        let result = MigrationEngine::apply(&conn, &pending).await.map_err(|err| anyhow::anyhow!("{err}"))?;
        tracing::info!(connection = %connection_name, applied = ?result.applied, skipped = ?result.skipped, "migrations applied");

        container
            .instance_named::<DatabaseConnection>(connection_name, conn)
            .map_err(|err| anyhow::anyhow!("{err}"))?;
    }
    Ok(())
}
