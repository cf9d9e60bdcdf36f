//! A module that owns the `items` table: contributes its schema as a
//! migration and, once the engine has applied it, counts rows on a timer
//! to prove the connection the controller handed it is live.

use std::time::Duration;

use async_trait::async_trait;
use modkit::{AppContext, Container, MigrationsProvider, Module};
use modkit_db::{ColumnDef, Migration};
use modkit_errors::ErrorValue;
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

pub const CONNECTION: &str = "primary";

pub struct InventoryModule {
    worker: OnceCell<JoinHandle<()>>,
}

impl InventoryModule {
    #[must_use]
    pub fn new() -> Self {
        Self { worker: OnceCell::new() }
    }
}

impl Default for InventoryModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for InventoryModule {
    fn name(&self) -> &str {
        "inventory"
    }

    async fn register(&self, _container: &Container) -> Result<(), ErrorValue> {
        Ok(())
    }

    async fn start(&self, ctx: &AppContext) -> Result<(), ErrorValue> {
        let conn = ctx.container().resolve_named::<DatabaseConnection>(CONNECTION).await?;
        let cancellation = ctx.cancellation_token();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancellation.cancelled() => break,
                    () = tokio::time::sleep(Duration::from_secs(30)) => {},
                }
                match count_items(&conn).await {
                    Ok(count) => tracing::info!(count, "inventory item count"),
                    Err(err) => tracing::warn!(error = %err, "failed to count items"),
                }
            }
        });
        self.worker
            .set(handle)
            .map_err(|_| modkit::ERR_MODULE_START_FAILED.value().with_detail("module", self.name()))
    }

    async fn stop(&self, _ctx: &AppContext) -> Result<(), ErrorValue> {
        if let Some(handle) = self.worker.get() {
            handle.abort();
        }
        Ok(())
    }

    fn as_migrations_provider(&self) -> Option<&dyn MigrationsProvider> {
        Some(self)
    }
}

impl MigrationsProvider for InventoryModule {
    fn migrations(&self) -> Vec<Migration> {
        vec![Migration::builder("0001_create_items", "create the items table")
            .connection(CONNECTION)
            .create_table(
                "items",
                vec![
                    ColumnDef::new("id", "INTEGER").not_null(),
                    ColumnDef::new("name", "TEXT").not_null(),
                    ColumnDef::new("quantity", "INTEGER").not_null().default_value("0"),
                ],
            )
            .build()]
    }
}

async fn count_items(conn: &DatabaseConnection) -> Result<i64, sea_orm::DbErr> {
    #[derive(FromQueryResult)]
    struct Count {
        count: i64,
    }
    let backend = conn.get_database_backend();
    let row = Count::find_by_statement(Statement::from_string(backend, "SELECT COUNT(*) AS count FROM items".to_owned()))
        .one(conn)
        .await?;
    Ok(row.map_or(0, |r| r.count))
}
