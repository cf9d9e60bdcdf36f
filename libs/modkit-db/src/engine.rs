//! The migration engine: a single global ledger table, applied and rolled
//! back one batch at a time inside one transaction per invocation.
//!
//! Unlike a per-migration transaction, [`MigrationEngine::apply`] runs every
//! pending migration's `up` statements and its ledger insert inside one
//! transaction, so a failure partway through leaves the database exactly as
//! it was before the call. [`MigrationEngine::rollback`] does the same for
//! `down` statements, walking batches from the most recent backwards.

use chrono::{DateTime, Utc};
use modkit_errors::ErrorValue;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, FromQueryResult, Statement, TransactionTrait};
use tracing::{debug, info, warn};

use crate::errors::{ERR_MIGRATION_FAILED, ERR_NO_MIGRATIONS_TO_ROLLBACK, ERR_TRANSACTION_FAILED};
use crate::migration::Migration;

const LEDGER_TABLE: &str = "schema_migrations";

/// Outcome of [`MigrationEngine::apply`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub batch: Option<i32>,
}

/// Outcome of [`MigrationEngine::rollback`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollbackResult {
    pub rolled_back: Vec<String>,
    pub batch: Option<i32>,
}

/// One row of [`MigrationEngine::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub id: String,
    pub description: String,
    pub applied: bool,
    pub batch: Option<i32>,
}

#[derive(Debug, FromQueryResult)]
struct LedgerRow {
    id: String,
    batch: i32,
}

#[derive(Debug, FromQueryResult)]
struct MaxBatch {
    max_batch: Option<i32>,
}

/// Stateless driver for the migration ledger. Every method takes the
/// connection and migration set explicitly rather than owning either, so
/// callers stay free to choose where the [`crate::registry::MigrationRegistry`]
/// and the connection pool live.
pub struct MigrationEngine;

impl MigrationEngine {
    /// Create the ledger table and its batch index if they don't exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_TRANSACTION_FAILED`] if the DDL fails.
    pub async fn ensure_ledger(conn: &DatabaseConnection) -> Result<(), ErrorValue> {
        let backend = conn.get_database_backend();
        let create_table = match backend {
            DatabaseBackend::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                    id VARCHAR(255) PRIMARY KEY,
                    description TEXT NOT NULL,
                    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    batch INTEGER NOT NULL
                )"
            ),
            DatabaseBackend::MySql => format!(
                "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                    id VARCHAR(255) PRIMARY KEY,
                    description TEXT NOT NULL,
                    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    batch INTEGER NOT NULL
                )"
            ),
            DatabaseBackend::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                    id VARCHAR(255) PRIMARY KEY,
                    description TEXT NOT NULL,
                    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    batch INTEGER NOT NULL
                )"
            ),
        };
        conn.execute(Statement::from_string(backend, create_table))
            .await
            .map_err(ddl_failed)?;

        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS idx_schema_migrations_batch ON {LEDGER_TABLE} (batch)"
        );
        conn.execute(Statement::from_string(backend, create_index))
            .await
            .map_err(ddl_failed)?;
        Ok(())
    }

    /// Apply every migration in `migrations` that is not already recorded in
    /// the ledger, in ascending id order, inside a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_MIGRATION_FAILED`] wrapping the first migration's
    /// statement that fails, or [`ERR_TRANSACTION_FAILED`] if the
    /// transaction itself cannot be started or committed.
    pub async fn apply(conn: &DatabaseConnection, migrations: &[Migration]) -> Result<ApplyResult, ErrorValue> {
        Self::ensure_ledger(conn).await?;
        let backend = conn.get_database_backend();

        let applied_ids = Self::applied_ids(conn).await?;
        let mut pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| !applied_ids.contains(&m.id))
            .collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));

        let skipped: Vec<String> = migrations
            .iter()
            .filter(|m| applied_ids.contains(&m.id))
            .map(|m| m.id.clone())
            .collect();

        if pending.is_empty() {
            debug!(skipped = skipped.len(), "no pending migrations to apply");
            return Ok(ApplyResult { applied: Vec::new(), skipped, batch: None });
        }

        let next_batch = Self::max_batch(conn).await?.unwrap_or(0) + 1;

        let txn = conn.begin().await.map_err(tx_failed)?;
        let mut applied = Vec::with_capacity(pending.len());
        for migration in &pending {
            for stmt in &migration.up {
                txn.execute(Statement::from_string(backend, stmt.clone()))
                    .await
                    .map_err(|e| migration_failed(&migration.id, &e))?;
            }
            let insert = Statement::from_string(
                backend,
                format!(
                    "INSERT INTO {LEDGER_TABLE} (id, description, batch) VALUES ('{}', '{}', {})",
                    escape(&migration.id),
                    escape(&migration.description),
                    next_batch
                ),
            );
            txn.execute(insert).await.map_err(|e| migration_failed(&migration.id, &e))?;
            applied.push(migration.id.clone());
        }
        txn.commit().await.map_err(tx_failed)?;

        info!(applied = applied.len(), batch = next_batch, "migrations applied");
        Ok(ApplyResult { applied, skipped, batch: Some(next_batch) })
    }

    /// Roll back the most recent `steps` batches, in reverse `(batch, id)`
    /// order, inside a single transaction.
    ///
    /// A ledger row whose id has no matching entry in `migrations` is still
    /// removed from the ledger (its `down` statements cannot be run, so a
    /// warning is logged instead of failing the rollback).
    ///
    /// `steps == 0` rolls back every applied record; a `steps` greater than
    /// the number of applied records is clamped to "everything applied",
    /// matching [`Self::fresh`].
    ///
    /// # Errors
    ///
    /// Returns [`ERR_NO_MIGRATIONS_TO_ROLLBACK`] if nothing is applied, or
    /// [`ERR_MIGRATION_FAILED`] / [`ERR_TRANSACTION_FAILED`] on execution
    /// failure.
    pub async fn rollback(
        conn: &DatabaseConnection,
        migrations: &[Migration],
        steps: u32,
    ) -> Result<RollbackResult, ErrorValue> {
        Self::ensure_ledger(conn).await?;
        let backend = conn.get_database_backend();

        let applied = Self::applied_rows_desc(conn).await?;
        if applied.is_empty() {
            return Err(ERR_NO_MIGRATIONS_TO_ROLLBACK.value().with_detail("connection", "default"));
        }
        let take = if steps == 0 {
            applied.len()
        } else {
            usize::try_from(steps).unwrap_or(usize::MAX).min(applied.len())
        };
        let rows = &applied[..take];
        let lowest_batch = rows.last().map(|r| r.batch);

        let txn = conn.begin().await.map_err(tx_failed)?;
        let mut rolled_back = Vec::with_capacity(rows.len());
        for row in rows {
            match migrations.iter().find(|m| m.id == row.id) {
                Some(migration) => {
                    for stmt in &migration.down {
                        txn.execute(Statement::from_string(backend, stmt.clone()))
                            .await
                            .map_err(|e| migration_failed(&migration.id, &e))?;
                    }
                }
                None => {
                    warn!(id = %row.id, "rolling back ledger row with no matching migration definition; skipping down statements");
                }
            }
            let delete = Statement::from_string(
                backend,
                format!("DELETE FROM {LEDGER_TABLE} WHERE id = '{}'", escape(&row.id)),
            );
            txn.execute(delete).await.map_err(|e| migration_failed(&row.id, &e))?;
            rolled_back.push(row.id.clone());
        }
        txn.commit().await.map_err(tx_failed)?;

        info!(rolled_back = rolled_back.len(), "migrations rolled back");
        Ok(RollbackResult { rolled_back, batch: lowest_batch })
    }

    /// Per-migration applied/pending view, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_TRANSACTION_FAILED`] if the ledger cannot be queried.
    pub async fn status(conn: &DatabaseConnection, migrations: &[Migration]) -> Result<Vec<MigrationStatus>, ErrorValue> {
        Self::ensure_ledger(conn).await?;
        let backend = conn.get_database_backend();
        let rows = LedgerRow::find_by_statement(Statement::from_string(
            backend,
            format!("SELECT id, batch FROM {LEDGER_TABLE}"),
        ))
        .all(conn)
        .await
        .map_err(tx_failed)?;

        let mut sorted = migrations.to_vec();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(sorted
            .into_iter()
            .map(|m| {
                let row = rows.iter().find(|r| r.id == m.id);
                MigrationStatus {
                    id: m.id,
                    description: m.description,
                    applied: row.is_some(),
                    batch: row.map(|r| r.batch),
                }
            })
            .collect())
    }

    /// Roll back everything currently applied, then re-apply every
    /// migration as a single fresh batch.
    ///
    /// # Errors
    ///
    /// Propagates any error from the rollback or apply phases.
    pub async fn fresh(conn: &DatabaseConnection, migrations: &[Migration]) -> Result<ApplyResult, ErrorValue> {
        Self::ensure_ledger(conn).await?;
        let applied_ids = Self::applied_ids(conn).await?;
        if !applied_ids.is_empty() {
            Self::rollback(conn, migrations, 0).await?;
        }
        Self::apply(conn, migrations).await
    }

    async fn applied_ids(conn: &DatabaseConnection) -> Result<std::collections::HashSet<String>, ErrorValue> {
        let backend = conn.get_database_backend();
        let rows = LedgerRow::find_by_statement(Statement::from_string(
            backend,
            format!("SELECT id, batch FROM {LEDGER_TABLE}"),
        ))
        .all(conn)
        .await
        .map_err(tx_failed)?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn max_batch(conn: &DatabaseConnection) -> Result<Option<i32>, ErrorValue> {
        let backend = conn.get_database_backend();
        let row = MaxBatch::find_by_statement(Statement::from_string(
            backend,
            format!("SELECT MAX(batch) as max_batch FROM {LEDGER_TABLE}"),
        ))
        .one(conn)
        .await
        .map_err(tx_failed)?;
        Ok(row.and_then(|r| r.max_batch))
    }

    /// Every applied ledger row, most-recently-applied first.
    async fn applied_rows_desc(conn: &DatabaseConnection) -> Result<Vec<LedgerRow>, ErrorValue> {
        let backend = conn.get_database_backend();
        let rows = LedgerRow::find_by_statement(Statement::from_string(
            backend,
            format!("SELECT id, batch FROM {LEDGER_TABLE} ORDER BY batch DESC, id DESC"),
        ))
        .all(conn)
        .await
        .map_err(tx_failed)?;
        Ok(rows)
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn ddl_failed(err: DbErr) -> ErrorValue {
    ERR_TRANSACTION_FAILED.value().with_detail("reason", "ledger DDL failed").with_cause(err)
}

fn tx_failed(err: DbErr) -> ErrorValue {
    ERR_TRANSACTION_FAILED.value().with_detail("reason", err.to_string()).with_cause(err)
}

fn migration_failed(id: &str, err: &DbErr) -> ErrorValue {
    ERR_MIGRATION_FAILED.value().with_detail("id", id).with_detail("reason", err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{connect_db, ConnectOpts};
    use crate::migration::{ColumnDef, Migration};

    async fn memory_conn() -> DatabaseConnection {
        connect_db("sqlite::memory:", &ConnectOpts::default()).await.unwrap().0
    }

    fn migrations() -> Vec<Migration> {
        vec![
            Migration::builder("0001_users", "create users")
                .create_table("users", vec![ColumnDef::new("id", "INTEGER").not_null()])
                .build(),
            Migration::builder("0002_posts", "create posts")
                .create_table("posts", vec![ColumnDef::new("id", "INTEGER").not_null()])
                .build(),
        ]
    }

    #[tokio::test]
    async fn apply_is_idempotent() {
        let conn = memory_conn().await;
        let migs = migrations();

        let first = MigrationEngine::apply(&conn, &migs).await.unwrap();
        assert_eq!(first.applied, vec!["0001_users", "0002_posts"]);
        assert_eq!(first.batch, Some(1));

        let second = MigrationEngine::apply(&conn, &migs).await.unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.skipped.len(), 2);
    }

    #[tokio::test]
    async fn apply_assigns_increasing_batches() {
        let conn = memory_conn().await;
        let migs = migrations();

        MigrationEngine::apply(&conn, &migs[..1]).await.unwrap();
        let second = MigrationEngine::apply(&conn, &migs).await.unwrap();
        assert_eq!(second.applied, vec!["0002_posts"]);
        assert_eq!(second.batch, Some(2));
    }

    #[tokio::test]
    async fn rollback_reverses_the_latest_batch() {
        let conn = memory_conn().await;
        let migs = migrations();
        MigrationEngine::apply(&conn, &migs[..1]).await.unwrap();
        MigrationEngine::apply(&conn, &migs).await.unwrap();

        let result = MigrationEngine::rollback(&conn, &migs, 1).await.unwrap();
        assert_eq!(result.rolled_back, vec!["0002_posts"]);

        let status = MigrationEngine::status(&conn, &migs).await.unwrap();
        assert!(status.iter().find(|s| s.id == "0001_users").unwrap().applied);
        assert!(!status.iter().find(|s| s.id == "0002_posts").unwrap().applied);
    }

    #[tokio::test]
    async fn rollback_is_record_granular_within_a_single_batch() {
        let conn = memory_conn().await;
        let migs = migrations();
        MigrationEngine::apply(&conn, &migs).await.unwrap();

        let result = MigrationEngine::rollback(&conn, &migs, 1).await.unwrap();
        assert_eq!(result.rolled_back, vec!["0002_posts"]);

        let status = MigrationEngine::status(&conn, &migs).await.unwrap();
        assert!(status.iter().find(|s| s.id == "0001_users").unwrap().applied);
        assert!(!status.iter().find(|s| s.id == "0002_posts").unwrap().applied);
    }

    #[tokio::test]
    async fn rollback_zero_steps_rolls_back_everything() {
        let conn = memory_conn().await;
        let migs = migrations();
        MigrationEngine::apply(&conn, &migs).await.unwrap();

        let result = MigrationEngine::rollback(&conn, &migs, 0).await.unwrap();
        assert_eq!(result.rolled_back, vec!["0002_posts", "0001_users"]);

        let status = MigrationEngine::status(&conn, &migs).await.unwrap();
        assert!(status.iter().all(|s| !s.applied));
    }

    #[tokio::test]
    async fn rollback_with_nothing_applied_errors() {
        let conn = memory_conn().await;
        let migs = migrations();
        let err = MigrationEngine::rollback(&conn, &migs, 1).await.unwrap_err();
        assert!(err.is(&ERR_NO_MIGRATIONS_TO_ROLLBACK));
    }

    #[tokio::test]
    async fn fresh_reapplies_everything() {
        let conn = memory_conn().await;
        let migs = migrations();
        MigrationEngine::apply(&conn, &migs).await.unwrap();

        let result = MigrationEngine::fresh(&conn, &migs).await.unwrap();
        assert_eq!(result.applied, vec!["0001_users", "0002_posts"]);
    }
}
