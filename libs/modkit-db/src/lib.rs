//! Schema migration engine and connection setup shared by every module.
//!
//! Modules never talk to a schema directly: they describe their schema
//! changes as [`Migration`] values (built with [`Migration::builder`]),
//! register them with a [`MigrationRegistry`] during their `Register` phase,
//! and the [`MigrationEngine`] applies everything the registry has collected
//! against one global `schema_migrations` ledger table the first time the
//! application boots against a given database.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod connection;
mod engine;
mod errors;
mod migration;
mod registry;

pub use connection::{connect_db, ConnectOpts, DbEngine, DbError};
pub use engine::{ApplyResult, MigrationEngine, MigrationStatus, RollbackResult};
pub use migration::{ColumnDef, Migration, MigrationBuilder};
pub use registry::MigrationRegistry;
