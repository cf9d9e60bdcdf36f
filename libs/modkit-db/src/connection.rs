//! Backend-agnostic connection setup.
//!
//! A single DSN string selects the backend by scheme (`postgres://`,
//! `mysql://`, `sqlite:` or `sqlite://`), mirroring how connection pools are
//! usually wired up in this codebase: one DSN, one pool, one
//! [`sea_orm::DatabaseConnection`] handed to callers.

use std::time::Duration;

use sea_orm::{ConnectOptions, DatabaseConnection};
use thiserror::Error;

/// Database backend detected from a DSN's scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbEngine {
    Postgres,
    MySql,
    Sqlite,
}

impl DbEngine {
    fn detect(dsn: &str) -> Result<Self, DbError> {
        if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else if dsn.starts_with("mysql://") {
            Ok(Self::MySql)
        } else if dsn.starts_with("sqlite://") || dsn.starts_with("sqlite:") {
            Ok(Self::Sqlite)
        } else {
            Err(DbError::UnknownDsn(dsn.to_string()))
        }
    }
}

/// Pool sizing and timeout knobs, applied uniformly across backends.
#[derive(Debug, Clone)]
pub struct ConnectOpts {
    pub max_conns: Option<u32>,
    pub min_conns: Option<u32>,
    pub acquire_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(10),
            min_conns: None,
            acquire_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            max_lifetime: None,
        }
    }
}

/// Errors that can occur while establishing or classifying a connection.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("unrecognized database DSN scheme: {0}")]
    UnknownDsn(String),

    #[error("sea-orm connection failed")]
    Connect(#[from] sea_orm::DbErr),

    #[error("backend {0:?} support was not compiled in (missing feature flag)")]
    FeatureDisabled(DbEngine),
}

/// Connect to `dsn`, returning a ready-to-use [`DatabaseConnection`] and the
/// backend that was detected.
///
/// # Errors
///
/// Returns [`DbError::UnknownDsn`] if the scheme is not recognized, or
/// [`DbError::Connect`] if sea-orm fails to establish the pool.
pub async fn connect_db(dsn: &str, opts: &ConnectOpts) -> Result<(DatabaseConnection, DbEngine), DbError> {
    let engine = DbEngine::detect(dsn)?;
    verify_feature_enabled(engine)?;

    let mut connect_opts = ConnectOptions::new(dsn.to_owned());
    if let Some(n) = opts.max_conns {
        connect_opts.max_connections(n);
    }
    if let Some(n) = opts.min_conns {
        connect_opts.min_connections(n);
    }
    if let Some(t) = opts.acquire_timeout {
        connect_opts.connect_timeout(t);
    }
    if let Some(t) = opts.idle_timeout {
        connect_opts.idle_timeout(t);
    }
    if let Some(t) = opts.max_lifetime {
        connect_opts.max_lifetime(t);
    }

    let conn = sea_orm::Database::connect(connect_opts).await?;
    Ok((conn, engine))
}

fn verify_feature_enabled(engine: DbEngine) -> Result<(), DbError> {
    let enabled = match engine {
        DbEngine::Postgres => cfg!(feature = "pg"),
        DbEngine::MySql => cfg!(feature = "mysql"),
        DbEngine::Sqlite => cfg!(feature = "sqlite"),
    };
    if enabled {
        Ok(())
    } else {
        Err(DbError::FeatureDisabled(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_postgres() {
        assert_eq!(DbEngine::detect("postgres://u:p@host/db").unwrap(), DbEngine::Postgres);
        assert_eq!(DbEngine::detect("postgresql://u:p@host/db").unwrap(), DbEngine::Postgres);
    }

    #[test]
    fn detects_mysql() {
        assert_eq!(DbEngine::detect("mysql://u:p@host/db").unwrap(), DbEngine::MySql);
    }

    #[test]
    fn detects_sqlite() {
        assert_eq!(DbEngine::detect("sqlite::memory:").unwrap(), DbEngine::Sqlite);
        assert_eq!(DbEngine::detect("sqlite:///tmp/db.sqlite").unwrap(), DbEngine::Sqlite);
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(matches!(DbEngine::detect("mongodb://host/db"), Err(DbError::UnknownDsn(_))));
    }
}
