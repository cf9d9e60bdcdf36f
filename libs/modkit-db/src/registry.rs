//! Process-wide registry that collects migrations contributed by every
//! module before the engine applies them, partitioned by the connection
//! name each [`Migration`] targets.
//!
//! Modules call [`MigrationRegistry::register`] during their `Register`
//! phase; ids only need to be unique within the connection partition they
//! target, since each named connection gets its own `schema_migrations`
//! ledger in its own database.

use std::collections::HashMap;

use modkit_errors::ErrorValue;
use parking_lot::RwLock;

use crate::errors::ERR_DUPLICATE_MIGRATION_ID;
use crate::migration::Migration;

/// Collects [`Migration`] definitions contributed by modules, keyed by the
/// connection name each migration targets.
pub struct MigrationRegistry {
    inner: RwLock<HashMap<String, HashMap<String, Migration>>>,
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: RwLock::new(HashMap::new()) }
    }

    /// Register `migrations`, each filed under its own `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_DUPLICATE_MIGRATION_ID`] if any migration `id` is
    /// already registered for the same connection, whether by this call
    /// or an earlier one.
    pub fn register(&self, migrations: Vec<Migration>) -> Result<(), ErrorValue> {
        let mut guard = self.inner.write();
        for migration in &migrations {
            if guard.get(&migration.connection).is_some_and(|m| m.contains_key(&migration.id)) {
                return Err(ERR_DUPLICATE_MIGRATION_ID
                    .value()
                    .with_detail("id", &migration.id)
                    .with_detail("connection", &migration.connection));
            }
        }
        for migration in migrations {
            guard
                .entry(migration.connection.clone())
                .or_default()
                .insert(migration.id.clone(), migration);
        }
        Ok(())
    }

    /// Migrations registered for `connection`, sorted by id.
    #[must_use]
    pub fn for_connection(&self, connection: &str) -> Vec<Migration> {
        let guard = self.inner.read();
        let mut migrations: Vec<Migration> =
            guard.get(connection).map(|m| m.values().cloned().collect()).unwrap_or_default();
        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        migrations
    }

    /// Every connection name that has at least one registered migration,
    /// sorted for deterministic iteration (used when a CLI invocation
    /// targets "all connections").
    #[must_use]
    pub fn connections(&self) -> Vec<String> {
        let guard = self.inner.read();
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        names
    }

    /// All registered migrations across every connection, sorted by id.
    #[must_use]
    pub fn all(&self) -> Vec<Migration> {
        let guard = self.inner.read();
        let mut migrations: Vec<Migration> = guard.values().flat_map(HashMap::values).cloned().collect();
        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        migrations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::Migration;

    fn m(id: &str) -> Migration {
        Migration::builder(id, "test").raw("SELECT 1", "SELECT 1").build()
    }

    fn m_on(id: &str, connection: &str) -> Migration {
        Migration::builder(id, "test").connection(connection).raw("SELECT 1", "SELECT 1").build()
    }

    #[test]
    fn registers_and_sorts_by_id_within_a_connection() {
        let registry = MigrationRegistry::new();
        registry.register(vec![m("0002"), m("0001")]).unwrap();
        let all = registry.for_connection("primary");
        assert_eq!(all.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["0001", "0002"]);
    }

    #[test]
    fn rejects_duplicate_id_on_the_same_connection() {
        let registry = MigrationRegistry::new();
        registry.register(vec![m("0001")]).unwrap();
        let err = registry.register(vec![m("0001")]).unwrap_err();
        assert!(err.is(&ERR_DUPLICATE_MIGRATION_ID));
    }

    #[test]
    fn the_same_id_is_allowed_on_distinct_connections() {
        let registry = MigrationRegistry::new();
        registry.register(vec![m_on("0001", "primary")]).unwrap();
        registry.register(vec![m_on("0001", "analytics")]).unwrap();
        assert_eq!(registry.for_connection("primary").len(), 1);
        assert_eq!(registry.for_connection("analytics").len(), 1);
    }

    #[test]
    fn connections_lists_every_partition_with_at_least_one_migration() {
        let registry = MigrationRegistry::new();
        registry.register(vec![m_on("0001", "primary"), m_on("0002", "analytics")]).unwrap();
        assert_eq!(registry.connections(), vec!["analytics".to_owned(), "primary".to_owned()]);
    }

    #[test]
    fn unregistered_connection_returns_empty() {
        let registry = MigrationRegistry::new();
        assert!(registry.for_connection("nope").is_empty());
    }
}
