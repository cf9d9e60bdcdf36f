//! Stable error identities for this crate's migration registry and engine.

use modkit_errors::ErrorKind;

pub static ERR_DUPLICATE_MIGRATION_ID: ErrorKind = ErrorKind::new(
    "MIGRATION_001",
    "migration id {{.id}} is already registered for connection {{.connection}}",
);

pub static ERR_MIGRATION_FAILED: ErrorKind =
    ErrorKind::new("MIGRATION_002", "migration {{.id}} failed: {{.reason}}");

pub static ERR_NO_MIGRATIONS_TO_ROLLBACK: ErrorKind = ErrorKind::new(
    "MIGRATION_003",
    "no applied migrations to roll back for connection {{.connection}}",
);

pub static ERR_TRANSACTION_FAILED: ErrorKind =
    ErrorKind::new("MIGRATION_004", "migration transaction failed: {{.reason}}");
