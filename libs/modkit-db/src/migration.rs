//! Migration definitions and the builder used to author them.
//!
//! A [`Migration`] is an immutable pair of SQL statement lists: `up`,
//! executed in the order they were added, and `down`, executed in the
//! reverse order so that undoing a migration always walks its own `up`
//! backwards. [`MigrationBuilder`] is the ergonomic way to construct one:
//! each high-level operation appends its forward statement to `up` and
//! prepends the corresponding inverse statement to `down`.

/// A single column definition used by `create_table` and `add_column`.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

impl ColumnDef {
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    fn render(&self) -> String {
        let mut out = format!("{} {}", self.name, self.sql_type);
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            out.push_str(&format!(" DEFAULT {default}"));
        }
        out
    }
}

/// The default connection name a [`Migration`] targets when the builder
/// isn't told otherwise.
pub const DEFAULT_CONNECTION: &str = "primary";

/// A named, ordered pair of forward/reverse SQL statements.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: String,
    pub description: String,
    pub connection: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl Migration {
    /// Start building a migration identified by `id`, targeting the
    /// [`DEFAULT_CONNECTION`] unless overridden with
    /// [`MigrationBuilder::connection`].
    ///
    /// `id` is the primary key stored in the migration ledger; callers
    /// typically encode an ordering prefix into it (e.g. a timestamp or
    /// zero-padded sequence number) so that lexical and application order
    /// coincide.
    #[must_use]
    pub fn builder(id: impl Into<String>, description: impl Into<String>) -> MigrationBuilder {
        MigrationBuilder {
            id: id.into(),
            description: description.into(),
            connection: DEFAULT_CONNECTION.to_owned(),
            up: Vec::new(),
            down: Vec::new(),
        }
    }
}

/// Accumulates `up`/`down` statements for a [`Migration`].
pub struct MigrationBuilder {
    id: String,
    description: String,
    connection: String,
    up: Vec<String>,
    down: Vec<String>,
}

impl MigrationBuilder {
    /// Target a named connection other than [`DEFAULT_CONNECTION`]. The
    /// migration registry partitions by this name; the engine still runs
    /// each connection's migrations against its own
    /// [`sea_orm::DatabaseConnection`] and ledger.
    #[must_use]
    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection = name.into();
        self
    }

    fn push(&mut self, up: String, down: String) -> &mut Self {
        self.up.push(up);
        self.down.insert(0, down);
        self
    }

    #[must_use]
    pub fn create_table(mut self, name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        let name = name.into();
        let cols = columns.iter().map(ColumnDef::render).collect::<Vec<_>>().join(", ");
        let up = format!("CREATE TABLE {name} ({cols})");
        let down = format!("DROP TABLE {name}");
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn drop_table(mut self, name: impl Into<String>, recreate_columns: Vec<ColumnDef>) -> Self {
        let name = name.into();
        let cols = recreate_columns.iter().map(ColumnDef::render).collect::<Vec<_>>().join(", ");
        let up = format!("DROP TABLE {name}");
        let down = format!("CREATE TABLE {name} ({cols})");
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn add_column(mut self, table: impl Into<String>, column: ColumnDef) -> Self {
        let table = table.into();
        let up = format!("ALTER TABLE {table} ADD COLUMN {}", column.render());
        let down = format!("ALTER TABLE {table} DROP COLUMN {}", column.name);
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn drop_column(mut self, table: impl Into<String>, column: ColumnDef) -> Self {
        let table = table.into();
        let up = format!("ALTER TABLE {table} DROP COLUMN {}", column.name);
        let down = format!("ALTER TABLE {table} ADD COLUMN {}", column.render());
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn rename_column(
        mut self,
        table: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        let table = table.into();
        let (from, to) = (from.into(), to.into());
        let up = format!("ALTER TABLE {table} RENAME COLUMN {from} TO {to}");
        let down = format!("ALTER TABLE {table} RENAME COLUMN {to} TO {from}");
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn change_column(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        new_type: impl Into<String>,
        old_type: impl Into<String>,
    ) -> Self {
        let table = table.into();
        let column = column.into();
        let up = format!("ALTER TABLE {table} ALTER COLUMN {column} TYPE {}", new_type.into());
        let down = format!("ALTER TABLE {table} ALTER COLUMN {column} TYPE {}", old_type.into());
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn create_index(
        mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        columns: &[&str],
        unique: bool,
    ) -> Self {
        let name = name.into();
        let table = table.into();
        let cols = columns.join(", ");
        let unique_kw = if unique { "UNIQUE " } else { "" };
        let up = format!("CREATE {unique_kw}INDEX {name} ON {table} ({cols})");
        let down = format!("DROP INDEX {name}");
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn drop_index(
        mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        columns: &[&str],
        unique: bool,
    ) -> Self {
        let name = name.into();
        let table = table.into();
        let cols = columns.join(", ");
        let unique_kw = if unique { "UNIQUE " } else { "" };
        let up = format!("DROP INDEX {name}");
        let down = format!("CREATE {unique_kw}INDEX {name} ON {table} ({cols})");
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn add_foreign_key(
        mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let table = table.into();
        let up = format!(
            "ALTER TABLE {table} ADD CONSTRAINT {name} FOREIGN KEY ({}) REFERENCES {} ({})",
            column.into(),
            ref_table.into(),
            ref_column.into()
        );
        let down = format!("ALTER TABLE {table} DROP CONSTRAINT {name}");
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn drop_foreign_key(mut self, name: impl Into<String>, table: impl Into<String>) -> Self {
        let name = name.into();
        let table = table.into();
        let up = format!("ALTER TABLE {table} DROP CONSTRAINT {name}");
        // Re-adding an exact-same FK on rollback requires the original definition;
        // callers that need a reversible drop should use `raw` instead.
        let down = format!("-- irreversible: dropped foreign key {name} on {table}");
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn add_primary_key(mut self, table: impl Into<String>, columns: &[&str]) -> Self {
        let table = table.into();
        let cols = columns.join(", ");
        let name = format!("pk_{table}");
        let up = format!("ALTER TABLE {table} ADD CONSTRAINT {name} PRIMARY KEY ({cols})");
        let down = format!("ALTER TABLE {table} DROP CONSTRAINT {name}");
        self.push(up, down);
        self
    }

    #[must_use]
    pub fn add_check(mut self, name: impl Into<String>, table: impl Into<String>, expr: impl Into<String>) -> Self {
        let name = name.into();
        let table = table.into();
        let up = format!("ALTER TABLE {table} ADD CONSTRAINT {name} CHECK ({})", expr.into());
        let down = format!("ALTER TABLE {table} DROP CONSTRAINT {name}");
        self.push(up, down);
        self
    }

    /// Append an escape-hatch raw statement pair for anything the typed
    /// operations above cannot express.
    #[must_use]
    pub fn raw(mut self, up: impl Into<String>, down: impl Into<String>) -> Self {
        self.push(up.into(), down.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Migration {
        Migration {
            id: self.id,
            description: self.description,
            connection: self.connection,
            up: self.up,
            down: self.down,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_inverts_to_drop() {
        let m = Migration::builder("0001_users", "create users table")
            .create_table(
                "users",
                vec![
                    ColumnDef::new("id", "INTEGER").not_null(),
                    ColumnDef::new("email", "TEXT").not_null(),
                ],
            )
            .build();

        assert_eq!(m.up, vec!["CREATE TABLE users (id INTEGER NOT NULL, email TEXT NOT NULL)"]);
        assert_eq!(m.down, vec!["DROP TABLE users"]);
    }

    #[test]
    fn down_statements_unwind_in_reverse_order() {
        let m = Migration::builder("0002_multi", "multiple ops")
            .create_table("a", vec![ColumnDef::new("id", "INTEGER")])
            .add_column("a", ColumnDef::new("name", "TEXT"))
            .create_index("idx_a_name", "a", &["name"], false)
            .build();

        assert_eq!(m.up.len(), 3);
        assert_eq!(
            m.down,
            vec![
                "DROP INDEX idx_a_name",
                "ALTER TABLE a DROP COLUMN name",
                "DROP TABLE a",
            ]
        );
    }

    #[test]
    fn defaults_to_the_primary_connection_unless_overridden() {
        let default = Migration::builder("0001", "x").raw("SELECT 1", "SELECT 1").build();
        assert_eq!(default.connection, DEFAULT_CONNECTION);

        let scoped = Migration::builder("0002", "x")
            .connection("analytics")
            .raw("SELECT 1", "SELECT 1")
            .build();
        assert_eq!(scoped.connection, "analytics");
    }
}
