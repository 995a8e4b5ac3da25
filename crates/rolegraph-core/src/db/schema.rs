//! SQLite schema for the two relations backing the items storage.
//!
//! - the items table keeps one row per role or permission, keyed by name
//! - the items children table keeps one row per parent→child edge
//!
//! Table names come from [`StorageConfig`], so DDL is rendered at runtime.
//! No foreign-key cascades are declared: the storage performs cascading
//! deletes and rename propagation itself, inside one transaction.

use rusqlite::Connection;

use crate::config::StorageConfig;
use crate::error::StorageResult;

/// Quoted table identifiers derived from a validated [`StorageConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    items: String,
    children: String,
}

impl TableNames {
    /// Build quoted identifiers. The config must already be validated, which
    /// guarantees plain identifiers without quote characters.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            items: format!("\"{}\"", config.items_table),
            children: format!("\"{}\"", config.items_children_table),
        }
    }

    #[must_use]
    pub fn items(&self) -> &str {
        &self.items
    }

    #[must_use]
    pub fn children(&self) -> &str {
        &self.children
    }
}

/// Names of the lookup indexes created alongside the tables.
#[must_use]
pub fn index_names(config: &StorageConfig) -> [String; 2] {
    [
        format!("idx_{}_type", config.items_table),
        format!("idx_{}_child", config.items_children_table),
    ]
}

/// Render the DDL for both tables and their indexes.
#[must_use]
pub fn schema_sql(config: &StorageConfig) -> String {
    let items = &config.items_table;
    let children = &config.items_children_table;
    let [type_index, child_index] = index_names(config);

    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{items}" (
    name TEXT PRIMARY KEY NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('role', 'permission')),
    description TEXT,
    rule_name TEXT,
    data TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS "{type_index}"
    ON "{items}"(type, name);

CREATE TABLE IF NOT EXISTS "{children}" (
    parent TEXT NOT NULL,
    child TEXT NOT NULL,
    PRIMARY KEY (parent, child),
    CHECK (parent <> child)
);

CREATE INDEX IF NOT EXISTS "{child_index}"
    ON "{children}"(child, parent);
"#
    )
}

/// Create both tables and their indexes if they do not exist yet.
///
/// # Errors
///
/// Returns an error if the config is invalid or the DDL fails.
pub fn create_tables(conn: &Connection, config: &StorageConfig) -> StorageResult<()> {
    config.validate()?;
    conn.execute_batch(&schema_sql(config))?;
    tracing::info!(
        items = %config.items_table,
        children = %config.items_children_table,
        "ensured rbac tables"
    );
    Ok(())
}
