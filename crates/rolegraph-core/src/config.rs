use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{StorageError, StorageResult};

pub const DEFAULT_ITEMS_TABLE: &str = "rbac_item";
pub const DEFAULT_ITEMS_CHILDREN_TABLE: &str = "rbac_item_child";
pub const DEFAULT_NAMES_SEPARATOR: &str = "/";

const SEPARATOR_LENGTH_MESSAGE: &str = "Names separator must be exactly 1 character long.";

/// Table names and separator used by the items storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_items_table")]
    pub items_table: String,
    #[serde(default = "default_items_children_table")]
    pub items_children_table: String,
    /// Joins item names when parent lists are fetched in one column. Must be
    /// exactly one character and must not occur in any item name.
    #[serde(default = "default_names_separator")]
    pub names_separator: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            items_table: default_items_table(),
            items_children_table: default_items_children_table(),
            names_separator: default_names_separator(),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn with_names_separator(mut self, separator: impl Into<String>) -> Self {
        self.names_separator = separator.into();
        self
    }

    #[must_use]
    pub fn with_tables(mut self, items: impl Into<String>, children: impl Into<String>) -> Self {
        self.items_table = items.into();
        self.items_children_table = children.into();
        self
    }

    /// Check every field and return the separator as a `char`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] if the separator is not
    /// exactly one character, or if a table name is not a plain SQL
    /// identifier, or if both tables share a name.
    pub fn validate(&self) -> StorageResult<char> {
        let separator = parse_separator(&self.names_separator)?;
        validate_table_name("items", &self.items_table)?;
        validate_table_name("items children", &self.items_children_table)?;
        if self.items_table == self.items_children_table {
            return Err(StorageError::invalid_configuration(format!(
                "Items and items children tables must differ, both are '{}'.",
                self.items_table
            )));
        }
        Ok(separator)
    }
}

/// Load a storage config from a TOML file. A missing file yields defaults.
///
/// The result is not validated; that happens when the storage is built.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_storage_config(path: &Path) -> Result<StorageConfig> {
    if !path.exists() {
        return Ok(StorageConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<StorageConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

// No trimming: " ," is two characters and is rejected.
fn parse_separator(raw: &str) -> StorageResult<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(separator), None) => Ok(separator),
        _ => Err(StorageError::invalid_configuration(SEPARATOR_LENGTH_MESSAGE)),
    }
}

fn validate_table_name(label: &str, name: &str) -> StorageResult<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::invalid_configuration(format!(
            "Invalid {label} table name '{name}': use ASCII letters, digits and underscores."
        )))
    }
}

fn default_items_table() -> String {
    DEFAULT_ITEMS_TABLE.to_string()
}

fn default_items_children_table() -> String {
    DEFAULT_ITEMS_CHILDREN_TABLE.to_string()
}

fn default_names_separator() -> String {
    DEFAULT_NAMES_SEPARATOR.to_string()
}
