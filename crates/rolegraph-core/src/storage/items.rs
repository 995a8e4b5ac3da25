//! Row-level SQL for the items table.
//!
//! Functions take `&Connection` so they run unchanged inside a
//! `Transaction` (which derefs to `Connection`).

use rusqlite::{Connection, Row, params, params_from_iter};
use std::collections::BTreeMap;

use crate::db::schema::TableNames;
use crate::db::{MAX_BATCH_PARAMS, placeholders};
use crate::error::{StorageError, StorageResult};
use crate::model::{Item, ItemType};

const ITEM_COLUMNS: &str = "name, type, description, rule_name, data, created_at, updated_at";

/// Raw column values before type and payload decoding.
struct ItemRow {
    name: String,
    item_type: String,
    description: Option<String>,
    rule_name: Option<String>,
    data: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        name: row.get(0)?,
        item_type: row.get(1)?,
        description: row.get(2)?,
        rule_name: row.get(3)?,
        data: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl TryFrom<ItemRow> for Item {
    type Error = StorageError;

    fn try_from(row: ItemRow) -> StorageResult<Self> {
        let Ok(item_type) = row.item_type.parse::<ItemType>() else {
            return Err(StorageError::InvalidItemType {
                name: row.name,
                value: row.item_type,
            });
        };

        let data = match row.data.as_deref() {
            Some(raw) => Some(serde_json::from_str(raw).map_err(|source| StorageError::Data {
                name: row.name.clone(),
                source,
            })?),
            None => None,
        };

        Ok(Self {
            name: row.name,
            item_type,
            description: row.description,
            rule_name: row.rule_name,
            data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn encode_data(item: &Item) -> StorageResult<Option<String>> {
    item.data
        .as_ref()
        .map(|value| {
            serde_json::to_string(value).map_err(|source| StorageError::Data {
                name: item.name.clone(),
                source,
            })
        })
        .transpose()
}

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<ItemRow>>,
    into: &mut Vec<Item>,
) -> StorageResult<()> {
    for row in rows {
        into.push(Item::try_from(row?)?);
    }
    Ok(())
}

/// Fetch one item by exact name.
///
/// # Errors
///
/// Returns an error if the query fails or the stored row cannot be decoded
/// ([`StorageError::InvalidItemType`], [`StorageError::Data`]).
pub fn get(conn: &Connection, tables: &TableNames, name: &str) -> StorageResult<Option<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM {} WHERE name = ?1", tables.items());
    match conn.query_row(&sql, params![name], read_row) {
        Ok(row) => Ok(Some(Item::try_from(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Check if an item exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn exists(conn: &Connection, tables: &TableNames, name: &str) -> StorageResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE name = ?1)",
        tables.items()
    );
    Ok(conn.query_row(&sql, params![name], |row| row.get(0))?)
}

/// Check if an item named `name` of `item_type` exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn exists_with_type(
    conn: &Connection,
    tables: &TableNames,
    name: &str,
    item_type: ItemType,
) -> StorageResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE name = ?1 AND type = ?2)",
        tables.items()
    );
    Ok(conn.query_row(&sql, params![name, item_type.as_str()], |row| row.get(0))?)
}

/// List items ordered by name, optionally restricted to one type.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be decoded.
pub fn list(
    conn: &Connection,
    tables: &TableNames,
    item_type: Option<ItemType>,
) -> StorageResult<Vec<Item>> {
    let mut items = Vec::new();
    if let Some(item_type) = item_type {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM {} WHERE type = ?1 ORDER BY name ASC",
            tables.items()
        );
        let mut stmt = conn.prepare(&sql)?;
        collect(stmt.query_map(params![item_type.as_str()], read_row)?, &mut items)?;
    } else {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM {} ORDER BY name ASC", tables.items());
        let mut stmt = conn.prepare(&sql)?;
        collect(stmt.query_map([], read_row)?, &mut items)?;
    }
    Ok(items)
}

/// Fetch the items among `names` that exist, keyed by name.
///
/// Names are looked up in batches of at most [`MAX_BATCH_PARAMS`].
///
/// # Errors
///
/// Returns an error if a batch query fails or a row cannot be decoded.
pub fn get_by_names<S: AsRef<str>>(
    conn: &Connection,
    tables: &TableNames,
    names: &[S],
    item_type: Option<ItemType>,
) -> StorageResult<BTreeMap<String, Item>> {
    let mut found = Vec::new();
    for chunk in names.chunks(MAX_BATCH_PARAMS) {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM {} WHERE name IN ({})",
            tables.items(),
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter().map(AsRef::as_ref)), read_row)?;
        collect(rows, &mut found)?;
    }

    Ok(found
        .into_iter()
        .filter(|item| item_type.is_none_or(|t| item.item_type == t))
        .map(|item| (item.name.clone(), item))
        .collect())
}

/// Insert a new item row.
///
/// # Errors
///
/// Returns an error if the data payload cannot be encoded or the insert
/// fails, including on a duplicate name.
pub fn insert(conn: &Connection, tables: &TableNames, item: &Item) -> StorageResult<()> {
    let sql = format!(
        "INSERT INTO {} ({ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        tables.items()
    );
    conn.execute(
        &sql,
        params![
            item.name,
            item.item_type.as_str(),
            item.description,
            item.rule_name,
            encode_data(item)?,
            item.created_at,
            item.updated_at,
        ],
    )?;
    Ok(())
}

/// Overwrite every column of the row named `old_name`, including the name.
/// Returns the number of rows changed.
///
/// # Errors
///
/// Returns an error if the data payload cannot be encoded or the update
/// fails.
pub fn update(
    conn: &Connection,
    tables: &TableNames,
    old_name: &str,
    item: &Item,
) -> StorageResult<usize> {
    let sql = format!(
        "UPDATE {} SET name = ?1, type = ?2, description = ?3, rule_name = ?4, data = ?5, \
         created_at = ?6, updated_at = ?7 WHERE name = ?8",
        tables.items()
    );
    Ok(conn.execute(
        &sql,
        params![
            item.name,
            item.item_type.as_str(),
            item.description,
            item.rule_name,
            encode_data(item)?,
            item.created_at,
            item.updated_at,
            old_name,
        ],
    )?)
}

/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete(conn: &Connection, tables: &TableNames, name: &str) -> StorageResult<usize> {
    let sql = format!("DELETE FROM {} WHERE name = ?1", tables.items());
    Ok(conn.execute(&sql, params![name])?)
}

/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_all(conn: &Connection, tables: &TableNames) -> StorageResult<usize> {
    Ok(conn.execute(&format!("DELETE FROM {}", tables.items()), [])?)
}

/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_by_type(
    conn: &Connection,
    tables: &TableNames,
    item_type: ItemType,
) -> StorageResult<usize> {
    let sql = format!("DELETE FROM {} WHERE type = ?1", tables.items());
    Ok(conn.execute(&sql, params![item_type.as_str()])?)
}

/// True if any stored item name contains `needle`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn any_name_contains(
    conn: &Connection,
    tables: &TableNames,
    needle: char,
) -> StorageResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE instr(name, ?1) > 0)",
        tables.items()
    );
    Ok(conn.query_row(&sql, params![needle.to_string()], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::db::schema::create_tables;

    fn test_db() -> (Connection, TableNames) {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        let config = StorageConfig::default();
        create_tables(&conn, &config).expect("create tables");
        (conn, TableNames::from_config(&config))
    }

    #[test]
    fn insert_then_get_round_trips_every_column() {
        let (conn, tables) = test_db();
        let item = Item::role("editor")
            .with_description("Edits posts")
            .with_rule_name("ownsPost")
            .with_data(serde_json::json!({"max": 3}))
            .with_created_at(100)
            .with_updated_at(200);
        insert(&conn, &tables, &item).unwrap();

        assert_eq!(get(&conn, &tables, "editor").unwrap(), Some(item));
        assert_eq!(get(&conn, &tables, "missing").unwrap(), None);
    }

    #[test]
    fn unknown_type_is_reported_not_panicked() {
        let (conn, _) = test_db();
        conn.execute_batch(
            "CREATE TABLE loose (name TEXT, type TEXT, description TEXT, rule_name TEXT, \
             data TEXT, created_at INTEGER, updated_at INTEGER);
             INSERT INTO loose VALUES ('x', 'group', NULL, NULL, NULL, 1, 1);",
        )
        .unwrap();
        let tables = TableNames::from_config(
            &StorageConfig::default().with_tables("loose", "rbac_item_child"),
        );

        let err = get(&conn, &tables, "x").unwrap_err();
        assert!(matches!(err, StorageError::InvalidItemType { value, .. } if value == "group"));
    }

    #[test]
    fn corrupt_data_payload_is_reported() {
        let (conn, tables) = test_db();
        conn.execute(
            "INSERT INTO rbac_item (name, type, data, created_at, updated_at) \
             VALUES ('x', 'role', '{not json', 1, 1)",
            [],
        )
        .unwrap();

        let err = get(&conn, &tables, "x").unwrap_err();
        assert!(matches!(err, StorageError::Data { name, .. } if name == "x"));
    }

    #[test]
    fn get_by_names_filters_type_and_skips_missing() {
        let (conn, tables) = test_db();
        insert(&conn, &tables, &Item::role("admin")).unwrap();
        insert(&conn, &tables, &Item::permission("posts.view")).unwrap();

        let all = get_by_names(&conn, &tables, &["admin", "posts.view", "ghost"], None).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), ["admin", "posts.view"]);

        let roles =
            get_by_names(&conn, &tables, &["admin", "posts.view"], Some(ItemType::Role)).unwrap();
        assert_eq!(roles.keys().collect::<Vec<_>>(), ["admin"]);

        let none = get_by_names::<&str>(&conn, &tables, &[], None).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn get_by_names_handles_more_names_than_one_batch() {
        let (conn, tables) = test_db();
        let names: Vec<String> = (0..MAX_BATCH_PARAMS + 7).map(|i| format!("p{i}")).collect();
        for name in &names {
            insert(&conn, &tables, &Item::permission(name.as_str())).unwrap();
        }

        let found = get_by_names(&conn, &tables, &names, None).unwrap();
        assert_eq!(found.len(), names.len());
    }

    #[test]
    fn list_orders_by_name() {
        let (conn, tables) = test_db();
        for item in [Item::role("b"), Item::permission("c"), Item::role("a")] {
            insert(&conn, &tables, &item).unwrap();
        }

        let names: Vec<String> = list(&conn, &tables, None)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(list(&conn, &tables, Some(ItemType::Permission)).unwrap().len(), 1);
    }

    #[test]
    fn separator_scan_matches_substrings() {
        let (conn, tables) = test_db();
        insert(&conn, &tables, &Item::permission("posts.view")).unwrap();

        assert!(any_name_contains(&conn, &tables, '.').unwrap());
        assert!(!any_name_contains(&conn, &tables, '|').unwrap());
    }
}
