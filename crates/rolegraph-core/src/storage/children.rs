//! Row-level SQL for the items children (edge) table.

use rusqlite::{Connection, params};

use crate::db::schema::TableNames;
use crate::error::StorageResult;
use crate::model::ItemType;

/// Insert the edge `parent → child`.
///
/// # Errors
///
/// Returns an error if the insert fails, including when the edge already
/// exists (primary key violation).
pub fn insert(
    conn: &Connection,
    tables: &TableNames,
    parent: &str,
    child: &str,
) -> StorageResult<()> {
    let sql = format!("INSERT INTO {} (parent, child) VALUES (?1, ?2)", tables.children());
    conn.execute(&sql, params![parent, child])?;
    Ok(())
}

/// Check if the direct edge `parent → child` exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn exists(
    conn: &Connection,
    tables: &TableNames,
    parent: &str,
    child: &str,
) -> StorageResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE parent = ?1 AND child = ?2)",
        tables.children()
    );
    Ok(conn.query_row(&sql, params![parent, child], |row| row.get(0))?)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn has_any(conn: &Connection, tables: &TableNames, parent: &str) -> StorageResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE parent = ?1)",
        tables.children()
    );
    Ok(conn.query_row(&sql, params![parent], |row| row.get(0))?)
}

/// Direct child names of `parent`, ordered by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn direct_children(
    conn: &Connection,
    tables: &TableNames,
    parent: &str,
) -> StorageResult<Vec<String>> {
    let sql = format!(
        "SELECT child FROM {} WHERE parent = ?1 ORDER BY child ASC",
        tables.children()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![parent], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

/// Count stored edges.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count(conn: &Connection, tables: &TableNames) -> StorageResult<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", tables.children());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Delete the edge `parent → child`, returning the number of rows removed.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete(
    conn: &Connection,
    tables: &TableNames,
    parent: &str,
    child: &str,
) -> StorageResult<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE parent = ?1 AND child = ?2",
        tables.children()
    );
    Ok(conn.execute(&sql, params![parent, child])?)
}

/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_of_parent(
    conn: &Connection,
    tables: &TableNames,
    parent: &str,
) -> StorageResult<usize> {
    let sql = format!("DELETE FROM {} WHERE parent = ?1", tables.children());
    Ok(conn.execute(&sql, params![parent])?)
}

/// Delete every edge where `name` is the parent or the child.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_touching(conn: &Connection, tables: &TableNames, name: &str) -> StorageResult<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE parent = ?1 OR child = ?1",
        tables.children()
    );
    Ok(conn.execute(&sql, params![name])?)
}

/// Delete every edge with at least one endpoint of `item_type`. Edges
/// between two items of the other type are kept.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_touching_type(
    conn: &Connection,
    tables: &TableNames,
    item_type: ItemType,
) -> StorageResult<usize> {
    let sql = format!(
        "DELETE FROM {children} \
         WHERE parent IN (SELECT name FROM {items} WHERE type = ?1) \
            OR child IN (SELECT name FROM {items} WHERE type = ?1)",
        children = tables.children(),
        items = tables.items(),
    );
    Ok(conn.execute(&sql, params![item_type.as_str()])?)
}

/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_all(conn: &Connection, tables: &TableNames) -> StorageResult<usize> {
    Ok(conn.execute(&format!("DELETE FROM {}", tables.children()), [])?)
}

/// Rewrite `old_name` to `new_name` in both edge columns.
///
/// # Errors
///
/// Returns an error if either update fails.
pub fn rename(
    conn: &Connection,
    tables: &TableNames,
    old_name: &str,
    new_name: &str,
) -> StorageResult<usize> {
    let as_parent = conn.execute(
        &format!("UPDATE {} SET parent = ?1 WHERE parent = ?2", tables.children()),
        params![new_name, old_name],
    )?;
    let as_child = conn.execute(
        &format!("UPDATE {} SET child = ?1 WHERE child = ?2", tables.children()),
        params![new_name, old_name],
    )?;
    Ok(as_parent + as_child)
}
