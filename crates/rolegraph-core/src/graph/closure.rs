//! Transitive closure over the items children table.
//!
//! Expansion is breadth-first, one frontier at a time: every frontier is
//! resolved with batched `IN (...)` queries instead of one query per node.
//! A visited set guards against revisits, so the walk stays O(V+E) even when
//! many paths lead to the same item.

use rusqlite::{Connection, params_from_iter};
use std::collections::HashSet;

use crate::db::schema::TableNames;
use crate::db::{MAX_BATCH_PARAMS, placeholders};
use crate::error::StorageResult;

/// Which way edges are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// parent → child
    Children,
    /// child → parent
    Parents,
}

impl Direction {
    /// `(from column, to column)` in the edge table.
    const fn columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Children => ("parent", "child"),
            Self::Parents => ("child", "parent"),
        }
    }
}

/// All edges leaving `frontier` in `direction`, as `(from, to)` pairs in a
/// stable order.
///
/// # Errors
///
/// Returns an error if a batch query fails.
pub fn edges_from<S: AsRef<str>>(
    conn: &Connection,
    tables: &TableNames,
    frontier: &[S],
    direction: Direction,
) -> StorageResult<Vec<(String, String)>> {
    let (from, to) = direction.columns();
    let mut edges = Vec::new();

    for chunk in frontier.chunks(MAX_BATCH_PARAMS) {
        let sql = format!(
            "SELECT {from}, {to} FROM {} WHERE {from} IN ({}) ORDER BY {from} ASC, {to} ASC",
            tables.children(),
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter().map(AsRef::as_ref)), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        for row in rows {
            edges.push(row?);
        }
    }

    Ok(edges)
}

/// Every name reachable from `roots` in `direction`, in BFS order.
///
/// Roots are not part of the result unless one is reachable from another.
///
/// # Errors
///
/// Returns an error if loading a frontier fails.
pub fn reachable<S: AsRef<str>>(
    conn: &Connection,
    tables: &TableNames,
    roots: &[S],
    direction: Direction,
) -> StorageResult<Vec<String>> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut frontier: Vec<String> = Vec::new();
    let mut seen_roots: HashSet<&str> = HashSet::new();
    for root in roots {
        if seen_roots.insert(root.as_ref()) {
            frontier.push(root.as_ref().to_string());
        }
    }

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for (_, to) in edges_from(conn, tables, &frontier, direction)? {
            if visited.insert(to.clone()) {
                order.push(to.clone());
                next.push(to);
            }
        }
        frontier = next;
    }

    Ok(order)
}

/// True if `to` can be reached from `from` following parent → child edges.
/// Stops at the first frontier containing `to`.
///
/// # Errors
///
/// Returns an error if loading a frontier fails.
pub fn is_reachable(
    conn: &Connection,
    tables: &TableNames,
    from: &str,
    to: &str,
) -> StorageResult<bool> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier = vec![from.to_string()];

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for (_, child) in edges_from(conn, tables, &frontier, Direction::Children)? {
            if child == to {
                return Ok(true);
            }
            if visited.insert(child.clone()) {
                next.push(child);
            }
        }
        frontier = next;
    }

    Ok(false)
}
