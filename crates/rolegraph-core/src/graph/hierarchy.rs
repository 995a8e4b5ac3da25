//! Hierarchy view around a single item.
//!
//! For a root item the view holds the root itself and every transitive
//! ancestor of it. Each entry lists, as `children`, every other member of
//! that collected set that lies below it. This is the cumulative set, not
//! only the direct children:
//!
//! ```text
//! posts.admin ──► posts.redactor ──► posts.viewer ──► posts.view
//!      └───────────────┴──────────────────┴──────────────►┘
//!
//! posts.view      children: {}
//! posts.viewer    children: {posts.view}
//! posts.redactor  children: {posts.view, posts.viewer}
//! posts.admin     children: {posts.view, posts.viewer, posts.redactor}
//! ```
//!
//! # Names separator
//!
//! Parent lists are fetched one frontier at a time as a single
//! `group_concat` column joined with the configured separator and split back
//! in Rust. A name containing the separator would split into bogus names, so
//! the whole items table is scanned first and any hit fails the call with
//! [`StorageError::SeparatorCollision`].

use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::db::schema::TableNames;
use crate::db::{MAX_BATCH_PARAMS, placeholders_from};
use crate::error::{StorageError, StorageResult};
use crate::model::Item;
use crate::storage::items;

/// One entry of a [`Hierarchy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyNode {
    pub item: Item,
    /// Every collected item below `item`, keyed by name.
    pub children: BTreeMap<String, Item>,
}

/// Item name → node, for the root and all of its ancestors.
pub type Hierarchy = BTreeMap<String, HierarchyNode>;

/// Fail with [`StorageError::SeparatorCollision`] if any stored item name
/// contains `separator`.
///
/// # Errors
///
/// Returns [`StorageError::SeparatorCollision`] on a hit, or an error if the
/// scan fails.
pub fn ensure_no_separator_collision(
    conn: &Connection,
    tables: &TableNames,
    separator: char,
) -> StorageResult<()> {
    if items::any_name_contains(conn, tables, separator)? {
        tracing::warn!(%separator, "item names collide with the names separator");
        return Err(StorageError::SeparatorCollision);
    }
    Ok(())
}

/// Build the hierarchy view for `root`. An unknown root yields an empty map.
///
/// # Errors
///
/// Returns [`StorageError::SeparatorCollision`] if any stored name contains
/// `separator`, or an error if a query fails.
pub fn build_hierarchy(
    conn: &Connection,
    tables: &TableNames,
    separator: char,
    root: &str,
) -> StorageResult<Hierarchy> {
    ensure_no_separator_collision(conn, tables, separator)?;

    if !items::exists(conn, tables, root)? {
        return Ok(Hierarchy::new());
    }

    // Upward BFS: members are the root plus every ancestor, in BFS order.
    let mut members: Vec<String> = vec![root.to_string()];
    let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
    let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
    let mut frontier = vec![root.to_string()];

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for (child, parents) in parent_lists(conn, tables, separator, &frontier)? {
            for parent in parents {
                children_of
                    .entry(parent.clone())
                    .or_default()
                    .push(child.clone());
                if visited.insert(parent.clone()) {
                    members.push(parent.clone());
                    next.push(parent);
                }
            }
        }
        frontier = next;
    }

    let found = items::get_by_names(conn, tables, &members, None)?;

    let mut hierarchy = Hierarchy::new();
    for name in &members {
        let Some(item) = found.get(name) else {
            // Edge points at a missing item row.
            continue;
        };
        let children = descendants_within(&children_of, name)
            .into_iter()
            .filter_map(|descendant| {
                found
                    .get(&descendant)
                    .map(|item| (descendant, item.clone()))
            })
            .collect();
        hierarchy.insert(
            name.clone(),
            HierarchyNode {
                item: item.clone(),
                children,
            },
        );
    }

    tracing::debug!(root, entries = hierarchy.len(), "built hierarchy");
    Ok(hierarchy)
}

/// Direct parents of every frontier item, fetched as separator-joined lists.
fn parent_lists(
    conn: &Connection,
    tables: &TableNames,
    separator: char,
    frontier: &[String],
) -> StorageResult<Vec<(String, Vec<String>)>> {
    let separator_text = separator.to_string();
    let mut lists = Vec::new();

    for chunk in frontier.chunks(MAX_BATCH_PARAMS) {
        // ?1 is the separator; names start at ?2.
        let names = placeholders_from(2, chunk.len());
        let sql = format!(
            "SELECT child, group_concat(parent, ?1) FROM \
             (SELECT child, parent FROM {} WHERE child IN ({names}) ORDER BY child, parent) \
             GROUP BY child ORDER BY child ASC",
            tables.children()
        );
        let params = std::iter::once(separator_text.as_str())
            .chain(chunk.iter().map(String::as_str));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (child, joined) = row?;
            let parents = joined.split(separator).map(str::to_string).collect();
            lists.push((child, parents));
        }
    }

    Ok(lists)
}

/// Everything below `name` using only the collected downward edges.
///
/// Any path from a member down to another member stays inside the member
/// set (every item on it is also an ancestor of the root), so the collected
/// edges are enough.
fn descendants_within(children_of: &HashMap<String, Vec<String>>, name: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![name];
    let mut out = Vec::new();

    while let Some(current) = stack.pop() {
        for child in children_of.get(current).into_iter().flatten() {
            if seen.insert(child.as_str()) {
                out.push(child.clone());
                stack.push(child.as_str());
            }
        }
    }

    out
}
