//! Cycle detection for new parent → child edges.
//!
//! Adding `parent → child` closes a cycle exactly when `parent` is already
//! reachable from `child`. The check walks breadth-first from `child`,
//! remembering how each item was reached, and stops as soon as `parent`
//! shows up. Each item and edge is visited at most once.

use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

use super::closure::{Direction, edges_from};
use crate::db::schema::TableNames;
use crate::error::StorageResult;

/// Return the cycle that `parent → child` would close, if any.
///
/// The path starts and ends at `parent`: for existing edges A→B→C, adding
/// C→A yields `["C", "A", "B", "C"]`. A self-loop yields `[parent, parent]`.
///
/// # Errors
///
/// Returns an error if loading edges fails.
pub fn detect_cycle_on_add(
    conn: &Connection,
    tables: &TableNames,
    parent: &str,
    child: &str,
) -> StorageResult<Option<Vec<String>>> {
    if parent == child {
        return Ok(Some(vec![parent.to_string(), parent.to_string()]));
    }

    let mut visited: HashSet<String> = HashSet::from([child.to_string()]);
    let mut reached_from: HashMap<String, String> = HashMap::new();
    let mut frontier = vec![child.to_string()];

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for (from, to) in edges_from(conn, tables, &frontier, Direction::Children)? {
            if !visited.insert(to.clone()) {
                continue;
            }
            reached_from.insert(to.clone(), from);
            if to == parent {
                return Ok(Some(cycle_path(&reached_from, parent, child)));
            }
            next.push(to);
        }
        frontier = next;
    }

    Ok(None)
}

/// Rebuild `parent → child → … → parent` from the BFS predecessor map.
fn cycle_path(reached_from: &HashMap<String, String>, parent: &str, child: &str) -> Vec<String> {
    let mut back = vec![parent.to_string()];
    let mut current = parent;
    while current != child {
        match reached_from.get(current) {
            Some(previous) => {
                back.push(previous.clone());
                current = previous.as_str();
            }
            None => break,
        }
    }
    back.reverse();

    let mut path = Vec::with_capacity(back.len() + 1);
    path.push(parent.to_string());
    path.extend(back);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::db::schema::create_tables;
    use crate::storage::children;

    fn test_db(edges: &[(&str, &str)]) -> (Connection, TableNames) {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        let config = StorageConfig::default();
        create_tables(&conn, &config).expect("create tables");
        let tables = TableNames::from_config(&config);
        for (parent, child) in edges {
            children::insert(&conn, &tables, parent, child).expect("insert edge");
        }
        (conn, tables)
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let (conn, tables) = test_db(&[]);
        let path = detect_cycle_on_add(&conn, &tables, "a", "a").unwrap();
        assert_eq!(path, Some(vec!["a".to_string(), "a".to_string()]));
    }

    #[test]
    fn mutual_edge_is_a_cycle() {
        let (conn, tables) = test_db(&[("a", "b")]);
        let path = detect_cycle_on_add(&conn, &tables, "b", "a").unwrap().unwrap();
        assert_eq!(path, ["b", "a", "b"]);
    }

    #[test]
    fn closing_a_chain_reports_full_path() {
        let (conn, tables) = test_db(&[("a", "b"), ("b", "c")]);
        let path = detect_cycle_on_add(&conn, &tables, "c", "a").unwrap().unwrap();
        assert_eq!(path, ["c", "a", "b", "c"]);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        // a -> b -> d, a -> c; adding c -> d keeps the graph acyclic
        let (conn, tables) = test_db(&[("a", "b"), ("a", "c"), ("b", "d")]);
        assert_eq!(detect_cycle_on_add(&conn, &tables, "c", "d").unwrap(), None);
    }

    #[test]
    fn unrelated_items_are_not_a_cycle() {
        let (conn, tables) = test_db(&[("a", "b")]);
        assert_eq!(detect_cycle_on_add(&conn, &tables, "x", "y").unwrap(), None);
        assert_eq!(detect_cycle_on_add(&conn, &tables, "a", "b").unwrap(), None);
    }
}
