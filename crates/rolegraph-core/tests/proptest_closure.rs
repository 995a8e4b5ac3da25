use proptest::prelude::*;
use rolegraph_core::{Item, ItemsStore, StorageConfig, StorageError};
use std::collections::{BTreeSet, HashMap};

use fixtures::empty_storage;

const NODES: usize = 12;

fn node(i: usize) -> String {
    format!("item{i:02}")
}

/// Forward-only pairs, so every generated graph is a DAG.
fn arb_dag() -> impl Strategy<Value = BTreeSet<(usize, usize)>> {
    prop::collection::btree_set((0..NODES, 0..NODES), 0..40).prop_map(|pairs| {
        pairs
            .into_iter()
            .filter(|(a, b)| a < b)
            .collect::<BTreeSet<_>>()
    })
}

fn arb_edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..NODES, 0..NODES), 0..40)
}

fn storage_with_nodes() -> rolegraph_core::ItemsStorage {
    let mut storage = empty_storage(&StorageConfig::default());
    for i in 0..NODES {
        let item = if i % 3 == 0 {
            Item::permission(node(i))
        } else {
            Item::role(node(i))
        };
        storage.add(&item).expect("add node");
    }
    storage
}

/// Repeated single-step expansion through `get_direct_children`.
fn naive_descendants(storage: &impl ItemsStore, root: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut pending = vec![root.to_string()];
    while let Some(current) = pending.pop() {
        for child in storage.get_direct_children(&current).expect("direct children").into_keys() {
            if found.insert(child.clone()) {
                pending.push(child);
            }
        }
    }
    found
}

fn has_cycle(edges: &[(String, String)]) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (parent, child) in edges {
        adjacency
            .entry(parent.as_str())
            .or_default()
            .push(child.as_str());
    }

    // 0 = unvisited, 1 = on stack, 2 = done
    fn visit<'a>(
        name: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        state: &mut HashMap<&'a str, u8>,
    ) -> bool {
        match state.get(name) {
            Some(1) => return true,
            Some(2) => return false,
            _ => {}
        }
        state.insert(name, 1);
        for next in adjacency.get(name).into_iter().flatten() {
            if visit(next, adjacency, state) {
                return true;
            }
        }
        state.insert(name, 2);
        false
    }

    let mut state = HashMap::new();
    adjacency
        .keys()
        .any(|name| visit(*name, &adjacency, &mut state))
}

fn stored_edges(storage: &rolegraph_core::ItemsStorage) -> Vec<(String, String)> {
    let mut stmt = storage
        .connection()
        .prepare("SELECT parent, child FROM rbac_item_child")
        .expect("prepare");
    let edges = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query edges")
        .collect::<Result<Vec<_>, _>>()
        .expect("read edges");
    edges
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn batched_closure_matches_naive_expansion(dag in arb_dag()) {
        let mut storage = storage_with_nodes();
        for (parent, child) in &dag {
            storage.add_child(&node(*parent), &node(*child)).expect("forward edge");
        }

        for i in 0..NODES {
            let root = node(i);
            let batched: BTreeSet<String> =
                storage.get_all_children(&[root.as_str()]).expect("closure").into_keys().collect();
            prop_assert_eq!(&batched, &naive_descendants(&storage, &root));

            for other in 0..NODES {
                let other = node(other);
                prop_assert_eq!(
                    storage.has_descendant(&root, &other).expect("has_descendant"),
                    batched.contains(&other)
                );
            }
        }
    }

    #[test]
    fn parents_are_the_inverse_of_children(dag in arb_dag()) {
        let mut storage = storage_with_nodes();
        for (parent, child) in &dag {
            storage.add_child(&node(*parent), &node(*child)).expect("forward edge");
        }

        for i in 0..NODES {
            let name = node(i);
            let parents = storage.get_all_parents(&name).expect("parents");
            for j in 0..NODES {
                let other = node(j);
                let below = storage.get_all_children(&[other.as_str()]).expect("children");
                prop_assert_eq!(parents.contains_key(&other), below.contains_key(&name));
            }
        }
    }

    #[test]
    fn random_edge_inserts_never_create_a_cycle(edges in arb_edges()) {
        let mut storage = storage_with_nodes();
        for (parent, child) in edges {
            let (parent, child) = (node(parent), node(child));
            let closes_cycle = parent == child
                || storage.has_descendant(&child, &parent).expect("has_descendant");
            let before = storage.edge_count().expect("count");

            match storage.add_child(&parent, &child) {
                Ok(()) => {
                    prop_assert!(!closes_cycle);
                    prop_assert_eq!(storage.edge_count().expect("count"), before + 1);
                }
                Err(err) => {
                    prop_assert_eq!(storage.edge_count().expect("count"), before);
                    if closes_cycle {
                        prop_assert!(
                            matches!(err, StorageError::CycleDetected { .. }),
                            "expected a cycle error for {} -> {}, got {:?}",
                            parent,
                            child,
                            err
                        );
                    } else {
                        prop_assert!(
                            matches!(err, StorageError::EdgeExists { .. }),
                            "expected a duplicate edge error for {} -> {}, got {:?}",
                            parent,
                            child,
                            err
                        );
                    }
                }
            }
        }

        prop_assert!(!has_cycle(&stored_edges(&storage)));
    }
}
