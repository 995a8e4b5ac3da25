//! Items storage: CRUD for roles, permissions and their parent → child
//! edges, plus transitive queries over the resulting graph.
//!
//! [`ItemsStore`] is the interface consumers (such as an access checker)
//! program against; [`ItemsStorage`] implements it over a SQLite connection.
//!
//! # Atomicity
//!
//! Every multi-statement mutation (cascading removes, rename propagation,
//! cycle-checked edge inserts, bulk clears) runs in one
//! [`rusqlite::Transaction`]. Returning early with `?` drops the transaction,
//! which rolls it back, so a failure never leaves half-applied changes.

pub mod children;
pub mod items;

use rusqlite::Connection;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::db::schema::TableNames;
use crate::error::{StorageError, StorageResult};
use crate::graph::closure::{self, Direction};
use crate::graph::cycles;
use crate::graph::hierarchy::{self, Hierarchy};
use crate::model::{Item, ItemType};

/// Storage interface for the authorization item graph, keyed by item name.
pub trait ItemsStore {
    /// Remove every item and every edge.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails; the transaction is rolled back.
    fn clear(&mut self) -> StorageResult<()>;

    /// All items, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_all(&self) -> StorageResult<Vec<Item>>;

    /// The items among `names` that exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_by_names(&self, names: &[&str]) -> StorageResult<BTreeMap<String, Item>>;

    /// Look up one item. `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, name: &str) -> StorageResult<Option<Item>>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Insert a new item.
    ///
    /// # Errors
    ///
    /// [`StorageError::DuplicateName`] if the name is taken.
    fn add(&mut self, item: &Item) -> StorageResult<()>;

    /// Replace the item stored as `name`. A changed `item.name` renames the
    /// item and every edge that references it.
    ///
    /// # Errors
    ///
    /// [`StorageError::UnknownItem`] if `name` does not exist,
    /// [`StorageError::DuplicateName`] if the new name is taken.
    fn update(&mut self, name: &str, item: &Item) -> StorageResult<()>;

    /// Remove an item and every edge touching it. Absent names are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails; the transaction is rolled back.
    fn remove(&mut self, name: &str) -> StorageResult<()>;

    /// All items of one type, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_by_type(&self, item_type: ItemType) -> StorageResult<Vec<Item>>;

    /// Remove every item of one type and every edge touching one of them.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails; the transaction is rolled back.
    fn clear_by_type(&mut self, item_type: ItemType) -> StorageResult<()>;

    /// Every transitive ancestor of `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_all_parents(&self, name: &str) -> StorageResult<BTreeMap<String, Item>>;

    /// The hierarchy view around `name`; see [`crate::graph::hierarchy`].
    ///
    /// # Errors
    ///
    /// [`StorageError::SeparatorCollision`] if any stored name contains the
    /// names separator.
    fn get_hierarchy(&self, name: &str) -> StorageResult<Hierarchy>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_direct_children(&self, name: &str) -> StorageResult<BTreeMap<String, Item>>;

    /// Every item transitively below any of `names`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_all_children(&self, names: &[&str]) -> StorageResult<BTreeMap<String, Item>>;

    /// True if `name` has at least one direct child.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn has_children(&self, name: &str) -> StorageResult<bool>;

    /// True if the direct edge `parent → child` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn has_child(&self, parent: &str, child: &str) -> StorageResult<bool>;

    /// True if `child` is anywhere below `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn has_descendant(&self, parent: &str, child: &str) -> StorageResult<bool>;

    /// Add the edge `parent → child`.
    ///
    /// # Errors
    ///
    /// [`StorageError::UnknownItem`] if either item is missing,
    /// [`StorageError::CycleDetected`] if the edge would close a cycle,
    /// [`StorageError::EdgeExists`] if the edge is already present.
    fn add_child(&mut self, parent: &str, child: &str) -> StorageResult<()>;

    /// Remove the edge `parent → child`. Absent edges are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails; the transaction is rolled back.
    fn remove_child(&mut self, parent: &str, child: &str) -> StorageResult<()>;

    /// Remove every direct edge below `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails; the transaction is rolled back.
    fn remove_children(&mut self, parent: &str) -> StorageResult<()>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_roles(&self) -> StorageResult<Vec<Item>> {
        self.get_by_type(ItemType::Role)
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_permissions(&self) -> StorageResult<Vec<Item>> {
        self.get_by_type(ItemType::Permission)
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_role(&self, name: &str) -> StorageResult<Option<Item>> {
        Ok(self.get(name)?.filter(Item::is_role))
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_permission(&self, name: &str) -> StorageResult<Option<Item>> {
        Ok(self.get(name)?.filter(Item::is_permission))
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn role_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.get_role(name)?.is_some())
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_roles_by_names(&self, names: &[&str]) -> StorageResult<BTreeMap<String, Item>> {
        Ok(only_type(self.get_by_names(names)?, ItemType::Role))
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_permissions_by_names(&self, names: &[&str]) -> StorageResult<BTreeMap<String, Item>> {
        Ok(only_type(self.get_by_names(names)?, ItemType::Permission))
    }

    /// # Errors
    ///
    /// Returns an error if a write fails; the transaction is rolled back.
    fn clear_roles(&mut self) -> StorageResult<()> {
        self.clear_by_type(ItemType::Role)
    }

    /// # Errors
    ///
    /// Returns an error if a write fails; the transaction is rolled back.
    fn clear_permissions(&mut self) -> StorageResult<()> {
        self.clear_by_type(ItemType::Permission)
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_all_child_roles(&self, names: &[&str]) -> StorageResult<BTreeMap<String, Item>> {
        Ok(only_type(self.get_all_children(names)?, ItemType::Role))
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_all_child_permissions(&self, names: &[&str]) -> StorageResult<BTreeMap<String, Item>> {
        Ok(only_type(self.get_all_children(names)?, ItemType::Permission))
    }
}

fn only_type(items: BTreeMap<String, Item>, item_type: ItemType) -> BTreeMap<String, Item> {
    items
        .into_iter()
        .filter(|(_, item)| item.item_type == item_type)
        .collect()
}

/// [`ItemsStore`] over a SQLite connection.
///
/// The storage owns its connection; use [`ItemsStorage::connection`] for
/// read-only inspection and [`ItemsStorage::into_connection`] to take it back.
#[derive(Debug)]
pub struct ItemsStorage {
    conn: Connection,
    tables: TableNames,
    separator: char,
}

impl ItemsStorage {
    /// Build a storage over `conn`. The tables must already exist (see
    /// [`crate::db::schema::create_tables`]).
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidConfiguration`] if `config` does not validate.
    pub fn new(conn: Connection, config: &StorageConfig) -> StorageResult<Self> {
        let separator = config.validate()?;
        Ok(Self {
            conn,
            tables: TableNames::from_config(config),
            separator,
        })
    }

    /// Build a storage with default table names and separator.
    ///
    /// # Errors
    ///
    /// Never fails for the defaults; kept fallible for symmetry with `new`.
    pub fn with_defaults(conn: Connection) -> StorageResult<Self> {
        Self::new(conn, &StorageConfig::default())
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    #[must_use]
    pub const fn names_separator(&self) -> char {
        self.separator
    }

    /// Number of stored edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn edge_count(&self) -> StorageResult<u64> {
        children::count(&self.conn, &self.tables)
    }

    fn require_item(conn: &Connection, tables: &TableNames, name: &str) -> StorageResult<()> {
        if items::exists(conn, tables, name)? {
            Ok(())
        } else {
            Err(StorageError::UnknownItem(name.to_string()))
        }
    }

    fn load(&self, names: &[String]) -> StorageResult<BTreeMap<String, Item>> {
        items::get_by_names(&self.conn, &self.tables, names, None)
    }
}

impl ItemsStore for ItemsStorage {
    fn clear(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        let edges = children::delete_all(&tx, &self.tables)?;
        let removed = items::delete_all(&tx, &self.tables)?;
        tx.commit()?;
        info!(removed, edges, "cleared all items");
        Ok(())
    }

    fn get_all(&self) -> StorageResult<Vec<Item>> {
        items::list(&self.conn, &self.tables, None)
    }

    fn get_by_names(&self, names: &[&str]) -> StorageResult<BTreeMap<String, Item>> {
        items::get_by_names(&self.conn, &self.tables, names, None)
    }

    fn get(&self, name: &str) -> StorageResult<Option<Item>> {
        items::get(&self.conn, &self.tables, name)
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        items::exists(&self.conn, &self.tables, name)
    }

    fn role_exists(&self, name: &str) -> StorageResult<bool> {
        items::exists_with_type(&self.conn, &self.tables, name, ItemType::Role)
    }

    fn add(&mut self, item: &Item) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        if items::exists(&tx, &self.tables, &item.name)? {
            return Err(StorageError::DuplicateName(item.name.clone()));
        }
        items::insert(&tx, &self.tables, item)?;
        tx.commit()?;
        debug!(item = %item.name, item_type = %item.item_type, "added item");
        Ok(())
    }

    fn update(&mut self, name: &str, item: &Item) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        Self::require_item(&tx, &self.tables, name)?;

        let renamed = item.name != name;
        if renamed && items::exists(&tx, &self.tables, &item.name)? {
            return Err(StorageError::DuplicateName(item.name.clone()));
        }

        items::update(&tx, &self.tables, name, item)?;
        let edges = if renamed {
            children::rename(&tx, &self.tables, name, &item.name)?
        } else {
            0
        };
        tx.commit()?;

        debug!(item = name, new_name = %item.name, edges, "updated item");
        Ok(())
    }

    fn remove(&mut self, name: &str) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        let edges = children::delete_touching(&tx, &self.tables, name)?;
        let removed = items::delete(&tx, &self.tables, name)?;
        tx.commit()?;
        debug!(item = name, removed, edges, "removed item");
        Ok(())
    }

    fn get_by_type(&self, item_type: ItemType) -> StorageResult<Vec<Item>> {
        items::list(&self.conn, &self.tables, Some(item_type))
    }

    fn clear_by_type(&mut self, item_type: ItemType) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        // Edges first: the delete resolves endpoints against the items table.
        let edges = children::delete_touching_type(&tx, &self.tables, item_type)?;
        let removed = items::delete_by_type(&tx, &self.tables, item_type)?;
        tx.commit()?;
        info!(%item_type, removed, edges, "cleared items by type");
        Ok(())
    }

    fn get_all_parents(&self, name: &str) -> StorageResult<BTreeMap<String, Item>> {
        let names = closure::reachable(&self.conn, &self.tables, &[name], Direction::Parents)?;
        self.load(&names)
    }

    fn get_hierarchy(&self, name: &str) -> StorageResult<Hierarchy> {
        hierarchy::build_hierarchy(&self.conn, &self.tables, self.separator, name)
    }

    fn get_direct_children(&self, name: &str) -> StorageResult<BTreeMap<String, Item>> {
        let names = children::direct_children(&self.conn, &self.tables, name)?;
        self.load(&names)
    }

    fn get_all_children(&self, names: &[&str]) -> StorageResult<BTreeMap<String, Item>> {
        let found = closure::reachable(&self.conn, &self.tables, names, Direction::Children)?;
        self.load(&found)
    }

    fn has_children(&self, name: &str) -> StorageResult<bool> {
        children::has_any(&self.conn, &self.tables, name)
    }

    fn has_child(&self, parent: &str, child: &str) -> StorageResult<bool> {
        children::exists(&self.conn, &self.tables, parent, child)
    }

    fn has_descendant(&self, parent: &str, child: &str) -> StorageResult<bool> {
        closure::is_reachable(&self.conn, &self.tables, parent, child)
    }

    fn add_child(&mut self, parent: &str, child: &str) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        Self::require_item(&tx, &self.tables, parent)?;
        Self::require_item(&tx, &self.tables, child)?;

        if let Some(path) = cycles::detect_cycle_on_add(&tx, &self.tables, parent, child)? {
            warn!(parent, child, path = %path.join(" -> "), "rejected child: cycle");
            return Err(StorageError::CycleDetected {
                parent: parent.to_string(),
                child: child.to_string(),
                path,
            });
        }
        if children::exists(&tx, &self.tables, parent, child)? {
            return Err(StorageError::EdgeExists {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }

        children::insert(&tx, &self.tables, parent, child)?;
        tx.commit()?;
        debug!(parent, child, "added child");
        Ok(())
    }

    fn remove_child(&mut self, parent: &str, child: &str) -> StorageResult<()> {
        let removed = children::delete(&self.conn, &self.tables, parent, child)?;
        debug!(parent, child, removed, "removed child");
        Ok(())
    }

    fn remove_children(&mut self, parent: &str) -> StorageResult<()> {
        let removed = children::delete_of_parent(&self.conn, &self.tables, parent)?;
        debug!(parent, removed, "removed children");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;

    fn storage() -> ItemsStorage {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        create_tables(&conn, &StorageConfig::default()).expect("create tables");
        ItemsStorage::with_defaults(conn).expect("default config")
    }

    fn storage_with(items_list: &[Item], edges: &[(&str, &str)]) -> ItemsStorage {
        let mut storage = storage();
        for item in items_list {
            storage.add(item).expect("add item");
        }
        for (parent, child) in edges {
            storage.add_child(parent, child).expect("add child");
        }
        storage
    }

    fn chain() -> ItemsStorage {
        storage_with(
            &[Item::role("a"), Item::role("b"), Item::permission("c")],
            &[("a", "b"), ("b", "c")],
        )
    }

    #[test]
    fn new_rejects_bad_separator() {
        let conn = Connection::open_in_memory().unwrap();
        let config = StorageConfig::default().with_names_separator(" , ");
        let err = ItemsStorage::new(conn, &config).unwrap_err();
        assert_eq!(err.to_string(), "Names separator must be exactly 1 character long.");
    }

    #[test]
    fn duplicate_add_is_rejected_and_leaves_original() {
        let mut storage = storage();
        let original = Item::role("admin").with_description("first");
        storage.add(&original).unwrap();

        let err = storage
            .add(&Item::permission("admin").with_description("second"))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateName(name) if name == "admin"));
        assert_eq!(storage.get("admin").unwrap(), Some(original));
    }

    #[test]
    fn update_without_rename_keeps_edges() {
        let mut storage = chain();
        let updated = storage.get("b").unwrap().unwrap().with_description("middle");
        storage.update("b", &updated).unwrap();

        assert_eq!(storage.get("b").unwrap(), Some(updated));
        assert!(storage.has_child("a", "b").unwrap());
        assert!(storage.has_child("b", "c").unwrap());
    }

    #[test]
    fn update_rename_propagates_to_edges() {
        let mut storage = chain();
        let renamed = storage.get("b").unwrap().unwrap().with_name("bee");
        storage.update("b", &renamed).unwrap();

        assert!(storage.get("b").unwrap().is_none());
        assert!(storage.has_child("a", "bee").unwrap());
        assert!(storage.has_child("bee", "c").unwrap());
        assert!(!storage.has_child("a", "b").unwrap());
        assert_eq!(storage.edge_count().unwrap(), 2);
    }

    #[test]
    fn update_unknown_or_onto_existing_name_fails() {
        let mut storage = chain();

        let err = storage.update("ghost", &Item::role("ghost")).unwrap_err();
        assert!(matches!(err, StorageError::UnknownItem(_)));

        let err = storage.update("a", &Item::role("b")).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateName(name) if name == "b"));
        assert!(storage.has_child("a", "b").unwrap());
    }

    #[test]
    fn add_child_requires_both_items() {
        let mut storage = chain();
        let err = storage.add_child("a", "ghost").unwrap_err();
        assert!(matches!(err, StorageError::UnknownItem(name) if name == "ghost"));
        let err = storage.add_child("ghost", "a").unwrap_err();
        assert!(matches!(err, StorageError::UnknownItem(name) if name == "ghost"));
        assert_eq!(storage.edge_count().unwrap(), 2);
    }

    #[test]
    fn add_child_rejects_existing_edge_and_self_loop() {
        let mut storage = chain();

        let err = storage.add_child("a", "b").unwrap_err();
        assert!(matches!(err, StorageError::EdgeExists { .. }));

        let err = storage.add_child("a", "a").unwrap_err();
        assert!(matches!(err, StorageError::CycleDetected { .. }));
        assert_eq!(storage.edge_count().unwrap(), 2);
    }

    #[test]
    fn add_child_rejects_cycle_without_mutation() {
        let mut storage = chain();

        let err = storage.add_child("c", "a").unwrap_err();
        match err {
            StorageError::CycleDetected { parent, child, path } => {
                assert_eq!((parent.as_str(), child.as_str()), ("c", "a"));
                assert_eq!(path, ["c", "a", "b", "c"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(storage.edge_count().unwrap(), 2);
        assert!(!storage.has_child("c", "a").unwrap());
    }

    #[test]
    fn direct_and_transitive_child_checks_differ() {
        let storage = chain();
        assert!(!storage.has_child("a", "c").unwrap());
        assert!(storage.has_descendant("a", "c").unwrap());
        assert!(!storage.has_descendant("c", "a").unwrap());
        assert!(storage.has_children("a").unwrap());
        assert!(!storage.has_children("c").unwrap());
    }

    #[test]
    fn typed_accessors_filter_by_type() {
        let storage = chain();
        assert!(storage.role_exists("a").unwrap());
        assert!(!storage.role_exists("c").unwrap());
        assert!(storage.get_role("c").unwrap().is_none());
        assert!(storage.get_permission("c").unwrap().is_some());
        assert_eq!(storage.get_roles().unwrap().len(), 2);
        assert_eq!(storage.get_permissions().unwrap().len(), 1);
        assert_eq!(
            storage
                .get_roles_by_names(&["a", "c"])
                .unwrap()
                .keys()
                .collect::<Vec<_>>(),
            ["a"]
        );
        assert_eq!(
            storage
                .get_permissions_by_names(&["a", "c"])
                .unwrap()
                .keys()
                .collect::<Vec<_>>(),
            ["c"]
        );
    }

    #[test]
    fn child_closure_queries() {
        let storage = chain();
        let all = storage.get_all_children(&["a"]).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), ["b", "c"]);
        assert_eq!(
            storage.get_all_child_roles(&["a"]).unwrap().keys().collect::<Vec<_>>(),
            ["b"]
        );
        assert_eq!(
            storage
                .get_all_child_permissions(&["a"])
                .unwrap()
                .keys()
                .collect::<Vec<_>>(),
            ["c"]
        );
        assert_eq!(
            storage.get_direct_children("a").unwrap().keys().collect::<Vec<_>>(),
            ["b"]
        );
        assert_eq!(
            storage.get_all_parents("c").unwrap().keys().collect::<Vec<_>>(),
            ["a", "b"]
        );
    }

    #[test]
    fn remove_children_only_touches_direct_edges_of_parent() {
        let mut storage = chain();
        storage.remove_children("a").unwrap();
        assert!(!storage.has_children("a").unwrap());
        assert!(storage.has_child("b", "c").unwrap());
        assert_eq!(storage.get_all().unwrap().len(), 3);
    }

    #[test]
    fn into_connection_returns_live_connection() {
        let storage = chain();
        let conn = storage.into_connection();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM rbac_item", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 3);
    }
}
