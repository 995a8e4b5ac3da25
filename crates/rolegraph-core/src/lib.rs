//! SQLite-backed storage for RBAC roles and permissions.
//!
//! Items (roles and permissions) live in one table and parent → child edges
//! in another. [`storage::ItemsStorage`] keeps the edge graph acyclic,
//! cascades removals and renames to edges, and answers transitive queries
//! (all children, all parents, hierarchy views) with batched breadth-first
//! expansion.
//!
//! ```no_run
//! use rolegraph_core::{Item, ItemsStorage, ItemsStore, StorageConfig, db};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = StorageConfig::default();
//! let conn = db::open_store(std::path::Path::new("rbac.sqlite3"), &config)?;
//! let mut storage = ItemsStorage::new(conn, &config)?;
//! storage.add(&Item::role("admin"))?;
//! storage.add(&Item::permission("posts.edit"))?;
//! storage.add_child("admin", "posts.edit")?;
//! assert!(storage.has_descendant("admin", "posts.edit")?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod model;
pub mod storage;

pub use config::{StorageConfig, load_storage_config};
pub use error::{ErrorCode, StorageError, StorageResult};
pub use graph::hierarchy::{Hierarchy, HierarchyNode};
pub use model::{Item, ItemType, ParseItemTypeError};
pub use storage::{ItemsStorage, ItemsStore};
