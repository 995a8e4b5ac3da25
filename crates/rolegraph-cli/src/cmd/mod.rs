pub mod init;
pub mod item;
pub mod link;
pub mod traverse;

use anyhow::{Context as _, Result};
use rolegraph_core::{ItemsStorage, StorageConfig, db, load_storage_config};
use std::path::{Path, PathBuf};

/// Where the store lives and how its tables are named.
#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub db: PathBuf,
    pub config: Option<PathBuf>,
}

impl StoreLocation {
    pub fn load_config(&self) -> Result<StorageConfig> {
        match &self.config {
            Some(path) => load_storage_config(path),
            None => Ok(StorageConfig::default()),
        }
    }

    /// Open the store, creating the database file and tables if needed.
    pub fn open_or_create(&self) -> Result<(ItemsStorage, StorageConfig)> {
        let config = self.load_config()?;
        let conn = db::open_store(&self.db, &config)?;
        let storage = ItemsStorage::new(conn, &config)?;
        Ok((storage, config))
    }

    /// Open an existing store. Fails with a hint when the database is missing.
    pub fn open(&self) -> Result<ItemsStorage> {
        if !self.db.exists() {
            anyhow::bail!(
                "store not found at {}.\n  Run `rolegraph init` to create it.",
                self.db.display()
            );
        }
        let (storage, _) = self
            .open_or_create()
            .with_context(|| format!("open store {}", self.db.display()))?;
        Ok(storage)
    }

    pub fn db_path(&self) -> &Path {
        &self.db
    }
}
