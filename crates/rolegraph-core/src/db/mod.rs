//! SQLite database utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` to allow concurrent readers while a writer commits
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `synchronous = NORMAL`, durable enough under WAL

pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

use crate::config::StorageConfig;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the store database, apply runtime pragmas, and create
/// the items tables named by `config`.
///
/// # Errors
///
/// Returns an error if opening/configuring the database or creating the
/// tables fails.
pub fn open_store(path: &Path, config: &StorageConfig) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let conn =
        Connection::open(path).with_context(|| format!("open store database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    schema::create_tables(&conn, config).context("create rbac tables")?;

    Ok(conn)
}

/// Upper bound on bound parameters per `IN (...)` batch.
pub(crate) const MAX_BATCH_PARAMS: usize = 500;

/// Render `?1, ?2, ..., ?n` for an `IN (...)` list.
pub(crate) fn placeholders(count: usize) -> String {
    placeholders_from(1, count)
}

/// Render `count` numbered placeholders starting at `?first`.
pub(crate) fn placeholders_from(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
