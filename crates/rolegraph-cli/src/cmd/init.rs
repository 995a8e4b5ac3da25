use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::StoreLocation;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {}

#[derive(Debug, Serialize)]
struct InitReport {
    db: String,
    items_table: String,
    items_children_table: String,
    names_separator: String,
    items: usize,
}

/// Execute `rolegraph init`: create the database file and both tables.
/// Running it against an existing store is harmless.
pub fn run_init(_args: &InitArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let (storage, config) = store.open_or_create()?;
    let items = rolegraph_core::ItemsStore::get_all(&storage)?.len();
    info!(db = %store.db_path().display(), items, "store ready");

    let report = InitReport {
        db: store.db_path().display().to_string(),
        items_table: config.items_table,
        items_children_table: config.items_children_table,
        names_separator: config.names_separator,
        items,
    };

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "initialized {} ({} items)", r.db, r.items),
        |r, w| {
            pretty_section(w, "Store initialized")?;
            pretty_kv(w, "database", &r.db)?;
            pretty_kv(w, "items", &r.items_table)?;
            pretty_kv(w, "children", &r.items_children_table)?;
            pretty_kv(w, "separator", &r.names_separator)?;
            pretty_kv(w, "item count", r.items.to_string())
        },
    )
}
