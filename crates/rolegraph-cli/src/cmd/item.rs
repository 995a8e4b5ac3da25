//! `rolegraph add|rm|rename|show|list|clear`: item CRUD.

use anyhow::{Context as _, Result};
use clap::Args;
use rolegraph_core::{Item, ItemType, ItemsStore, StorageError};
use serde::Serialize;
use std::io::{self, Write};

use super::StoreLocation;
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render, render_mode};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Item type: `role` or `permission`.
    pub item_type: ItemType,

    /// Unique item name.
    pub name: String,

    /// Free-form description.
    #[arg(long)]
    pub description: Option<String>,

    /// Name of the rule attached to the item.
    #[arg(long)]
    pub rule_name: Option<String>,

    /// Arbitrary JSON payload stored with the item.
    #[arg(long)]
    pub data: Option<String>,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Item to remove, together with every link touching it.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Current item name.
    pub name: String,

    /// New item name. Links follow the rename.
    pub new_name: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list items of this type.
    #[arg(long = "type")]
    pub item_type: Option<ItemType>,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Only clear items of this type (and links touching them).
    #[arg(long = "type")]
    pub item_type: Option<ItemType>,

    /// Confirm the deletion.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Serialize)]
struct Mutation<'a> {
    action: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ItemDetail {
    #[serde(flatten)]
    item: Item,
    children: Vec<String>,
    parents: Vec<String>,
}

pub fn run_add(args: &AddArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let mut storage = store.open()?;

    let mut item = Item::new(args.item_type, &args.name);
    if let Some(description) = &args.description {
        item = item.with_description(description);
    }
    if let Some(rule_name) = &args.rule_name {
        item = item.with_rule_name(rule_name);
    }
    if let Some(data) = &args.data {
        let value = serde_json::from_str(data).context("--data must be valid JSON")?;
        item = item.with_data(value);
    }

    storage.add(&item)?;

    render(output, &item, |item, w| {
        writeln!(w, "added {} {}", item.item_type, item.name)
    })
}

pub fn run_rm(args: &RmArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let mut storage = store.open()?;
    if !storage.exists(&args.name)? {
        return Err(StorageError::UnknownItem(args.name.clone()).into());
    }
    storage.remove(&args.name)?;

    let result = Mutation {
        action: "removed",
        name: &args.name,
        new_name: None,
    };
    render(output, &result, |r, w| writeln!(w, "removed {}", r.name))
}

pub fn run_rename(args: &RenameArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let mut storage = store.open()?;
    let item = storage
        .get(&args.name)?
        .ok_or_else(|| StorageError::UnknownItem(args.name.clone()))?;

    let renamed = item
        .with_name(&args.new_name)
        .with_updated_at(chrono::Utc::now().timestamp());
    storage.update(&args.name, &renamed)?;

    let result = Mutation {
        action: "renamed",
        name: &args.name,
        new_name: Some(&args.new_name),
    };
    render(output, &result, |r, w| {
        writeln!(w, "renamed {} -> {}", r.name, r.new_name.unwrap_or_default())
    })
}

pub fn run_show(args: &ShowArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let storage = store.open()?;
    let item = storage
        .get(&args.name)?
        .ok_or_else(|| StorageError::UnknownItem(args.name.clone()))?;

    let detail = ItemDetail {
        children: storage
            .get_direct_children(&args.name)?
            .into_keys()
            .collect(),
        parents: storage.get_all_parents(&args.name)?.into_keys().collect(),
        item,
    };

    render_mode(
        output,
        &detail,
        |d, w| {
            writeln!(w, "{}", item_line(&d.item))?;
            writeln!(w, "children\t{}", d.children.join(","))?;
            writeln!(w, "parents\t{}", d.parents.join(","))
        },
        |d, w| {
            pretty_section(w, &d.item.name)?;
            write_item_details(w, &d.item)?;
            pretty_kv(w, "children", names_or_dash(&d.children))?;
            pretty_kv(w, "ancestors", names_or_dash(&d.parents))
        },
    )
}

pub fn run_list(args: &ListArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let storage = store.open()?;
    let items = match args.item_type {
        Some(item_type) => storage.get_by_type(item_type)?,
        None => storage.get_all()?,
    };
    render_items(output, "Items", &items)
}

pub fn run_clear(args: &ClearArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    if !args.yes {
        anyhow::bail!("refusing to clear without --yes");
    }

    let mut storage = store.open()?;
    let before = match args.item_type {
        Some(item_type) => storage.get_by_type(item_type)?.len(),
        None => storage.get_all()?.len(),
    };
    match args.item_type {
        Some(item_type) => storage.clear_by_type(item_type)?,
        None => storage.clear()?,
    }

    let result = serde_json::json!({
        "action": "cleared",
        "type": args.item_type,
        "removed": before,
    });
    render(output, &result, |_, w| writeln!(w, "cleared {before} items"))
}

/// Render a list of items: JSON array, one line per item, or a table.
pub fn render_items(output: OutputMode, heading: &str, items: &[Item]) -> Result<()> {
    render_mode(
        output,
        &items,
        |items, w| {
            for item in *items {
                writeln!(w, "{}", item_line(item))?;
            }
            Ok(())
        },
        |items, w| {
            pretty_section(w, &format!("{heading} ({})", items.len()))?;
            if items.is_empty() {
                return writeln!(w, "(none)");
            }
            for item in *items {
                writeln!(
                    w,
                    "{:<11} {:<32} {}",
                    item.item_type.as_str(),
                    item.name,
                    item.description.as_deref().unwrap_or("")
                )?;
            }
            Ok(())
        },
    )
}

fn item_line(item: &Item) -> String {
    format!(
        "{}\t{}\t{}",
        item.name,
        item.item_type,
        item.description.as_deref().unwrap_or("")
    )
}

fn write_item_details(w: &mut dyn Write, item: &Item) -> io::Result<()> {
    pretty_kv(w, "type", item.item_type.as_str())?;
    if let Some(description) = &item.description {
        pretty_kv(w, "description", description)?;
    }
    if let Some(rule_name) = &item.rule_name {
        pretty_kv(w, "rule", rule_name)?;
    }
    if let Some(data) = &item.data {
        pretty_kv(w, "data", data.to_string())?;
    }
    pretty_kv(w, "created", format_timestamp(item.created_at))?;
    pretty_kv(w, "updated", format_timestamp(item.updated_at))?;
    pretty_rule(w)
}

fn names_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

fn format_timestamp(seconds: i64) -> String {
    chrono::DateTime::from_timestamp(seconds, 0)
        .map_or_else(|| seconds.to_string(), |dt| dt.to_rfc3339())
}
