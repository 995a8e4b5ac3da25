//! `rolegraph children|parents|hierarchy`: transitive queries.

use anyhow::Result;
use clap::Args;
use rolegraph_core::{Hierarchy, Item, ItemType, ItemsStore};
use std::collections::BTreeMap;

use super::StoreLocation;
use super::item::render_items;
use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ChildrenArgs {
    /// Items to expand.
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Only direct children of a single item.
    #[arg(long)]
    pub direct: bool,

    /// Only return children of this type.
    #[arg(long = "type")]
    pub item_type: Option<ItemType>,
}

#[derive(Args, Debug)]
pub struct ParentsArgs {
    pub name: String,

    /// Only return ancestors of this type.
    #[arg(long = "type")]
    pub item_type: Option<ItemType>,
}

#[derive(Args, Debug)]
pub struct HierarchyArgs {
    /// Item whose ancestors make up the view.
    pub name: String,
}

pub fn run_children(args: &ChildrenArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let storage = store.open()?;
    let names: Vec<&str> = args.names.iter().map(String::as_str).collect();

    let found = if args.direct {
        let mut direct = BTreeMap::new();
        for name in &names {
            direct.extend(storage.get_direct_children(name)?);
        }
        direct
    } else {
        match args.item_type {
            Some(ItemType::Role) => storage.get_all_child_roles(&names)?,
            Some(ItemType::Permission) => storage.get_all_child_permissions(&names)?,
            None => storage.get_all_children(&names)?,
        }
    };

    let items = filter_type(found, args.item_type);
    render_items(output, &format!("Children of {}", args.names.join(", ")), &items)
}

pub fn run_parents(args: &ParentsArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let storage = store.open()?;
    let items = filter_type(storage.get_all_parents(&args.name)?, args.item_type);
    render_items(output, &format!("Ancestors of {}", args.name), &items)
}

pub fn run_hierarchy(
    args: &HierarchyArgs,
    store: &StoreLocation,
    output: OutputMode,
) -> Result<()> {
    let storage = store.open()?;
    let hierarchy = storage.get_hierarchy(&args.name)?;

    render_mode(
        output,
        &hierarchy,
        |h, w| {
            for (name, node) in h {
                let children: Vec<&str> = node.children.keys().map(String::as_str).collect();
                writeln!(w, "{name}\t{}", children.join(","))?;
            }
            Ok(())
        },
        |h, w| {
            pretty_section(w, &format!("Hierarchy of {}", args.name))?;
            if h.is_empty() {
                return writeln!(w, "(none)");
            }
            for name in ordered_by_depth(h) {
                let node = &h[name];
                writeln!(w, "{name} ({})", node.item.item_type)?;
                for child in node.children.keys() {
                    writeln!(w, "  └─ {child}")?;
                }
            }
            pretty_rule(w)
        },
    )
}

fn filter_type(items: BTreeMap<String, Item>, item_type: Option<ItemType>) -> Vec<Item> {
    items
        .into_values()
        .filter(|item| item_type.is_none_or(|t| item.item_type == t))
        .collect()
}

/// Entries with fewer collected children first, so the root leads and the
/// topmost ancestor comes last.
fn ordered_by_depth(hierarchy: &Hierarchy) -> Vec<&str> {
    let mut names: Vec<&str> = hierarchy.keys().map(String::as_str).collect();
    names.sort_by_key(|name| (hierarchy[*name].children.len(), *name));
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegraph_core::HierarchyNode;

    fn node(item: Item, children: &[&str]) -> HierarchyNode {
        HierarchyNode {
            item,
            children: children
                .iter()
                .map(|name| ((*name).to_string(), Item::role(*name)))
                .collect(),
        }
    }

    #[test]
    fn hierarchy_is_printed_root_first() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.insert("admin".into(), node(Item::role("admin"), &["editor", "view"]));
        hierarchy.insert("editor".into(), node(Item::role("editor"), &["view"]));
        hierarchy.insert("view".into(), node(Item::permission("view"), &[]));

        assert_eq!(ordered_by_depth(&hierarchy), ["view", "editor", "admin"]);
    }

    #[test]
    fn filter_type_keeps_name_order() {
        let items = BTreeMap::from([
            ("b".to_string(), Item::role("b")),
            ("a".to_string(), Item::permission("a")),
            ("c".to_string(), Item::role("c")),
        ]);
        let roles: Vec<String> = filter_type(items.clone(), Some(ItemType::Role))
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(roles, ["b", "c"]);
        assert_eq!(filter_type(items, None).len(), 3);
    }
}
