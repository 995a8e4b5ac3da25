//! `rolegraph link` and `rolegraph unlink`: parent → child edges.

use anyhow::Result;
use clap::Args;
use rolegraph_core::ItemsStore;
use serde::Serialize;

use super::StoreLocation;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Parent item (the one that grants).
    pub parent: String,

    /// Child item (the one granted).
    pub child: String,
}

#[derive(Args, Debug)]
pub struct UnlinkArgs {
    pub parent: String,

    /// Child to detach. Required unless `--all` is given.
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub child: Option<String>,

    /// Detach every direct child of the parent.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct LinkResult<'a> {
    action: &'a str,
    parent: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    child: Option<&'a str>,
}

pub fn run_link(args: &LinkArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let mut storage = store.open()?;
    storage.add_child(&args.parent, &args.child)?;

    let result = LinkResult {
        action: "linked",
        parent: &args.parent,
        child: Some(&args.child),
    };
    render(output, &result, |r, w| {
        writeln!(w, "linked {} -> {}", r.parent, r.child.unwrap_or_default())
    })
}

pub fn run_unlink(args: &UnlinkArgs, store: &StoreLocation, output: OutputMode) -> Result<()> {
    let mut storage = store.open()?;
    match args.child.as_deref() {
        Some(child) if !args.all => storage.remove_child(&args.parent, child)?,
        _ => storage.remove_children(&args.parent)?,
    }

    let result = LinkResult {
        action: "unlinked",
        parent: &args.parent,
        child: args.child.as_deref(),
    };
    render(output, &result, |r, w| match r.child {
        Some(child) => writeln!(w, "unlinked {} -> {child}", r.parent),
        None => writeln!(w, "unlinked all children of {}", r.parent),
    })
}
