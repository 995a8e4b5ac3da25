#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::StoreLocation;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rolegraph: RBAC role and permission hierarchy store",
    long_about = None
)]
struct Cli {
    /// Path to the SQLite store.
    #[arg(long, global = true, env = "ROLEGRAPH_DB", default_value = "rolegraph.sqlite3")]
    db: PathBuf,

    /// TOML file with table names and the names separator.
    #[arg(long, global = true, env = "ROLEGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }

    fn store(&self) -> StoreLocation {
        StoreLocation {
            db: self.db.clone(),
            config: self.config.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Store",
        about = "Create the store",
        long_about = "Create the SQLite store and its items tables. Safe to re-run.",
        after_help = "EXAMPLES:\n    # Create ./rolegraph.sqlite3\n    rolegraph init\n\n    # Use custom table names\n    rolegraph --config rbac.toml --db var/rbac.sqlite3 init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Items",
        about = "Add a role or permission",
        after_help = "EXAMPLES:\n    # Add a role\n    rolegraph add role posts.admin --description \"Manages posts\"\n\n    # Add a permission with a data payload\n    rolegraph add permission posts.edit --data '{\"max\": 10}'"
    )]
    Add(cmd::item::AddArgs),

    #[command(
        next_help_heading = "Items",
        about = "Remove an item and its links",
        after_help = "EXAMPLES:\n    rolegraph rm posts.editor"
    )]
    Rm(cmd::item::RmArgs),

    #[command(
        next_help_heading = "Items",
        about = "Rename an item",
        long_about = "Rename an item. Every link that references it follows the new name.",
        after_help = "EXAMPLES:\n    rolegraph rename posts.redactor posts.editor"
    )]
    Rename(cmd::item::RenameArgs),

    #[command(
        next_help_heading = "Items",
        about = "Show one item",
        after_help = "EXAMPLES:\n    rolegraph show posts.admin\n\n    # Emit machine-readable output\n    rolegraph show posts.admin --json"
    )]
    Show(cmd::item::ShowArgs),

    #[command(
        next_help_heading = "Items",
        about = "List items",
        after_help = "EXAMPLES:\n    # Everything\n    rolegraph list\n\n    # Only roles\n    rolegraph list --type role"
    )]
    List(cmd::item::ListArgs),

    #[command(
        next_help_heading = "Items",
        about = "Delete all items, or all items of one type",
        after_help = "EXAMPLES:\n    # Drop every permission and the links touching them\n    rolegraph clear --type permission --yes"
    )]
    Clear(cmd::item::ClearArgs),

    #[command(
        next_help_heading = "Links",
        about = "Attach a child to a parent",
        long_about = "Attach a child item to a parent. Links that would close a cycle are rejected.",
        after_help = "EXAMPLES:\n    rolegraph link posts.admin posts.edit"
    )]
    Link(cmd::link::LinkArgs),

    #[command(
        next_help_heading = "Links",
        about = "Detach a child from a parent",
        after_help = "EXAMPLES:\n    rolegraph unlink posts.admin posts.edit\n\n    # Detach every direct child\n    rolegraph unlink posts.admin --all"
    )]
    Unlink(cmd::link::UnlinkArgs),

    #[command(
        next_help_heading = "Traversal",
        about = "List every item below the given items",
        after_help = "EXAMPLES:\n    rolegraph children posts.admin\n\n    # Only permissions, merged over two roots\n    rolegraph children posts.admin users.admin --type permission"
    )]
    Children(cmd::traverse::ChildrenArgs),

    #[command(
        next_help_heading = "Traversal",
        about = "List every item above the given item",
        after_help = "EXAMPLES:\n    rolegraph parents posts.view --type role"
    )]
    Parents(cmd::traverse::ParentsArgs),

    #[command(
        next_help_heading = "Traversal",
        about = "Show the ancestor hierarchy of an item",
        long_about = "Show an item and all of its ancestors, each with every collected item below it.",
        after_help = "EXAMPLES:\n    rolegraph hierarchy posts.view --json"
    )]
    Hierarchy(cmd::traverse::HierarchyArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ROLEGRAPH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "rolegraph_core=debug,rolegraph=debug,info"
        } else {
            "rolegraph_core=info,rolegraph=info,warn"
        })
    });

    let format = env::var("ROLEGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let store = cli.store();
    debug!(db = %store.db.display(), command = ?cli.command, "running command");

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &store, output),
        Commands::Add(args) => cmd::item::run_add(args, &store, output),
        Commands::Rm(args) => cmd::item::run_rm(args, &store, output),
        Commands::Rename(args) => cmd::item::run_rename(args, &store, output),
        Commands::Show(args) => cmd::item::run_show(args, &store, output),
        Commands::List(args) => cmd::item::run_list(args, &store, output),
        Commands::Clear(args) => cmd::item::run_clear(args, &store, output),
        Commands::Link(args) => cmd::link::run_link(args, &store, output),
        Commands::Unlink(args) => cmd::link::run_unlink(args, &store, output),
        Commands::Children(args) => cmd::traverse::run_children(args, &store, output),
        Commands::Parents(args) => cmd::traverse::run_parents(args, &store, output),
        Commands::Hierarchy(args) => cmd::traverse::run_hierarchy(args, &store, output),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();

    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Err(render_err) = render_error(output, &CliError::from_anyhow(&err)) {
                eprintln!("error: {err:#} ({render_err})");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["rolegraph", "list", "--json", "--db", "x.sqlite3"]);
        assert!(cli.json);
        assert_eq!(cli.db, PathBuf::from("x.sqlite3"));
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn add_parses_item_type() {
        let cli = Cli::parse_from(["rolegraph", "add", "Permission", "posts.edit"]);
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.item_type, rolegraph_core::ItemType::Permission);
                assert_eq!(args.name, "posts.edit");
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn unlink_requires_child_or_all() {
        assert!(Cli::try_parse_from(["rolegraph", "unlink", "admin"]).is_err());
        assert!(Cli::try_parse_from(["rolegraph", "unlink", "admin", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["rolegraph", "unlink", "admin", "view", "--all"]).is_err());
    }
}
