//! Tree Dump Binary
//!
//! Opens a menu database, optionally seeds a demo menu, and prints the tree
//! (or the flat listing) as pretty JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Active tree from the default database
//! cargo run -p menutree-dev-tools --bin tree-dump
//!
//! # Seed a demo menu into an empty database, print everything
//! MENUTREE_DB_PATH=/tmp/menus.db cargo run -p menutree-dev-tools --bin tree-dump -- --seed --all
//! ```
//!
//! # Flags
//!
//! - `--seed`: Insert a demo menu if the database is empty
//! - `--all`: Include inactive nodes
//! - `--flat`: Print the flat listing instead of the nested tree
//!
//! # Environment Variables
//!
//! - `MENUTREE_DB_PATH`: Database file (default: `./data/menutree.db`)
//! - `MENUTREE_MAX_DEPTH`, `MENUTREE_MAX_SORT`: Structural limits
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use menutree_core::db::{DatabaseService, NodeStore, TursoStore};
use menutree_core::models::NewNode;
use menutree_core::{NodeService, TreeConfig};

const DEFAULT_DB_PATH: &str = "./data/menutree.db";

#[derive(Debug, Default)]
struct Options {
    seed: bool,
    all: bool,
    flat: bool,
}

fn parse_options() -> anyhow::Result<Options> {
    let mut options = Options::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--seed" => options.seed = true,
            "--all" => options.all = true,
            "--flat" => options.flat = true,
            other => anyhow::bail!("Unknown argument: {} (expected --seed, --all, --flat)", other),
        }
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let options = parse_options()?;

    let db_path: PathBuf = env::var("MENUTREE_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));
    let config = TreeConfig::from_env();

    tracing::info!(
        db = %db_path.display(),
        max_depth = config.max_depth,
        max_sort = config.max_sort,
        "Opening menu database"
    );

    let db = Arc::new(DatabaseService::new(db_path).await?);
    let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db));
    let service = NodeService::new(store, config)?;

    if options.seed {
        if service.list_nodes(false).await?.is_empty() {
            seed_demo_menu(&service).await?;
        } else {
            tracing::info!("Database not empty, skipping seed");
        }
    }

    let output = if options.flat {
        serde_json::to_string_pretty(&service.list_nodes(!options.all).await?)?
    } else if options.all {
        serde_json::to_string_pretty(&service.get_full_tree().await?)?
    } else {
        serde_json::to_string_pretty(&service.get_tree().await?)?
    };
    println!("{}", output);

    Ok(())
}

async fn seed_demo_menu(service: &NodeService) -> anyhow::Result<()> {
    let dashboard = NewNode::new("Dashboard")
        .with_code("dashboard")
        .with_route("/dashboard")
        .with_icon("gauge");
    service.create_node(dashboard).await?;

    let system = service
        .create_node(
            NewNode::new("System")
                .with_sort(10)
                .with_code("system")
                .with_icon("settings"),
        )
        .await?;
    for (sort, name, route) in [
        (0, "Users", "/system/users"),
        (1, "Roles", "/system/roles"),
        (2, "Menus", "/system/menus"),
    ] {
        service
            .create_node(
                NewNode::new(name)
                    .with_parent(system.id)
                    .with_sort(sort)
                    .with_route(route),
            )
            .await?;
    }

    let reports = service
        .create_node(
            NewNode::new("Reports")
                .with_sort(20)
                .with_code("reports")
                .inactive(),
        )
        .await?;
    service
        .create_node(
            NewNode::new("Monthly")
                .with_parent(reports.id)
                .with_route("/reports/monthly"),
        )
        .await?;

    tracing::info!("Seeded demo menu");
    Ok(())
}
