//! Lookout Binary Entry Point
//!
//! Inspects the sessions a host application flushed into durable storage.
//! Core functionality is provided by the `lookout` library crate.

use clap::{Parser, Subcommand};
use lookout::{
    config::{DebugConfig, StorageDriver},
    storage::{RecordKind, StorageBackend},
};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Lookout - Runtime Diagnostics Collector
#[derive(Parser, Debug)]
#[command(name = "lookout", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/lookout.yaml",
        env = "LOOKOUT_CONFIG"
    )]
    config: String,

    /// Storage path (overrides config file)
    #[arg(long, env = "LOOKOUT_STORAGE_PATH")]
    storage_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List flushed sessions, oldest first
    List,

    /// Print one session record as JSON
    Show {
        /// Debugger id of the session
        id: String,

        /// Record kind
        #[arg(long, default_value = "data")]
        kind: RecordKind,
    },

    /// Delete all but the newest sessions
    Prune {
        /// Sessions to keep (default: storage.history_size)
        #[arg(long)]
        keep: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lookout=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    tracing::debug!("Loading configuration from: {}", cli.config);
    let mut config = DebugConfig::load(&cli.config)?;
    if let Some(path) = cli.storage_path {
        config.storage.path = Some(path);
        config.validate()?;
    }

    if config.storage.driver == StorageDriver::Memory {
        tracing::warn!("Memory storage keeps nothing between processes; configure file or duckdb");
    }

    let backend = StorageBackend::from_config(&config.storage)?;

    match cli.command {
        Command::List => {
            for (id, summary) in backend.read(RecordKind::Summary)? {
                let collectors = summary
                    .get("collectors")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .unwrap_or_default();
                println!("{id}\t{collectors}");
            }
        }
        Command::Show { id, kind } => {
            let mut records = backend.read(kind)?;
            let record = records
                .remove(&id)
                .ok_or_else(|| format!("no {kind} record for session '{id}'"))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Prune { keep } => {
            let keep = keep.unwrap_or(config.storage.history_size);
            let removed = backend.prune(keep)?;
            tracing::info!(removed, keep, "Sessions pruned");
        }
    }

    Ok(())
}
