//! Drives a capability registry from the command line and prints JSON.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use capability_domain::build_registry;
use capability_domain::config::ServerConfig;
use capability_domain::kernel::{CapabilityRegistry, SchedulerConfig, TaskScheduler};
use capability_domain::primitives::InvocationItem;
use capability_domain::telemetry::tracing_support;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "capability-cli")]
#[command(about = "List, describe and execute capabilities from a domains directory")]
struct Args {
    /// Domains directory holding `skills/` and `mcps/`; overrides DOMAINS_PATH.
    #[arg(long, value_name = "PATH")]
    domains: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the capability catalog.
    List {
        /// Print name/description pairs as JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },
    /// Print detail records for the given names.
    Describe {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Execute a JSON array of `{"name": ..., "input": ...}` items.
    Execute {
        items: String,
        /// Run up to N items at once instead of one at a time.
        #[arg(long, value_name = "N")]
        concurrency: Option<NonZeroUsize>,
    },
    /// Reload procedures and rediscover tools.
    Refresh,
    /// Print procedure, tool and backend counts.
    Stats,
    /// List files in the code runner scratch directory.
    Files,
    /// Print the resolved server settings, listener included.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_support::init(&args.log);

    let mut config = ServerConfig::from_env().context("reading configuration")?;
    if let Some(domains) = args.domains {
        config = config.with_domains_path(domains);
    }
    config.validate()?;
    info!(
        domains = %config.domains_path().display(),
        mode = %config.mode(),
        listen = %config.listen_address(),
        "starting capability cli"
    );

    let registry = Arc::new(build_registry(&config));
    run(&config, &registry, args.command).await
}

async fn run(config: &ServerConfig, registry: &Arc<CapabilityRegistry>, command: Command) -> Result<()> {
    match command {
        Command::List { json: false } => {
            print!("{}", registry.list_capabilities().await?);
        }
        Command::List { json: true } => print_json(&registry.entries().await?)?,
        Command::Describe { names } => print_json(&registry.describe(names.as_slice()).await?)?,
        Command::Execute { items, concurrency } => {
            let items: Vec<InvocationItem> =
                serde_json::from_str(&items).context("items must be a JSON array of {name, input}")?;
            if items.is_empty() {
                bail!("no items to execute");
            }
            let results = match concurrency {
                Some(limit) => {
                    let scheduler = TaskScheduler::new(SchedulerConfig::new(limit));
                    registry.execute_batch_concurrent(items, &scheduler).await?
                }
                None => registry.execute_batch(&items).await?,
            };
            print_json(&results)?;
        }
        Command::Refresh => {
            registry.refresh().await?;
            print_json(&serde_json::json!({"success": true}))?;
        }
        Command::Stats => print_json(&registry.stats().await?)?,
        Command::Files => print_json(&registry.runner().list_artifacts().await?)?,
        Command::Config => print_json(&serde_json::json!({
            "listenAddress": config.listen_address(),
            "settings": config,
        }))?,
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
