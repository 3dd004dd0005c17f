//! gatesyncd — gateway synchronization daemon.
//!
//! Assembles the synchronization core around a redb state store:
//! - In-memory gateway registries
//! - Reconciling push dispatcher (logging transport)
//! - Failure outbox (commands table)
//! - Cluster distributor (distributed events table)
//!
//! # Usage
//!
//! ```text
//! gatesyncd --config gatesync.toml apply --manifest deployables.json
//! gatesyncd --config gatesync.toml import --records records.json
//! gatesyncd --config gatesync.toml refresh --plans p1,p2 --environments DEFAULT
//! gatesyncd --config gatesync.toml commands
//! ```

mod apply;
mod config;
mod manifest;
mod transport;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatesync_deployer::deployers::JsonLicenseFactory;
use gatesync_deployer::{
    ClusterDistributor, DeployerFactory, ReconcilingDispatcher, Registries, SyncCollaborators,
};
use gatesync_state::{CommandTag, StateStore};

use crate::apply::Deployers;
use crate::config::GatesyncConfig;
use crate::manifest::{Records, read_manifest};
use crate::transport::LoggingTransport;

#[derive(Parser)]
#[command(name = "gatesyncd", about = "Gateway synchronization daemon")]
struct Cli {
    /// Path to gatesync.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy or undeploy every entry of a manifest.
    Apply {
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Load raw subscription and API key records into the store.
    Import {
        #[arg(long)]
        records: PathBuf,
    },

    /// Refresh API Product subscriptions, or drop those of removed APIs.
    Refresh {
        /// Subscribable plan ids.
        #[arg(long, value_delimiter = ',', required = true)]
        plans: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        environments: Vec<String>,

        /// APIs that left the product. Switches to removal.
        #[arg(long, value_delimiter = ',')]
        removed_apis: Vec<String>,

        /// Manifest applied first, e.g. to deploy the API Products.
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// Print outbox commands as JSON lines.
    Commands {
        /// Only subscription failure commands.
        #[arg(long)]
        failures: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GatesyncConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    match cli.command {
        Command::Apply { manifest } => run_apply(&config, &manifest).await,
        Command::Import { records } => run_import(&config, &records),
        Command::Refresh {
            plans,
            environments,
            removed_apis,
            manifest,
        } => {
            run_refresh(
                &config,
                to_set(plans),
                to_set(environments),
                to_set(removed_apis),
                manifest.as_deref(),
            )
            .await
        }
        Command::Commands { failures } => run_commands(&config, failures),
    }
}

fn init_tracing(config: &GatesyncConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_filter()))
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_store(config: &GatesyncConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.store.data_dir)?;
    let db_path = config.db_path();
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(state)
}

fn build_factory(config: &GatesyncConfig, state: &StateStore) -> DeployerFactory {
    let store = Arc::new(state.clone());
    DeployerFactory::new(
        Registries::in_memory(),
        SyncCollaborators {
            distributor: Arc::new(ClusterDistributor::new(
                state.clone(),
                config.distribution.enabled,
            )),
            dispatcher: Arc::new(ReconcilingDispatcher::new(LoggingTransport)),
            command_store: store.clone(),
            subscription_store: store.clone(),
            api_key_store: store,
            license_factory: Arc::new(JsonLicenseFactory),
            node_id: config.node.id.clone(),
        },
    )
}

async fn run_apply(config: &GatesyncConfig, manifest: &Path) -> anyhow::Result<()> {
    let entries = read_manifest(manifest)?;
    let state = open_store(config)?;
    let factory = build_factory(config, &state);

    let report = Deployers::new(&factory).apply_all(&entries).await;
    println!("{}", serde_json::json!({"applied": report.applied, "failed": report.failed}));
    Ok(())
}

fn run_import(config: &GatesyncConfig, records: &Path) -> anyhow::Result<()> {
    let records = Records::from_file(records)?;
    let state = open_store(config)?;
    for record in &records.subscriptions {
        state.put_subscription(record)?;
    }
    for record in &records.api_keys {
        state.put_api_key(record)?;
    }
    info!(
        subscriptions = records.subscriptions.len(),
        api_keys = records.api_keys.len(),
        "records imported"
    );
    Ok(())
}

async fn run_refresh(
    config: &GatesyncConfig,
    plans: BTreeSet<String>,
    environments: BTreeSet<String>,
    removed_apis: BTreeSet<String>,
    manifest: Option<&Path>,
) -> anyhow::Result<()> {
    let state = open_store(config)?;
    let factory = build_factory(config, &state);
    if let Some(manifest) = manifest {
        Deployers::new(&factory)
            .apply_all(&read_manifest(manifest)?)
            .await;
    }

    let refresher = factory.create_api_product_subscription_refresher();
    let summary = if removed_apis.is_empty() {
        refresher.refresh(&plans, &environments).await?
    } else {
        refresher
            .unregister_removed_apis(&removed_apis, &plans, &environments)
            .await?
    };
    println!(
        "{}",
        serde_json::json!({"subscriptions": summary.subscriptions, "api_keys": summary.api_keys})
    );
    Ok(())
}

fn run_commands(config: &GatesyncConfig, failures: bool) -> anyhow::Result<()> {
    let state = open_store(config)?;
    let tag = failures.then_some(CommandTag::SubscriptionFailure);
    for command in state.list_commands(tag)? {
        println!("{}", serde_json::to_string(&command)?);
    }
    Ok(())
}

fn to_set(items: Vec<String>) -> BTreeSet<String> {
    items.into_iter().filter(|s| !s.is_empty()).collect()
}
