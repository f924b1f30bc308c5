use anyhow::{Context, Result};
use bookstore_server::{
    InventoryEngine, LocalTransport, MasterBookStore, ReplicaStore, ReplicationCoordinator,
    ServerConfig, Transport,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bookstore-server")]
#[command(about = "Book inventory master with in-process read replicas", long_about = None)]
struct Args {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_logging(config: &ServerConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    match config.logging.format.as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    init_logging(&config);
    info!("Starting Bookstore Server v{}", env!("CARGO_PKG_VERSION"));

    let inventory = config.to_inventory_config();
    let replication = config.to_replication_config();

    // Every slave gets its own engine with the master's locking strategy
    let slaves: Vec<Arc<dyn Transport>> = replication
        .active_slaves()
        .iter()
        .map(|endpoint| {
            let replica = Arc::new(ReplicaStore::new(Arc::new(InventoryEngine::from_config(
                &inventory,
            ))));
            Arc::new(LocalTransport::new(endpoint.clone(), replica)) as Arc<dyn Transport>
        })
        .collect();

    let coordinator = Arc::new(ReplicationCoordinator::new(
        replication.max_replicator_threads,
        slaves,
    )?);
    let master = MasterBookStore::new(
        Arc::new(InventoryEngine::from_config(&inventory)),
        coordinator,
    );

    info!(
        "Master ready ({:?} locking, slaves: {:?})",
        inventory.locking,
        master.coordinator().active_slaves()
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutting down");
    master.shutdown();

    Ok(())
}
