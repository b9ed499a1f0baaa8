//! Scan rig gateway binary.
//!
//! # Usage
//!
//! ```bash
//! # In-memory settings and catalog, self-signed certificate (development)
//! scanrig-server --bind 0.0.0.0:4433
//!
//! # Persistent settings and catalog with a TLS certificate
//! scanrig-server --bind 0.0.0.0:4433 --cert cert.pem --key key.pem \
//!     --settings rig.json --catalog projects.redb
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use scanrig_server::{
    DriverConfig, Server, ServerRuntimeConfig, SystemEnv,
    catalog::{Catalog, MemoryCatalog, RedbCatalog},
    config::{ConfigStore, FileConfig, MemoryConfig},
    devices::{Rig, SimTiming},
};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Device event channel depth.
const RIG_EVENT_QUEUE: usize = 64;

/// Scan rig control gateway
#[derive(Parser, Debug)]
#[command(name = "scanrig-server")]
#[command(about = "Real-time control gateway for a 3D scanning rig")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long)]
    cert: Option<PathBuf>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long)]
    key: Option<PathBuf>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "1000")]
    max_connections: usize,

    /// Per-client outbound queue depth
    #[arg(long, default_value = "256")]
    outbound_queue: usize,

    /// Rig settings file (JSON); settings are kept in memory if omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Project catalog database; projects are kept in memory if omitted
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Interval between simulated preview frames
    #[arg(long, default_value = "500")]
    preview_interval_ms: u64,

    /// Simulated capture time per image
    #[arg(long, default_value = "200")]
    capture_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Scan rig gateway starting");
    tracing::info!("Binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind.clone(),
        cert_path: args.cert.clone(),
        key_path: args.key.clone(),
        outbound_queue: args.outbound_queue,
        driver: DriverConfig { max_connections: args.max_connections },
    };
    let timing = SimTiming {
        preview_interval: Duration::from_millis(args.preview_interval_ms),
        capture_delay: Duration::from_millis(args.capture_delay_ms),
    };

    match (&args.settings, &args.catalog) {
        (Some(settings), Some(catalog)) => {
            serve(config, timing, RedbCatalog::open(catalog)?, FileConfig::open(settings)?).await
        },
        (Some(settings), None) => {
            serve(config, timing, MemoryCatalog::new(), FileConfig::open(settings)?).await
        },
        (None, Some(catalog)) => {
            serve(config, timing, RedbCatalog::open(catalog)?, MemoryConfig::default()).await
        },
        (None, None) => serve(config, timing, MemoryCatalog::new(), MemoryConfig::default()).await,
    }
}

async fn serve<C, G>(
    config: ServerRuntimeConfig,
    timing: SimTiming,
    catalog: C,
    settings: G,
) -> Result<(), Box<dyn std::error::Error>>
where
    C: Catalog,
    G: ConfigStore,
{
    let (events_tx, events_rx) = mpsc::channel(RIG_EVENT_QUEUE);
    let rig = Rig::simulated(catalog.clone(), SystemEnv::new(), timing, events_tx);

    let server = Server::bind(config, catalog, settings, rig, events_rx)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    Ok(())
}
