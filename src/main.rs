//! `netaware`: inspect and operate the persisted connection-health state,
//! and run resilient fetches from the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use netaware::config::{load_config, NetawareConfig};
use netaware::health::{PlatformSnapshot, SimulatedNetwork};
use netaware::http::HttpResource;
use netaware::lifecycle::{wait_for_signal, Supervisor};
use netaware::mutation::outbox;
use netaware::observability::{logging, metrics};
use netaware::storage::{keys, FileStore, MemoryStore, StateStore};
use netaware::{
    ConnectionHealthTracker, MemoryCache, OfflineBehavior, QueryExecutor, QueryPolicy, SystemClock,
};

#[derive(Parser)]
#[command(name = "netaware")]
#[command(about = "Network-aware data access toolkit", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON state file; overrides `storage.path`.
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Treat the platform as offline.
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the connection health of a domain
    Status {
        #[arg(short, long)]
        domain: String,
    },
    /// List queued offline mutations
    Queue {
        #[arg(short, long)]
        domain: String,
        #[arg(short, long, default_value = "POST")]
        method: String,
    },
    /// Re-enable live calls for a domain
    Enable {
        #[arg(short, long)]
        domain: String,
    },
    /// Suspend live calls for a domain
    Disable {
        #[arg(short, long)]
        domain: String,
    },
    /// Fetch a resource through the health gate
    Fetch {
        #[arg(short, long)]
        domain: String,
        /// Base URL of the API.
        #[arg(short, long)]
        url: String,
        /// Path under the base URL.
        #[arg(short, long, default_value = "")]
        path: String,
        /// Return an empty offline result instead of failing.
        #[arg(long)]
        silent: bool,
    },
    /// Monitor a domain until interrupted
    Watch {
        #[arg(short, long)]
        domain: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => NetawareConfig::default(),
    };
    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = open_store(&cli, &config)?;
    let network = if cli.offline {
        SimulatedNetwork::offline()
    } else {
        SimulatedNetwork::new(PlatformSnapshot::default())
    };
    let tracker_for = |domain: &str| {
        Arc::new(ConnectionHealthTracker::new(
            domain,
            config.health.clone(),
            Arc::new(network.clone()),
            store.clone(),
            Arc::new(SystemClock),
        ))
    };

    match cli.command {
        Commands::Status { domain } => {
            let tracker = tracker_for(&domain);
            let health = tracker.check_connection();
            let report = json!({
                "health": health,
                "should_use_fallback": tracker.should_use_fallback(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Queue { domain, method } => {
            let entries: Vec<outbox::QueuedMutation<Value>> =
                outbox::load(store.as_ref(), &keys::offline_mutations(&domain, &method));
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Enable { domain } => {
            tracker_for(&domain).enable_api_calls();
            println!("API calls enabled for '{domain}'");
        }
        Commands::Disable { domain } => {
            tracker_for(&domain).disable_api_calls();
            println!("API calls disabled for '{domain}'");
        }
        Commands::Fetch {
            domain,
            url,
            path,
            silent,
        } => {
            let resource = HttpResource::new(&url)?;
            let executor = QueryExecutor::new(
                tracker_for(&domain),
                Arc::new(MemoryCache::new()),
                Arc::new(SystemClock),
            );
            let mut policy: QueryPolicy<Value> = QueryPolicy::from_config(&config.query);
            if silent {
                policy = policy.offline_behavior(OfflineBehavior::Silent);
            }

            let key = format!("{domain}/{path}");
            let result = executor
                .execute(&key, path.as_str(), |p| resource.get::<Value>(p), &policy)
                .await?;
            let report = json!({
                "data": result.data,
                "meta": result.meta,
                "source": result.source,
                "is_offline_data": result.is_offline_data,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Watch { domain } => {
            let tracker = tracker_for(&domain);
            let mut supervisor = Supervisor::new();
            supervisor.spawn_monitor(tracker.clone());

            tracing::info!(domain = %domain, "Watching connection health, Ctrl+C to stop");
            wait_for_signal().await;
            supervisor.shutdown(Duration::from_secs(5)).await;

            let health = tracker.snapshot();
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}

fn open_store(
    cli: &Cli,
    config: &NetawareConfig,
) -> Result<Arc<dyn StateStore>, Box<dyn std::error::Error>> {
    let path = cli
        .state
        .clone()
        .or_else(|| config.storage.path.as_ref().map(PathBuf::from));

    match path {
        Some(path) => Ok(Arc::new(FileStore::open(path)?)),
        None => {
            tracing::warn!("No state file configured, using an in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
