use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use walletgate_core::hub::MemoryHub;
use walletgate_core::keys::Seed;
use walletgate_core::manifest::StaticManifests;
use walletgate_core::registry::MemoryRegistry;
use walletgate_core::{init_logging, Broker, BrokerConfig, BrokerServer, LogLevel, TransitKeys};

#[derive(Parser, Debug)]
#[command(name = "walletgate")]
#[command(author, version, about = "Local authentication broker for decentralized-identity sign-in", long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Bind address for the HTTP surface (overrides WALLETGATE_BIND_ADDRESS)
    #[arg(short, long)]
    bind: Option<String>,

    /// Read the wallet mnemonic from this file instead of WALLETGATE_MNEMONIC
    #[arg(long)]
    mnemonic_file: Option<String>,
}

fn load_mnemonic(args: &Args) -> Result<String> {
    if let Some(path) = &args.mnemonic_file {
        let phrase = std::fs::read_to_string(path)
            .with_context(|| format!("reading mnemonic file {}", path))?;
        return Ok(phrase.trim().to_string());
    }
    std::env::var("WALLETGATE_MNEMONIC")
        .map(|p| p.trim().to_string())
        .map_err(|_| anyhow!("no mnemonic: set WALLETGATE_MNEMONIC or pass --mnemonic-file"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = LogLevel::parse(&args.log_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        LogLevel::Info
    });
    init_logging(log_level).map_err(|e| anyhow!(e))?;

    let mut config = BrokerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;
    if let Some(bind) = &args.bind {
        config.bind_address = bind.parse().context("parsing --bind address")?;
    }

    let phrase = load_mnemonic(&args)?;
    let seed = Seed::from_mnemonic(&phrase).map_err(|e| anyhow!(e.to_string()))?;

    // Transit keys live for the whole process; handlers only ever see them
    // through the broker.
    let transit = Arc::new(TransitKeys::generate());

    // Local mode: in-memory collaborators. Production registry and hub
    // services are external and plug in through the same traits.
    let registry = Arc::new(MemoryRegistry::new());
    let hub = Arc::new(MemoryHub::new("https://hub.localhost/store/"));
    let manifests = Arc::new(StaticManifests::permissive());

    info!("walletgate starting in local mode");
    let broker = Arc::new(Broker::new(seed, transit, registry, hub, manifests, config));
    BrokerServer::new(broker).run().await
}
