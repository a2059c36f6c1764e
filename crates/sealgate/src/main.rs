//! sealgate: threshold-encryption gateway
//!
//! Usage:
//!   sealgate [--config sealgate.toml] [--mode gateway|key-server]
//!
//! Modes:
//!   gateway     - HTTP upload/download front end [default]
//!   key-server  - one key server evaluating policy on its own ledger view

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use sealgate::{Config, Gateway};
use sealgate_keyserver::KeyServer;

#[derive(Parser, Debug)]
#[command(name = "sealgate", version, about = "Threshold-encryption gateway")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', env = "SEALGATE_CONFIG", default_value = "sealgate.toml")]
    config: PathBuf,

    /// What to run
    #[arg(long, default_value = "gateway")]
    mode: Mode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SEALGATE_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "SEALGATE_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Listen address, overriding the configuration
    #[arg(long)]
    listen: Option<String>,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum Mode {
    /// HTTP gateway (default)
    Gateway,
    /// Key server
    KeyServer,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log, &cli.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?cli.mode,
        config = %cli.config.display(),
        "sealgate starting"
    );

    let mut config = load_config(&cli.config).await?;
    config.apply_env();

    match cli.mode {
        Mode::Gateway => run_gateway(config, cli.listen).await,
        Mode::KeyServer => run_key_server(config, cli.listen).await,
    }
}

async fn run_gateway(config: Config, listen: Option<String>) -> Result<()> {
    let gateway = Gateway::from_config(&config).await?;
    info!(
        namespace = %gateway.settings().namespace,
        address = %gateway.address(),
        "gateway ready"
    );

    let clock = gateway.start_epoch_clock(config.epoch_period()?).await?;

    let addr = listen.unwrap_or_else(|| config.gateway.listen.clone());
    let served = sealgate::serve(&addr, Arc::new(gateway))
        .await
        .map_err(|e| anyhow::anyhow!("serving on {addr}: {e}"));
    clock.abort();
    served
}

async fn run_key_server(config: Config, listen: Option<String>) -> Result<()> {
    config.validate_key_server()?;

    let ledger = Arc::new(config.ledger()?);
    let server = config.key_server(ledger)?;
    let info = server.service_info().await?;
    info!(
        server = %info.server_id,
        public_key = %info.public_key.to_hex(),
        network = %info.network,
        "key server ready"
    );

    let addr = listen.unwrap_or_else(|| config.key_server.listen.clone());
    sealgate_keyserver::serve(&addr, Arc::new(server))
        .await
        .map_err(|e| anyhow::anyhow!("serving on {addr}: {e}"))
}

async fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        Config::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
    } else {
        warn!("config file not found: {}  (using defaults)", path.display());
        Ok(Config::default())
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
