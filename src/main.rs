use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use saas_connect::{Gateway, GatewayConfig, GatewayError, MemoryCache, serve, spawn_sweeper};

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "saas-connect", version, about = "OAuth2 gateway for SaaS integrations")]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_telemetry(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli.log_level);

    let config = GatewayConfig::from_env()?;
    let cache = MemoryCache::new();
    spawn_sweeper(cache.clone(), CACHE_SWEEP_INTERVAL);
    let gateway = Gateway::new(config, Arc::new(cache))?;

    let listener = TcpListener::bind((cli.bind.as_str(), cli.port)).await?;
    let addr = listener.local_addr()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        "saas-connect listening"
    );

    serve(gateway, listener).await
}
