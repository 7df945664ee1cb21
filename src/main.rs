//! Matchwire worker entrypoint
//!
//! One process per worker; run several against the same Redis to scale
//! horizontally.

use clap::Parser;
use matchwire::{
    api::ApiServer,
    fanout::{EventBus, RedisBus},
    store::{AtomicStore, RedisStore},
    MatchwireConfig,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "matchwire", about = "Matchmaker + signaling server with atomic settlement")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the Redis URL
    #[arg(long)]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchwire=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MatchwireConfig::load(path)?,
        None => MatchwireConfig::from_env(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(redis_url) = cli.redis_url {
        config.redis.url = redis_url;
    }
    config.validate()?;

    info!(redis_url = %config.redis.url, "connecting shared store");
    let store: Arc<dyn AtomicStore> = Arc::new(RedisStore::new(&config.redis.url)?);
    let bus: Arc<dyn EventBus> = Arc::new(RedisBus::connect(&config.redis.url)?);

    ApiServer::new(config, store, bus).run().await?;
    Ok(())
}
