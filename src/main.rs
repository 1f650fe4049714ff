//! Chaotic Neutral Server
//!
//! Loads configuration from the environment and serves matches over WebSocket.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chaotic_neutral::{
    game::hero::HeroStatsTable,
    network::{GameServer, ServerConfig},
    VERSION,
};

#[cfg(feature = "debug-tracing")]
const DEFAULT_LOG_LEVEL: &str = "debug";
#[cfg(not(feature = "debug-tracing"))]
const DEFAULT_LOG_LEVEL: &str = "info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Chaotic Neutral Server v{}", VERSION);

    let config = ServerConfig::from_env();
    let stats = HeroStatsTable::load_first(&config.hero_stats_candidates());
    info!(
        "Bind {} | max connections {} | {} hero stat entries",
        config.bind_addr,
        config.max_connections,
        stats.len()
    );

    let server = GameServer::new(config, stats);

    tokio::select! {
        result = server.run() => {
            result.context("game server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
