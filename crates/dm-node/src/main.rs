//! Dataset market node binary.

use anyhow::{Context, Result};
use dm_node::config::NodeConfig;
use dm_node::telemetry;
use dm_node::Node;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("loading configuration")?;
    telemetry::init_tracing(&config.log_level, config.json_logs)?;

    let node = Node::start(config).await?;

    tokio::select! {
        served = node.serve(tokio::io::stdin(), tokio::io::stdout()) => served?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for shutdown signal")?;
            info!("shutdown signal received");
        }
    }

    Ok(())
}
