//! Atoll node binary
//!
//! Joins a workspace, announces the local file list, and logs every
//! convergence event.

use atoll_node::{AtollNode, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atoll=info,atoll_node=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Atoll node");

    let config = NodeConfig::from_env();

    let node = AtollNode::new(config).await?;
    node.run().await?;

    Ok(())
}
