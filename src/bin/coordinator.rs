//! Coordinator binary: parses CLI config, replays its WAL, and serves the
//! `/tx/start` and `/status` HTTP routes while the retry loop runs in the
//! background.

use std::sync::Arc;

use atomic_commit::config::{CoordinatorConfig, RETRY_INTERVAL};
use atomic_commit::coordinator::{api, retry, Coordinator};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = CoordinatorConfig::parse();
    if config.participants.is_empty() {
        return Err("at least one --participants entry is required".into());
    }

    let coordinator = Arc::new(Coordinator::new(&config)?);
    retry::spawn(coordinator.clone(), RETRY_INTERVAL);

    info!(id = %config.id, port = config.port, "coordinator running");

    warp::serve(api::routes(coordinator))
        .run(([0, 0, 0, 0], config.port))
        .await;

    Ok(())
}
