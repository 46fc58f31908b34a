//! Participant binary: parses CLI config, replays its WAL, and serves the
//! protocol endpoints while the timeout monitor runs in the background.

use std::sync::Arc;

use atomic_commit::config::{ParticipantConfig, READY_TIMEOUT, TIMEOUT_MONITOR_INTERVAL};
use atomic_commit::participant::{api, timeout, Participant};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ParticipantConfig::parse();
    let participant = Arc::new(Participant::new(&config)?);
    timeout::spawn(participant.clone(), TIMEOUT_MONITOR_INTERVAL, READY_TIMEOUT);

    info!(id = %config.id, port = config.port, "participant running");

    warp::serve(api::routes(participant))
        .run(([0, 0, 0, 0], config.port))
        .await;

    Ok(())
}
