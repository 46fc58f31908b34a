//! Background timeout monitor: periodically scans for transactions stuck in
//! `READY` past `READY_TIMEOUT` and logs them as blocked. It never aborts a
//! transaction itself — that would break agreement if the coordinator's
//! decision was actually `COMMIT`. A participant that has voted yes cannot
//! safely unblock itself; this is the inherent blocking property of 2PC.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::types::ParticipantTxState;

use super::Participant;

/// Spawns the timeout monitor as a background task. Runs until the process exits.
pub fn spawn(participant: Arc<Participant>, interval: Duration, ready_timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            scan_once(&participant, ready_timeout);
        }
    })
}

fn scan_once(participant: &Participant, ready_timeout: Duration) {
    let now = Utc::now();
    for (txid, record) in participant.tx_snapshot() {
        if record.state != ParticipantTxState::Ready {
            continue;
        }
        let blocked_for = now.signed_duration_since(record.ts);
        if blocked_for.to_std().unwrap_or(Duration::ZERO) > ready_timeout {
            warn!(node = %participant.id, %txid, "transaction still blocked (2PC limitation)");
        }
    }
}
