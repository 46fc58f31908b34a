//! Background retry loop: re-delivers every persisted decision on a fixed
//! interval until participants acknowledge it, covering transport failures
//! and crashes that happened during initial delivery. Wakes up, snapshots
//! the transaction table, re-POSTs commit/abort to every participant, and
//! swallows failures — the next tick will simply try again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::Coordinator;
use crate::types::Decision;

#[derive(serde::Serialize)]
struct TxOnly<'a> {
    txid: &'a str,
}

#[derive(serde::Deserialize)]
struct OkResponse {
    #[allow(dead_code)]
    ok: bool,
}

/// Spawns the retry loop as a background task. Runs until the process exits.
pub fn spawn(coordinator: Arc<Coordinator>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so we don't redeliver
        // before any transaction has had a chance to run.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            redeliver_once(&coordinator).await;
        }
    })
}

async fn redeliver_once(coordinator: &Coordinator) {
    let snapshot = coordinator.snapshot();
    for record in snapshot.values() {
        let Some(decision) = record.decision else {
            continue;
        };
        let endpoint = match decision {
            Decision::Commit => "/commit",
            Decision::Abort => "/abort",
        };
        for participant in &record.participants {
            let url = format!("{participant}{endpoint}");
            let body = TxOnly { txid: &record.txid };
            match coordinator
                .transport()
                .post_json::<_, OkResponse>(&url, &body)
                .await
            {
                Ok(_) => info!(txid = %record.txid, peer = %participant, "retry delivered"),
                Err(e) => warn!(txid = %record.txid, peer = %participant, error = %e, "retry failed, will try again"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::config::{CoordinatorConfig, ParticipantConfig};
    use crate::participant::{api as participant_api, Participant};
    use crate::types::{CoordinatorTxRecord, CoordinatorTxState, Protocol};

    async fn spawn_participant(id: &str) -> String {
        let config = ParticipantConfig {
            id: id.to_string(),
            port: 0,
            wal: String::new(),
        };
        let participant = Arc::new(Participant::new(&config).unwrap());
        let routes = participant_api::routes(participant);
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{addr}")
    }

    /// Covers the unreachable-at-commit-time scenario: a decision is already
    /// durable in the coordinator's transaction table (as it would be after
    /// crash recovery, see `replay_rehydrates_decision_for_retry`), the
    /// participant that missed the initial delivery is now reachable again,
    /// and a single retry tick must catch it up.
    #[tokio::test]
    async fn redeliver_once_delivers_commit_to_a_recovered_participant() {
        let participant_url = spawn_participant("P1").await;

        let wal_dir = tempfile::tempdir().unwrap();
        let config = CoordinatorConfig {
            id: "COORD".to_string(),
            port: 0,
            participants: vec![participant_url.clone()],
            wal: wal_dir.path().join("coord.wal"),
        };
        let coordinator = Coordinator::new(&config).unwrap();

        coordinator.tx.lock().insert(
            "t1".to_string(),
            CoordinatorTxRecord {
                txid: "t1".to_string(),
                protocol: Protocol::TwoPc,
                decision: Some(Decision::Commit),
                votes: HashMap::new(),
                state: CoordinatorTxState::Recovered,
                participants: vec![participant_url.clone()],
            },
        );

        redeliver_once(&coordinator).await;

        let status: serde_json::Value = reqwest::get(format!("{participant_url}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["tx"]["t1"]["state"], "Committed");
    }
}
