//! Coordinator node: drives 2PC/3PC transactions to a durable global decision
//! and keeps re-delivering that decision until every participant has it.

pub mod api;
pub mod retry;

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{info, info_span, warn};

use crate::config::CoordinatorConfig;
use crate::error::Error;
use crate::transport::Transport;
use crate::types::{CoordinatorTxRecord, CoordinatorTxState, Decision, Protocol, RawOperation, Vote};
use crate::wal::{self, Wal};

/// In-memory + durable state for one coordinator node.
pub struct Coordinator {
    pub id: String,
    pub participants: Vec<String>,
    tx: Mutex<HashMap<String, CoordinatorTxRecord>>,
    wal: Wal,
    transport: Transport,
}

/// Result of driving a transaction to a decision.
pub struct StartOutcome {
    pub decision: Decision,
    pub votes: HashMap<String, Vote>,
}

impl Coordinator {
    /// Opens the WAL and replays it, rehydrating any previously decided
    /// transactions so the retry loop picks them straight back up.
    pub fn new(config: &CoordinatorConfig) -> Result<Self, Error> {
        let wal = Wal::open(Some(config.wal.clone()))?;
        let coordinator = Self {
            id: config.id.clone(),
            participants: config.participants.clone(),
            tx: Mutex::new(HashMap::new()),
            wal,
            transport: Transport::default(),
        };
        if let Some(path) = coordinator.wal.path() {
            coordinator.replay(path)?;
        }
        Ok(coordinator)
    }

    fn replay(&self, path: &Path) -> Result<(), Error> {
        info!("WAL replay starting");
        let lines = wal::read_lines(path)?;
        let mut tx = self.tx.lock();
        for line in &lines {
            let Some((txid, cmd, rest)) = wal::split_record(line) else {
                continue;
            };
            if cmd == "DECISION" {
                let decision: Decision = rest.trim().parse()?;
                tx.insert(
                    txid.to_string(),
                    CoordinatorTxRecord {
                        txid: txid.to_string(),
                        protocol: Protocol::TwoPc,
                        decision: Some(decision),
                        votes: HashMap::new(),
                        state: CoordinatorTxState::Recovered,
                        participants: self.participants.clone(),
                    },
                );
            }
        }
        info!(recovered = tx.len(), "WAL replay finished");
        Ok(())
    }

    /// Drives a single transaction to completion: vote collection, decision
    /// persistence, then best-effort initial delivery. The background retry
    /// loop (see [`retry`]) covers anything this call could not deliver.
    pub async fn start_transaction(
        &self,
        txid: String,
        op: RawOperation,
        protocol: Protocol,
    ) -> Result<StartOutcome, Error> {
        let span = info_span!("transaction", txid = %txid);
        let _enter = span.enter();

        let votes = match protocol {
            Protocol::TwoPc => self.collect_votes(&txid, &op, "/prepare").await,
            Protocol::ThreePc => self.collect_votes(&txid, &op, "/can_commit").await,
        };

        let all_yes = votes.values().all(Vote::is_yes);

        if protocol == Protocol::ThreePc && all_yes {
            info!("sending precommit");
            self.broadcast_best_effort("/precommit", &StartRequestTxOnly { txid: txid.clone() })
                .await;
        }

        let decision = if all_yes { Decision::Commit } else { Decision::Abort };
        info!(%decision, "global decision reached");

        self.wal.append(&format!("{txid} DECISION {decision}"))?;

        let endpoint = match decision {
            Decision::Commit => "/commit",
            Decision::Abort => "/abort",
        };
        self.broadcast_best_effort(endpoint, &StartRequestTxOnly { txid: txid.clone() })
            .await;

        self.tx.lock().insert(
            txid.clone(),
            CoordinatorTxRecord {
                txid: txid.clone(),
                protocol,
                decision: Some(decision),
                votes: votes.clone(),
                state: CoordinatorTxState::Done,
                participants: self.participants.clone(),
            },
        );

        Ok(StartOutcome { decision, votes })
    }

    async fn collect_votes(
        &self,
        txid: &str,
        op: &RawOperation,
        endpoint: &str,
    ) -> HashMap<String, Vote> {
        let mut votes = HashMap::new();
        for participant in &self.participants {
            let url = format!("{participant}{endpoint}");
            let request = PrepareRequest {
                txid: txid.to_string(),
                op: op.clone(),
            };
            let vote = match self.transport.post_json::<_, VoteResponse>(&url, &request).await {
                Ok(resp) => resp.vote,
                Err(e) => {
                    warn!(peer = %participant, error = %e, "vote request failed, recording NO_TIMEOUT");
                    Vote::NoTimeout
                }
            };
            info!(peer = %participant, %vote, "vote received");
            votes.insert(participant.clone(), vote);
        }
        votes
    }

    async fn broadcast_best_effort(&self, endpoint: &str, body: &StartRequestTxOnly) {
        for participant in &self.participants {
            let url = format!("{participant}{endpoint}");
            if let Err(e) = self.transport.post_json::<_, OkResponse>(&url, body).await {
                warn!(peer = %participant, error = %e, "delivery failed, retry loop will cover it");
            }
        }
    }

    /// Snapshot of every transaction record, for `/status` and the retry loop.
    pub fn snapshot(&self) -> HashMap<String, CoordinatorTxRecord> {
        self.tx.lock().clone()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct PrepareRequest {
    txid: String,
    op: RawOperation,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StartRequestTxOnly {
    txid: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct VoteResponse {
    vote: Vote,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct OkResponse {
    ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn replay_rehydrates_decision_for_retry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "t1 DECISION COMMIT").unwrap();
        writeln!(file, "t2 DECISION ABORT").unwrap();
        file.flush().unwrap();

        let config = CoordinatorConfig {
            id: "COORD".to_string(),
            port: 0,
            participants: vec!["http://127.0.0.1:9001".to_string()],
            wal: file.path().to_path_buf(),
        };
        let coordinator = Coordinator::new(&config).unwrap();

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot["t1"].decision, Some(Decision::Commit));
        assert_eq!(snapshot["t1"].state, CoordinatorTxState::Recovered);
        assert_eq!(snapshot["t2"].decision, Some(Decision::Abort));
    }

    #[test]
    fn missing_wal_file_recovers_to_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoordinatorConfig {
            id: "COORD".to_string(),
            port: 0,
            participants: vec![],
            wal: dir.path().join("coord.wal"),
        };
        let coordinator = Coordinator::new(&config).unwrap();
        assert!(coordinator.snapshot().is_empty());
    }
}
