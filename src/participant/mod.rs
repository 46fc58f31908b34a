//! Participant node: evaluates proposed operations, votes, stages intent
//! durably, and applies committed operations to a local key-value store.

pub mod api;
pub mod timeout;

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::ParticipantConfig;
use crate::error::Error;
use crate::types::{ParticipantTxRecord, ParticipantTxState, RawOperation, Vote};
use crate::wal::{self, Wal};

/// The transaction table and key-value store, behind a single lock so a
/// state transition and its dependent key-value write are never observable
/// apart from each other.
#[derive(Default)]
struct State {
    kv: HashMap<String, String>,
    tx: HashMap<String, ParticipantTxRecord>,
}

/// In-memory + durable state for one participant node.
pub struct Participant {
    pub id: String,
    state: Mutex<State>,
    wal: Wal,
}

impl Participant {
    /// Opens the WAL (or disables durability, per config) and replays it.
    pub fn new(config: &ParticipantConfig) -> Result<Self, Error> {
        let wal = Wal::open(config.wal_path())?;
        let participant = Self {
            id: config.id.clone(),
            state: Mutex::new(State::default()),
            wal,
        };
        if let Some(path) = participant.wal.path() {
            participant.replay(path)?;
        }
        Ok(participant)
    }

    fn replay(&self, path: &Path) -> Result<(), Error> {
        info!(node = %self.id, "WAL replay starting");
        let lines = wal::read_lines(path)?;
        let mut state = self.state.lock();
        let State { tx, kv } = &mut *state;

        for line in &lines {
            let Some((txid, cmd, rest)) = wal::split_record(line) else {
                continue;
            };

            match cmd {
                "PREPARE" | "CAN_COMMIT" => {
                    let Some((vote_str, op_json)) = rest.split_once(' ') else {
                        continue;
                    };
                    let Ok(raw_op) = serde_json::from_str::<RawOperation>(op_json) else {
                        continue;
                    };
                    let state = if vote_str == "YES" {
                        ParticipantTxState::Ready
                    } else {
                        ParticipantTxState::Aborted
                    };
                    tx.insert(
                        txid.to_string(),
                        ParticipantTxRecord {
                            state,
                            op: Some(raw_op),
                            ts: Utc::now(),
                        },
                    );
                }
                "PRECOMMIT" => {
                    if let Some(record) = tx.get_mut(txid) {
                        record.state = ParticipantTxState::Precommit;
                    }
                }
                "COMMIT" => {
                    if let Some(record) = tx.get_mut(txid) {
                        record.state = ParticipantTxState::Committed;
                        if let Some(op) = record.op.as_ref().and_then(RawOperation::validate) {
                            kv.insert(op.key().to_string(), op.value().to_string());
                        }
                    }
                }
                "ABORT" => {
                    tx.insert(
                        txid.to_string(),
                        ParticipantTxRecord {
                            state: ParticipantTxState::Aborted,
                            op: None,
                            ts: Utc::now(),
                        },
                    );
                }
                _ => {}
            }
        }

        info!(node = %self.id, recovered = tx.len(), "WAL replay finished");
        Ok(())
    }

    /// Handles `/prepare` and `/can_commit` — both evaluate the proposed
    /// operation and enter `READY` on a yes vote. `wal_cmd` is `"PREPARE"` or
    /// `"CAN_COMMIT"` so the durable record reflects which endpoint was hit.
    pub fn vote(&self, txid: &str, op: RawOperation, wal_cmd: &str) -> Result<Vote, Error> {
        let vote = if op.validate().is_some() { Vote::Yes } else { Vote::No };
        let state = if vote == Vote::Yes {
            ParticipantTxState::Ready
        } else {
            ParticipantTxState::Aborted
        };

        {
            let mut s = self.state.lock();
            s.tx.insert(
                txid.to_string(),
                ParticipantTxRecord {
                    state,
                    op: Some(op.clone()),
                    ts: Utc::now(),
                },
            );
        }

        let op_json = serde_json::to_string(&op).map_err(|e| Error::Malformed {
            message: format!("serializing operation: {e}"),
        })?;
        self.wal.append(&format!("{txid} {wal_cmd} {vote} {op_json}"))?;

        info!(node = %self.id, %txid, %vote, "vote recorded");
        Ok(vote)
    }

    /// Handles `/precommit`: only valid from `READY`, but idempotent on repeat.
    pub fn precommit(&self, txid: &str) -> Result<(), Error> {
        {
            let mut s = self.state.lock();
            match s.tx.get_mut(txid) {
                Some(record) if record.is_terminal() => {
                    warn!(node = %self.id, %txid, "precommit against terminal state ignored");
                    return Ok(());
                }
                Some(record) => record.state = ParticipantTxState::Precommit,
                None => {
                    return Err(Error::UnknownTransaction {
                        txid: txid.to_string(),
                    })
                }
            }
        }
        self.wal.append(&format!("{txid} PRECOMMIT"))?;
        Ok(())
    }

    /// Handles `/commit`: applies the operation (if it ever validated) and
    /// marks the transaction `COMMITTED`. Repeat calls are idempotent; a
    /// `commit` for a `txid` this participant never heard of is rejected.
    ///
    /// The state flip to `Committed` and the key-value insert happen under
    /// one lock acquisition, so no concurrent reader can observe `Committed`
    /// before the value it committed is visible in the store.
    pub fn commit(&self, txid: &str) -> Result<(), Error> {
        {
            let mut s = self.state.lock();
            let record = s.tx.get_mut(txid).ok_or_else(|| Error::UnknownTransaction {
                txid: txid.to_string(),
            })?;
            if record.state == ParticipantTxState::Aborted {
                warn!(node = %self.id, %txid, "commit against aborted transaction ignored");
                return Ok(());
            }
            record.state = ParticipantTxState::Committed;
            let op = record.op.clone();
            if let Some(op) = op.as_ref().and_then(RawOperation::validate) {
                s.kv.insert(op.key().to_string(), op.value().to_string());
            }
        }

        self.wal.append(&format!("{txid} COMMIT"))?;
        info!(node = %self.id, %txid, "committed");
        Ok(())
    }

    /// Handles `/abort`: unconditionally marks the transaction aborted, even
    /// if it was never seen before (the reference implementation allows
    /// aborting an unknown `txid`, since an abort is always safe to record).
    pub fn abort(&self, txid: &str) -> Result<(), Error> {
        {
            let mut s = self.state.lock();
            if let Some(record) = s.tx.get(txid) {
                if record.state == ParticipantTxState::Committed {
                    warn!(node = %self.id, %txid, "abort against committed transaction ignored");
                    return Ok(());
                }
            }
            s.tx.insert(
                txid.to_string(),
                ParticipantTxRecord {
                    state: ParticipantTxState::Aborted,
                    op: None,
                    ts: Utc::now(),
                },
            );
        }
        self.wal.append(&format!("{txid} ABORT"))?;
        info!(node = %self.id, %txid, "aborted");
        Ok(())
    }

    /// Snapshot of the transaction table alone, for the timeout monitor
    /// (which only ever inspects `tx` and tolerates it being momentarily
    /// stale relative to `kv`).
    pub fn tx_snapshot(&self) -> HashMap<String, ParticipantTxRecord> {
        self.state.lock().tx.clone()
    }

    /// Snapshot of both the transaction table and the key-value store taken
    /// under one lock acquisition, so `/status` never reports a `Committed`
    /// transaction whose value hasn't landed in `kv` yet.
    pub fn full_snapshot(&self) -> (HashMap<String, String>, HashMap<String, ParticipantTxRecord>) {
        let s = self.state.lock();
        (s.kv.clone(), s.tx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_with_wal(path: std::path::PathBuf) -> ParticipantConfig {
        ParticipantConfig {
            id: "P1".to_string(),
            port: 0,
            wal: path.to_string_lossy().to_string(),
        }
    }

    #[test]
    fn replay_applies_committed_operations() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"t1 PREPARE YES {{"type":"SET","key":"x","value":"1"}}"#).unwrap();
        writeln!(file, "t1 COMMIT").unwrap();
        writeln!(file, r#"t2 PREPARE NO {{"type":"DEL","key":"y","value":"2"}}"#).unwrap();
        file.flush().unwrap();

        let participant = Participant::new(&config_with_wal(file.path().to_path_buf())).unwrap();

        let (kv, tx) = participant.full_snapshot();
        assert_eq!(kv.get("x"), Some(&"1".to_string()));
        assert_eq!(tx["t1"].state, ParticipantTxState::Committed);
        assert_eq!(tx["t2"].state, ParticipantTxState::Aborted);
    }

    #[test]
    fn vote_rejects_invalid_operation_without_erroring() {
        let participant = Participant::new(&config_with_wal(std::path::PathBuf::new())).unwrap();
        let op = RawOperation {
            op_type: "DEL".to_string(),
            key: "a".to_string(),
            value: "b".to_string(),
        };
        let vote = participant.vote("t1", op, "PREPARE").unwrap();
        assert_eq!(vote, Vote::No);
        assert_eq!(
            participant.tx_snapshot()["t1"].state,
            ParticipantTxState::Aborted
        );
    }

    #[test]
    fn commit_on_unknown_txid_is_rejected() {
        let participant = Participant::new(&config_with_wal(std::path::PathBuf::new())).unwrap();
        let err = participant.commit("nonexistent").unwrap_err();
        assert!(matches!(err, Error::UnknownTransaction { .. }));
    }

    #[test]
    fn commit_after_abort_is_ignored_not_reverted() {
        let participant = Participant::new(&config_with_wal(std::path::PathBuf::new())).unwrap();
        let op = RawOperation {
            op_type: "SET".to_string(),
            key: "a".to_string(),
            value: "1".to_string(),
        };
        participant.vote("t1", op, "PREPARE").unwrap();
        participant.abort("t1").unwrap();
        participant.commit("t1").unwrap();

        let (kv, tx) = participant.full_snapshot();
        assert_eq!(tx["t1"].state, ParticipantTxState::Aborted);
        assert!(kv.get("a").is_none());
    }
}
