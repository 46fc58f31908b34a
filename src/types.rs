//! Wire and domain types shared by the coordinator and participant.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An operation as it arrives on the wire: a free-form `type` plus `key`/`value`.
///
/// Deliberately not a strict tagged enum — an unrecognized `type` must still
/// deserialize successfully so the participant can reject it with a normal
/// `Vote::No` rather than failing the request as malformed (see the
/// validation-abort scenario in the testable properties). [`RawOperation::validate`]
/// is where the type-checking the redesign note calls for actually happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOperation {
    #[serde(rename = "type")]
    pub op_type: String,
    pub key: String,
    pub value: String,
}

impl RawOperation {
    /// Checks the operation against the single closed set of known types and,
    /// if valid, returns the typed [`Operation`] the rest of the core works with.
    pub fn validate(&self) -> Option<Operation> {
        if self.op_type.eq_ignore_ascii_case("SET") {
            Some(Operation::Set {
                key: self.key.clone(),
                value: self.value.clone(),
            })
        } else {
            None
        }
    }
}

/// The one operation kind the protocol core understands: set a key to a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    /// Assign `value` to `key` in the participant's key-value store.
    #[serde(rename = "SET")]
    Set { key: String, value: String },
}

impl Operation {
    /// Returns the key this operation touches.
    pub fn key(&self) -> &str {
        match self {
            Operation::Set { key, .. } => key,
        }
    }

    /// Returns the value this operation assigns.
    pub fn value(&self) -> &str {
        match self {
            Operation::Set { value, .. } => value,
        }
    }

    /// Recovers the wire form, e.g. for re-embedding in a WAL line.
    pub fn to_raw(&self) -> RawOperation {
        match self {
            Operation::Set { key, value } => RawOperation {
                op_type: "SET".to_string(),
                key: key.clone(),
                value: value.clone(),
            },
        }
    }
}

/// A participant's vote on a proposed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    /// The operation is valid and the participant is ready to proceed.
    #[serde(rename = "YES")]
    Yes,
    /// The operation was rejected by validation.
    #[serde(rename = "NO")]
    No,
    /// Synthetic vote recorded by the coordinator when a participant could
    /// not be reached within the transport timeout. Never produced by a
    /// participant itself.
    #[serde(rename = "NO_TIMEOUT")]
    NoTimeout,
}

impl Vote {
    /// Whether this vote counts toward a unanimous commit.
    pub fn is_yes(&self) -> bool {
        matches!(self, Vote::Yes)
    }
}

impl std::fmt::Display for Vote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Vote::Yes => "YES",
            Vote::No => "NO",
            Vote::NoTimeout => "NO_TIMEOUT",
        };
        write!(f, "{s}")
    }
}

/// The coordinator's binding outcome for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "COMMIT")]
    Commit,
    #[serde(rename = "ABORT")]
    Abort,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Decision::Commit => "COMMIT",
            Decision::Abort => "ABORT",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Decision {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMMIT" => Ok(Decision::Commit),
            "ABORT" => Ok(Decision::Abort),
            other => Err(crate::error::Error::Malformed {
                message: format!("unrecognized decision {other}"),
            }),
        }
    }
}

/// Which atomic-commitment protocol a transaction runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "2PC")]
    TwoPc,
    #[serde(rename = "3PC")]
    ThreePc,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::TwoPc
    }
}

impl std::str::FromStr for Protocol {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "3PC" => Ok(Protocol::ThreePc),
            _ => Ok(Protocol::TwoPc),
        }
    }
}

/// Coordinator-side lifecycle state for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorTxState {
    /// The driver is still collecting votes or has not yet persisted a decision.
    Active,
    /// Decision persisted and initial delivery attempted; retry loop covers the rest.
    Done,
    /// Rehydrated from WAL replay after a restart.
    Recovered,
}

/// Coordinator's record of one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorTxRecord {
    pub txid: String,
    pub protocol: Protocol,
    pub decision: Option<Decision>,
    pub votes: HashMap<String, Vote>,
    pub state: CoordinatorTxState,
    pub participants: Vec<String>,
}

/// Participant-side lifecycle state for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantTxState {
    /// Voted yes, awaiting the global decision. The 2PC blocking state.
    Ready,
    /// 3PC pre-commit acknowledged.
    Precommit,
    /// Operation applied to the key-value store.
    Committed,
    /// Transaction will never be applied.
    Aborted,
}

/// Participant's record of one transaction.
///
/// `op` stores the raw wire form, not the validated [`Operation`]: an invalid
/// operation (vote `NO`) is still recorded for observability and WAL replay
/// even though it will never be applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantTxRecord {
    pub state: ParticipantTxState,
    pub op: Option<RawOperation>,
    /// Wall-clock time of the last state change, used by the timeout monitor.
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl ParticipantTxRecord {
    /// Whether this record is in one of the terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ParticipantTxState::Committed | ParticipantTxState::Aborted
        )
    }
}
