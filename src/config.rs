//! Per-role process configuration.
//!
//! Each binary owns one of these structs, built from CLI flags via `clap`'s
//! derive API (with environment-variable fallbacks), and passes it explicitly
//! into its node constructor — there are no ambient globals.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Default per-call RPC timeout used by the transport adapter.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(2);
/// Interval at which the coordinator's retry loop re-delivers decisions.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(3);
/// Interval at which the participant's timeout monitor scans for blocked transactions.
pub const TIMEOUT_MONITOR_INTERVAL: Duration = Duration::from_secs(2);
/// How long a transaction may sit in `READY` before the monitor logs it as blocked.
pub const READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Coordinator configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "coordinator", about = "Atomic-commitment coordinator node")]
pub struct CoordinatorConfig {
    /// Node identifier reported in logs and status responses.
    #[arg(long, env = "COORD_ID", default_value = "COORD")]
    pub id: String,

    /// TCP port the coordinator's HTTP API listens on.
    #[arg(long, env = "COORD_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Comma-separated list of participant base URLs, e.g. `http://127.0.0.1:8001`.
    #[arg(long, env = "COORD_PARTICIPANTS", value_delimiter = ',')]
    pub participants: Vec<String>,

    /// Path to the coordinator's write-ahead log.
    #[arg(long, env = "COORD_WAL", default_value = "/tmp/coord.wal")]
    pub wal: PathBuf,
}

/// Participant configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "participant", about = "Atomic-commitment participant node")]
pub struct ParticipantConfig {
    /// Node identifier reported in logs and status responses.
    #[arg(long, env = "PARTICIPANT_ID")]
    pub id: String,

    /// TCP port the participant's HTTP API listens on.
    #[arg(long, env = "PARTICIPANT_PORT", default_value_t = 8001)]
    pub port: u16,

    /// Path to the participant's write-ahead log. Empty disables durability.
    #[arg(long, env = "PARTICIPANT_WAL", default_value = "")]
    pub wal: String,
}

impl ParticipantConfig {
    /// `None` when the WAL is disabled (empty path), matching the reference
    /// implementation's `WAL_PATH = args.wal or None`.
    pub fn wal_path(&self) -> Option<PathBuf> {
        if self.wal.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.wal))
        }
    }
}
