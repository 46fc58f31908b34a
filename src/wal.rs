//! Shared write-ahead log: append-only, fsynced before the append call returns,
//! one line per record. Used by both the coordinator and the participant;
//! each side owns its own record grammar and only depends on this module for
//! the durable append/replay mechanics: open in append mode, write the line,
//! flush, fsync.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Error;

/// A durable append-only log, or a no-op stand-in when durability is disabled.
///
/// Modeled as an enum rather than `Option<Wal>` so "durability off" is a
/// first-class state instead of a null check scattered across call sites.
pub enum Wal {
    Enabled { path: PathBuf, file: Mutex<File> },
    Disabled,
}

impl Wal {
    /// Opens (creating if needed) the WAL at `path`, or returns the disabled
    /// variant if `path` is `None`.
    pub fn open(path: Option<PathBuf>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Wal::Disabled);
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Durability {
                message: format!("opening WAL {}: {e}", path.display()),
            })?;

        Ok(Wal::Enabled {
            path,
            file: Mutex::new(file),
        })
    }

    /// Appends one record, flushing and fsyncing before returning. A no-op
    /// when durability is disabled.
    pub fn append(&self, line: &str) -> Result<(), Error> {
        let Wal::Enabled { file, path } = self else {
            return Ok(());
        };

        let mut file = file.lock();
        writeln!(file, "{line}").map_err(|e| Error::Durability {
            message: format!("writing WAL {}: {e}", path.display()),
        })?;
        file.flush().map_err(|e| Error::Durability {
            message: format!("flushing WAL {}: {e}", path.display()),
        })?;
        file.sync_all().map_err(|e| Error::Durability {
            message: format!("fsyncing WAL {}: {e}", path.display()),
        })?;
        Ok(())
    }

    /// The path backing this WAL, if durability is enabled.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Wal::Enabled { path, .. } => Some(path),
            Wal::Disabled => None,
        }
    }
}

/// Reads every line of the WAL at `path` in append order, skipping a missing
/// file (nothing to recover) rather than erroring.
pub fn read_lines(path: &Path) -> Result<Vec<String>, Error> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).map_err(|e| Error::Durability {
        message: format!("opening WAL {} for replay: {e}", path.display()),
    })?;

    BufReader::new(file)
        .lines()
        .map(|line| {
            line.map_err(|e| Error::Durability {
                message: format!("reading WAL {}: {e}", path.display()),
            })
        })
        .collect()
}

/// Splits a WAL line into `(txid, cmd, rest)`, where `rest` is whatever
/// follows the second space verbatim (it may itself contain spaces, e.g. a
/// JSON payload). Mirrors `line.strip().split(" ", 2)` in the reference
/// participant.
pub fn split_record(line: &str) -> Option<(&str, &str, &str)> {
    let mut parts = line.splitn(3, ' ');
    let txid = parts.next()?;
    let cmd = parts.next()?;
    let rest = parts.next().unwrap_or("");
    Some((txid, cmd, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn disabled_wal_append_is_noop() {
        let wal = Wal::open(None).unwrap();
        wal.append("t1 DECISION COMMIT").unwrap();
        assert!(wal.path().is_none());
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let wal = Wal::open(Some(path.clone())).unwrap();

        wal.append("t1 DECISION COMMIT").unwrap();
        wal.append("t2 DECISION ABORT").unwrap();

        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec!["t1 DECISION COMMIT", "t2 DECISION ABORT"]);
    }

    #[test]
    fn missing_file_replays_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.wal");
        assert_eq!(read_lines(&path).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn split_record_keeps_json_payload_intact() {
        let (txid, cmd, rest) = split_record(r#"t1 PREPARE YES {"type":"SET","key":"a b","value":"1"}"#).unwrap();
        assert_eq!(txid, "t1");
        assert_eq!(cmd, "PREPARE");
        assert_eq!(rest, r#"YES {"type":"SET","key":"a b","value":"1"}"#);
    }
}
