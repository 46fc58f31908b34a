//! # Atomic Commit: a durable 2PC/3PC commitment subsystem
//!
//! Coordinates a distributed transaction across a coordinator and a fixed
//! set of participant nodes using Two-Phase or Three-Phase Commit. Every
//! state transition is written to a write-ahead log and fsynced before the
//! corresponding reply is sent, so a crashed node recovers its protocol
//! state by replaying its own log rather than asking its peers.
//!
//! ## Architecture
//!
//! ```text
//! Coordinator                       Participant (x N)
//! ├── protocol driver (2PC/3PC)     ├── vote/state machine
//! ├── WAL + recovery                ├── WAL + recovery
//! ├── retry loop (background)       ├── timeout monitor (background)
//! └── HTTP API (warp)               └── HTTP API (warp)
//! ```
//!
//! There is no leader election, no participant-set reconfiguration, and no
//! coordinator failover: a crashed coordinator comes back by restarting and
//! replaying its WAL, not by handing off to a peer.

#![warn(rust_2018_idioms)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod participant;
pub mod transport;
pub mod types;
pub mod wal;

pub use error::{Error, Result};
