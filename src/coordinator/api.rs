//! Coordinator HTTP surface: `POST /tx/start`, `GET /status`.
//!
//! Composed as small warp `Filter` chains per endpoint, with a final
//! `recover` handler translating rejected [`crate::error::Error`]s into a
//! `{"error": ...}` body with the appropriate status code.

use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::{Filter, Rejection, Reply};

use crate::error::Error;
use crate::types::{CoordinatorTxRecord, Decision, Protocol, RawOperation, Vote};

use super::Coordinator;

#[derive(Debug, Deserialize)]
struct StartRequest {
    txid: String,
    op: RawOperation,
    #[serde(default)]
    protocol: Option<String>,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    txid: String,
    decision: Decision,
    votes: std::collections::HashMap<String, Vote>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    tx: std::collections::HashMap<String, CoordinatorTxRecord>,
}

fn with_coordinator(
    coordinator: Arc<Coordinator>,
) -> impl Filter<Extract = (Arc<Coordinator>,), Error = Infallible> + Clone {
    warp::any().map(move || coordinator.clone())
}

/// Builds the complete set of coordinator routes.
pub fn routes(
    coordinator: Arc<Coordinator>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let start = warp::path!("tx" / "start")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_coordinator(coordinator.clone()))
        .and_then(handle_start);

    let status = warp::path!("status")
        .and(warp::get())
        .and(with_coordinator(coordinator))
        .and_then(handle_status);

    start.or(status).recover(recover)
}

async fn handle_start(
    req: StartRequest,
    coordinator: Arc<Coordinator>,
) -> Result<impl Reply, Rejection> {
    if req.txid.is_empty() {
        return Err(warp::reject::custom(Error::Malformed {
            message: "txid must not be empty".to_string(),
        }));
    }

    let protocol = match req.protocol {
        Some(raw) => raw.parse::<Protocol>().unwrap_or(Protocol::TwoPc),
        None => Protocol::TwoPc,
    };

    let outcome = coordinator
        .start_transaction(req.txid.clone(), req.op, protocol)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&StartResponse {
        txid: req.txid,
        decision: outcome.decision,
        votes: outcome.votes,
    }))
}

async fn handle_status(coordinator: Arc<Coordinator>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&StatusResponse {
        tx: coordinator.snapshot(),
    }))
}

async fn recover(err: Rejection) -> Result<impl Reply, Infallible> {
    if err.is_not_found() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({"error": "not found"})),
            warp::http::StatusCode::NOT_FOUND,
        ));
    }
    if let Some(e) = err.find::<Error>() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({"error": e.to_string()})),
            e.status_code(),
        ));
    }
    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({"error": "bad request"})),
        warp::http::StatusCode::BAD_REQUEST,
    ))
}
