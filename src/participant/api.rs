//! Participant HTTP surface: `/prepare`, `/can_commit`, `/precommit`,
//! `/commit`, `/abort`, `/status`.

use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::{Filter, Rejection, Reply};

use crate::error::Error;
use crate::types::{ParticipantTxRecord, RawOperation, Vote};

use super::Participant;

#[derive(Debug, Deserialize)]
struct VoteRequest {
    txid: String,
    op: RawOperation,
}

#[derive(Debug, Deserialize)]
struct TxOnlyRequest {
    txid: String,
}

#[derive(Debug, Serialize)]
struct VoteResponse {
    vote: Vote,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    node: String,
    kv: std::collections::HashMap<String, String>,
    tx: std::collections::HashMap<String, ParticipantTxRecord>,
}

fn with_participant(
    participant: Arc<Participant>,
) -> impl Filter<Extract = (Arc<Participant>,), Error = Infallible> + Clone {
    warp::any().map(move || participant.clone())
}

/// Builds the complete set of participant routes.
pub fn routes(
    participant: Arc<Participant>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let prepare = warp::path!("prepare")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_participant(participant.clone()))
        .and_then(|req: VoteRequest, p: Arc<Participant>| async move {
            handle_vote(req, p, "PREPARE")
        });

    let can_commit = warp::path!("can_commit")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_participant(participant.clone()))
        .and_then(|req: VoteRequest, p: Arc<Participant>| async move {
            handle_vote(req, p, "CAN_COMMIT")
        });

    let precommit = warp::path!("precommit")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_participant(participant.clone()))
        .and_then(handle_precommit);

    let commit = warp::path!("commit")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_participant(participant.clone()))
        .and_then(handle_commit);

    let abort = warp::path!("abort")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_participant(participant.clone()))
        .and_then(handle_abort);

    let status = warp::path!("status")
        .and(warp::get())
        .and(with_participant(participant))
        .and_then(handle_status);

    prepare
        .or(can_commit)
        .or(precommit)
        .or(commit)
        .or(abort)
        .or(status)
        .recover(recover)
}

fn handle_vote(
    req: VoteRequest,
    participant: Arc<Participant>,
    wal_cmd: &'static str,
) -> Result<impl Reply, Rejection> {
    let vote = participant
        .vote(&req.txid, req.op, wal_cmd)
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&VoteResponse { vote }))
}

async fn handle_precommit(
    req: TxOnlyRequest,
    participant: Arc<Participant>,
) -> Result<impl Reply, Rejection> {
    participant.precommit(&req.txid).map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&OkResponse { ok: true }))
}

async fn handle_commit(
    req: TxOnlyRequest,
    participant: Arc<Participant>,
) -> Result<impl Reply, Rejection> {
    participant.commit(&req.txid).map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&OkResponse { ok: true }))
}

async fn handle_abort(
    req: TxOnlyRequest,
    participant: Arc<Participant>,
) -> Result<impl Reply, Rejection> {
    participant.abort(&req.txid).map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&OkResponse { ok: true }))
}

async fn handle_status(participant: Arc<Participant>) -> Result<impl Reply, Rejection> {
    let (kv, tx) = participant.full_snapshot();
    Ok(warp::reply::json(&StatusResponse {
        node: participant.id.clone(),
        kv,
        tx,
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
