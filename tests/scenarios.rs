//! In-process integration tests covering the literal scenarios from the
//! design's testable-properties section: real `warp` servers on
//! OS-assigned ports, driven with `reqwest`, exactly as a client would.

use std::sync::Arc;

use atomic_commit::config::{CoordinatorConfig, ParticipantConfig};
use atomic_commit::coordinator::{api as coordinator_api, Coordinator};
use atomic_commit::participant::{api as participant_api, Participant};
use serde_json::{json, Value};

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

async fn spawn_coordinator(participants: Vec<String>, wal: std::path::PathBuf) -> String {
    let config = CoordinatorConfig {
        id: "COORD".to_string(),
        port: 0,
        participants,
        wal,
    };
    let coordinator = Arc::new(Coordinator::new(&config).unwrap());
    let routes = coordinator_api::routes(coordinator);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}

async fn get_status(base: &str) -> Value {
    reqwest::get(format!("{base}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn happy_two_pc_commits_on_both_participants() {
    let p1 = spawn_participant("P1").await;
    let p2 = spawn_participant("P2").await;
    let wal = tempfile::NamedTempFile::new().unwrap();
    let coord = spawn_coordinator(vec![p1.clone(), p2.clone()], wal.path().to_path_buf()).await;

    let client = reqwest::Client::new();
    let resp: Value = client
        .post(format!("{coord}/tx/start"))
        .json(&json!({
            "txid": "t1",
            "op": {"type": "SET", "key": "x", "value": "1"},
            "protocol": "2PC"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["decision"], "COMMIT");
    assert_eq!(resp["votes"][&p1], "YES");
    assert_eq!(resp["votes"][&p2], "YES");

    let status1 = get_status(&p1).await;
    assert_eq!(status1["kv"]["x"], "1");
    let status2 = get_status(&p2).await;
    assert_eq!(status2["kv"]["x"], "1");
}

#[tokio::test]
async fn validation_abort_leaves_kv_untouched() {
    let p1 = spawn_participant("P1").await;
    let p2 = spawn_participant("P2").await;
    let wal = tempfile::NamedTempFile::new().unwrap();
    let coord = spawn_coordinator(vec![p1.clone(), p2.clone()], wal.path().to_path_buf()).await;

    let client = reqwest::Client::new();
    let resp: Value = client
        .post(format!("{coord}/tx/start"))
        .json(&json!({
            "txid": "t2",
            "op": {"type": "DEL", "key": "x", "value": "1"},
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["decision"], "ABORT");
    assert_eq!(resp["votes"][&p1], "NO");
    assert_eq!(resp["votes"][&p2], "NO");

    let status1 = get_status(&p1).await;
    assert!(status1["kv"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_participant_forces_global_abort() {
    let p1 = spawn_participant("P1").await;
    let unreachable = "http://127.0.0.1:1".to_string(); // nothing listens here
    let wal = tempfile::NamedTempFile::new().unwrap();
    let coord = spawn_coordinator(vec![p1.clone(), unreachable.clone()], wal.path().to_path_buf()).await;

    let client = reqwest::Client::new();
    let resp: Value = client
        .post(format!("{coord}/tx/start"))
        .json(&json!({
            "txid": "t3",
            "op": {"type": "SET", "key": "y", "value": "2"},
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["decision"], "ABORT");
    assert_eq!(resp["votes"][&unreachable], "NO_TIMEOUT");

    let status1 = get_status(&p1).await;
    assert!(status1["kv"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn three_pc_happy_path_commits() {
    let p1 = spawn_participant("P1").await;
    let p2 = spawn_participant("P2").await;
    let wal = tempfile::NamedTempFile::new().unwrap();
    let coord = spawn_coordinator(vec![p1.clone(), p2.clone()], wal.path().to_path_buf()).await;

    let client = reqwest::Client::new();
    let resp: Value = client
        .post(format!("{coord}/tx/start"))
        .json(&json!({
            "txid": "t4",
            "op": {"type": "SET", "key": "z", "value": "3"},
            "protocol": "3PC"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["decision"], "COMMIT");

    let status1 = get_status(&p1).await;
    assert_eq!(status1["kv"]["z"], "3");
    assert_eq!(status1["tx"]["t4"]["state"], "Committed");
}
