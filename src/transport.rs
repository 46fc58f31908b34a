//! HTTP transport adapter used by the coordinator to call participants.
//!
//! Wraps a single shared `reqwest::Client` with the per-call timeout from the
//! design (default 2s) and distinguishes a transport-level failure (connect
//! error, timeout, non-2xx) from a genuine application error, so the
//! coordinator driver can treat the former as a synthetic `NO_TIMEOUT` vote.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::config::DEFAULT_RPC_TIMEOUT;
use crate::error::Error;

/// A thin, cloneable HTTP client for coordinator -> participant RPCs.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
}

impl Transport {
    /// Builds a transport with the given per-call timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is valid");
        Self { client }
    }

    /// POSTs `body` as JSON to `url` and deserializes the JSON response.
    ///
    /// Any connect failure, timeout, or non-2xx status is reported as
    /// `Error::Transport` — the caller is expected to treat this uniformly as
    /// "this peer did not answer in time", not inspect the specific cause.
    pub async fn post_json<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        url: &str,
        body: &Req,
    ) -> Result<Resp, Error> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport {
                message: e.to_string(),
                peer: url.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::Transport {
                message: format!("status {}", response.status()),
                peer: url.to_string(),
            });
        }

        response.json::<Resp>().await.map_err(|e| Error::Transport {
            message: format!("decoding response: {e}"),
            peer: url.to_string(),
        })
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_RPC_TIMEOUT)
    }
}
