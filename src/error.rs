//! Error taxonomy for the atomic-commitment core: a transport failure while
//! talking to a participant, a durability failure writing the WAL, a malformed
//! request, or an unknown route. Validation rejection is deliberately *not*
//! an error here — a participant that rejects an operation still returns a
//! normal `Vote::No`, it never fails the request.

use thiserror::Error;

/// Main error type for the atomic-commitment core.
#[derive(Error, Debug)]
pub enum Error {
    /// An RPC to a participant or coordinator failed to connect, timed out, or
    /// returned a non-2xx status that is not itself a protocol-level rejection.
    #[error("transport error talking to {peer}: {message}")]
    Transport { message: String, peer: String },

    /// The WAL could not be appended or fsynced. Must surface as a 5xx; the
    /// caller must not treat the corresponding state change as durable.
    #[error("durability error: {message}")]
    Durability { message: String },

    /// A required field was missing or a value was out of the accepted shape.
    #[error("malformed request: {message}")]
    Malformed { message: String },

    /// No transaction record exists for the given transaction id.
    #[error("unknown transaction: {txid}")]
    UnknownTransaction { txid: String },

    /// Configuration could not be parsed or is internally inconsistent.
    #[error("configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps this error to the HTTP status code the API should reply with.
    pub fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            Error::Transport { .. } => StatusCode::BAD_GATEWAY,
            Error::Durability { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Malformed { .. } => StatusCode::BAD_REQUEST,
            Error::UnknownTransaction { .. } => StatusCode::BAD_REQUEST,
            Error::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl warp::reject::Reject for Error {}
