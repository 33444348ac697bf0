use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("connect to bootstrap authority {authority} failed: {reason}")]
    ConnectFailed { authority: String, reason: String },
    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),
    #[error("no connection available for method {0}")]
    NoConnectionAvailable(String),
    #[error("close failed: {0}")]
    CloseFailed(String),
    #[error("no resolver or picker registered for scheme {0}")]
    UnknownScheme(String),
    #[error("scheme {0} is already registered")]
    DuplicateScheme(String),
    #[error("invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },
    #[error("invalid method pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("connection to {0} is closed")]
    ConnectionClosed(String),
    #[error("call {method} on {peer} exceeded deadline of {timeout:?}")]
    DeadlineExceeded { method: String, peer: String, timeout: Duration },
    #[error("peer {peer} replied with error: {message}")]
    Remote { peer: String, message: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the failed call may succeed after a fresh discovery round.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NoConnectionAvailable(_) | Error::ConnectionClosed(_))
    }
}
