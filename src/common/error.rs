//! Error types for repocache

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the cache can surface.
///
/// `Clone` so a single coalesced load can hand the identical error to all of
/// its waiters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(String),

    // === Origin Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Loader error: {0}")]
    Loader(String),

    // === Peer Errors ===
    #[error("Peer {peer} unavailable: {reason}")]
    PeerUnavailable { peer: String, reason: String },

    #[error("Not the owner of key {key}")]
    NotOwner { key: String },

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    // === Input Errors ===
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    ///
    /// The cache never retries on its own; this is a hint for the caller
    /// deciding whether to run another request cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::PeerUnavailable { .. } | Error::Loader(_) | Error::Http(_)
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotOwner { .. } => StatusCode::MISDIRECTED_REQUEST,
            Error::InvalidKey(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Loader(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::PeerUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, stable name of the variant used on the peer wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::NotFound(_) => "not_found",
            Error::Loader(_) => "loader",
            Error::PeerUnavailable { .. } => "peer_unavailable",
            Error::NotOwner { .. } => "not_owner",
            Error::Http(_) => "http",
            Error::InvalidKey(_) => "invalid_key",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Internal(_) => "internal",
            Error::Timeout(_) => "timeout",
            Error::Other(_) => "other",
        }
    }

    /// The variant payload without the display prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Io(m)
            | Error::NotFound(m)
            | Error::Loader(m)
            | Error::Http(m)
            | Error::InvalidKey(m)
            | Error::InvalidConfig(m)
            | Error::Internal(m)
            | Error::Timeout(m)
            | Error::Other(m) => m.clone(),
            Error::PeerUnavailable { reason, .. } => reason.clone(),
            Error::NotOwner { key } => key.clone(),
        }
    }

    /// Rebuild an error reported by a remote owner.
    ///
    /// `peer` names the remote so that an owner-side `peer_unavailable`
    /// keeps pointing at somebody. Unknown kinds become `Other`.
    pub fn from_wire(kind: &str, message: String, peer: &str) -> Self {
        match kind {
            "io" => Error::Io(message),
            "not_found" => Error::NotFound(message),
            "loader" => Error::Loader(message),
            "peer_unavailable" => Error::PeerUnavailable {
                peer: peer.to_string(),
                reason: message,
            },
            "not_owner" => Error::NotOwner { key: message },
            "http" => Error::Http(message),
            "invalid_key" => Error::InvalidKey(message),
            "invalid_config" => Error::InvalidConfig(message),
            "internal" => Error::Internal(message),
            "timeout" => Error::Timeout(message),
            _ => Error::Other(message),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
