//! Unified error types for convergence.
//!
//! Every upstream failure is reported through one of these variants and
//! propagated unchanged to the caller. Nothing here is retried.

/// Unified error types for the mirror.
///
/// `Clone` so that a single failed upstream fetch can be handed to every
/// caller waiting on the same cache key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Entity absent upstream or missing from an enumerated collection.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Upstream answered with a zero-byte body.
    #[error("EMPTY_RESPONSE: {0}")]
    EmptyResponse(String),

    /// Upstream body was not the JSON shape we expect.
    #[error("PARSE_ERROR: {0}")]
    Parse(String),

    /// Network or HTTP-level failure talking to the upstream host.
    #[error("TRANSPORT_ERROR: {0}")]
    Transport(String),

    /// Invalid input parameters (e.g., an empty space key).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Passthrough only mirrors GET requests.
    #[error("METHOD_NOT_ALLOWED: {0}")]
    MethodNotAllowed(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::EmptyResponse(_) => "EMPTY_RESPONSE",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
