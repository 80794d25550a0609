use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Failure of a single read or write against the column-store backend.
///
/// A missing key is not an error; reads report it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend rejected the request as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Not enough replicas were available to serve the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The request did not complete before its deadline.
    #[error("backend request timed out: {0}")]
    Timeout(String),
    /// Any other transport or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// The counter label for this failure category.
    pub fn reason(&self) -> &'static str {
        match self {
            BackendError::InvalidRequest(_) => "invalid-request",
            BackendError::Unavailable(_) => "unavailable",
            BackendError::Timeout(_) => "timeout",
            BackendError::Transport(_) => "os-error",
        }
    }
}

/// Failure to establish a connection to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("failed to open transport to {addr}: {message}")]
    Transport { addr: String, message: String },
    #[error("failed to select keyspace '{keyspace}': {source}")]
    Keyspace {
        keyspace: String,
        #[source]
        source: BackendError,
    },
}
