use shortn_core::{BackendError, ConnectError, ShortCode};
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("short code {0} already belongs to a different url")]
    Collision(ShortCode),
    #[error("gave up connecting to backend after {attempts} attempts: {source}")]
    ConnectionExhausted {
        attempts: u32,
        #[source]
        source: ConnectError,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}
