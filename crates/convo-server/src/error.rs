use thiserror::Error;

use convo_store::StoreError;

/// Errors produced while handling a routed operation.
///
/// Nothing here ever reaches a client as an error envelope; the gateway
/// logs and moves on.  The taxonomy exists so handlers can distinguish
/// "silent no-op" paths (handled inline) from genuine failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Media error: {0}")]
    Media(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ServerError>;
