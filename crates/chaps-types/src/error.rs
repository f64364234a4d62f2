use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown internal blob id: {0}")]
    UnknownInternalBlobId(u8),

    #[error("unknown internal blob name: {0}")]
    UnknownInternalBlobName(String),
}
