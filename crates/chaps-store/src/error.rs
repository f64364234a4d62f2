use std::path::PathBuf;

use chaps_crypto::CryptoError;
use chaps_types::StoreId;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object blob exists under the given id.
    #[error("object blob not found: {0}")]
    NotFound(StoreId),

    /// A private object blob was touched before an encryption key was set.
    #[error("store encryption key has not been set")]
    KeyNotSet,

    /// Encryption, decryption, or key validation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The journal is damaged before its last frame. It is left untouched and
    /// a copy is written next to it.
    #[error(
        "journal {} is corrupt at offset {offset}; intact records follow, copy saved to {}",
        .path.display(),
        .backup.display()
    )]
    CorruptJournal {
        path: PathBuf,
        offset: u64,
        backup: PathBuf,
    },

    /// A failed append could not be rolled back; the journal must be
    /// reopened before it accepts more records.
    #[error("journal {} has an unrolled partial write; reopen the store", .0.display())]
    JournalPoisoned(PathBuf),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
