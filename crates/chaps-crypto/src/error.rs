/// Errors from blob encryption and authentication.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The supplied key does not have the required length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The input is too short to contain the trailing IV or MAC.
    #[error("input too short: need at least {minimum} bytes, got {actual}")]
    InputTooShort { minimum: usize, actual: usize },

    /// The underlying cipher rejected the operation (bad padding, etc).
    #[error("cipher error: {0}")]
    Cipher(String),

    /// The recomputed MAC does not match the stored one.
    #[error("integrity check failed")]
    IntegrityCheckFailed,
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
