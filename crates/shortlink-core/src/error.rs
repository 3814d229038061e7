use thiserror::Error;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by the storage layer.
///
/// "Not found" is deliberately not part of this taxonomy: lookups return
/// `Ok(None)` for both missing and expired rows, so absence handling is
/// checked at compile time instead of compared against a sentinel.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("invalid short code: {0}")]
    InvalidCode(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("storage operation failed: {0}")]
    Backend(String),
}
