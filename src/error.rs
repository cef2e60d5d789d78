//! Error types for the cache crate.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache adapters.
///
/// Every cache operation returns `Result<T>`. A miss is never an error: it is
/// reported as `Ok(None)` by `get`. Callers only see one of these variants when
/// the operation could not complete its row mutation.
#[derive(Debug, Clone)]
pub enum Error {
    /// Encoding a value into its stored string form failed.
    ///
    /// Common causes:
    /// - Value contains a map with non-string keys (JSON codec)
    /// - A custom `Serialize` implementation returned an error
    SerializationError(String),

    /// Decoding a stored payload back into the requested type failed.
    ///
    /// Common causes:
    /// - Entry was written with a different value type under the same key
    /// - Payload was modified outside the cache
    ///
    /// **Recovery:** Delete the key and write it again.
    DeserializationError(String),

    /// Storage unavailable: the backing store could not be reached or
    /// rejected a statement.
    ///
    /// Common causes:
    /// - Database server down or unreachable
    /// - Bad credentials or unknown database
    /// - Connection dropped or timed out mid-operation
    /// - Adapter already closed
    ///
    /// This layer never retries.
    BackendError(String),

    /// Configuration error when building an adapter.
    ConfigError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

#[cfg(feature = "sql")]
impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Configuration(inner) => Error::ConfigError(inner.to_string()),
            other => Error::BackendError(format!("SQL error: {}", other)),
        }
    }
}
