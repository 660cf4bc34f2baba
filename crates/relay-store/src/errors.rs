//! [`StoreError`].

use thiserror::Error;

/// Failure of a storage call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Statement or transaction failed inside `SQLite`.
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool.
    #[error("pool checkout: {0}")]
    Pool(#[from] r2d2::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("json column: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A schema step failed; the database stays at the previous version.
    #[error("schema migration failed at {message}")]
    Migration {
        /// Step label followed by the `SQLite` error.
        message: String,
    },

    /// A row the caller referenced is not there.
    #[error("{0} not found")]
    NotFound(String),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, StoreError>;
